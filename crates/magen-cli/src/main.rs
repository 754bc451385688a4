mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    schema::SchemaSubcommand, sdd::SddSubcommand, template::TemplateSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "magen",
    about = "Discover, compose, layer and generate mobile app templates",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .magen/ or .git/)
    #[arg(long, global = true, env = "MAGEN_ROOT")]
    root: Option<PathBuf>,

    /// Extra template directory, searched before every other root
    #[arg(long, global = true)]
    templates: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log progress to stderr
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available templates
    List {
        /// Only templates for this platform (ios, android, cross-platform)
        #[arg(long)]
        platform: Option<String>,
    },

    /// Search templates by name, tag and free text
    Search {
        /// Free text matched against name, description and tags
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        platform: Option<String>,
        /// Required tag; repeat to require several
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Name substring
        #[arg(long)]
        name: Option<String>,
    },

    /// Show a template's details and inheritance chain
    Info {
        /// Template name, optionally with @version
        template: String,
    },

    /// Generate an app from a template
    Generate {
        /// Template name, optionally with @version
        template: String,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
        /// Variable value as key=value; repeatable
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
        /// Write into a non-empty output directory, replacing files
        #[arg(long)]
        overwrite: bool,
    },

    /// Author templates: validate, materialize, layer, test
    Template {
        #[command(subcommand)]
        subcommand: TemplateSubcommand,
    },

    /// Resolve a metadata document's inheritance chain and print the result
    Compose {
        /// Metadata id
        id: String,
        /// Directory of metadata documents (default: .magen/templates)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Pick the metadata template that best fits a set of requirements
    Select {
        /// Target platform (ios, android, cross-platform)
        #[arg(long)]
        platform: String,
        /// Required capability; repeatable
        #[arg(long = "capability")]
        capabilities: Vec<String>,
        /// simple, moderate or advanced
        #[arg(long)]
        complexity: Option<String>,
        /// Preferred tag; repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Directory of metadata documents (default: .magen/templates)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Show every candidate with its score
        #[arg(long)]
        all: bool,
    },

    /// Generate an app from a metadata template, applying its file transforms
    Scaffold {
        /// Metadata id
        id: String,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
        /// Variable value as key=value; repeatable
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
        /// Directory of metadata documents (default: .magen/templates)
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Write into a non-empty output directory, replacing files
        #[arg(long)]
        overwrite: bool,
        /// List what would be written without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate or verify the template metadata JSON Schema
    Schema {
        #[command(subcommand)]
        subcommand: SchemaSubcommand,
    },

    /// Spec-driven development feature workflow
    Sdd {
        #[command(subcommand)]
        subcommand: SddSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let result = root::Project::load(root, cli.templates).and_then(|project| {
        let json = cli.json;
        match cli.command {
            Commands::List { platform } => cmd::list::list(&project, platform.as_deref(), json),
            Commands::Search {
                query,
                platform,
                tags,
                name,
            } => cmd::list::search(&project, query, platform.as_deref(), tags, name, json),
            Commands::Info { template } => cmd::info::run(&project, &template, json),
            Commands::Generate {
                template,
                out,
                vars,
                overwrite,
            } => cmd::generate::run(&project, &template, out, &vars, overwrite, json),
            Commands::Template { subcommand } => cmd::template::run(&project, subcommand, json),
            Commands::Compose { id, dir } => cmd::compose::run(&project, &id, dir, json),
            Commands::Select {
                platform,
                capabilities,
                complexity,
                tags,
                dir,
                all,
            } => cmd::select::run(
                &project,
                cmd::select::SelectArgs {
                    platform,
                    capabilities,
                    complexity,
                    tags,
                    dir,
                    all,
                },
                json,
            ),
            Commands::Scaffold {
                id,
                out,
                vars,
                dir,
                overwrite,
                dry_run,
            } => cmd::scaffold::run(
                &project,
                cmd::scaffold::ScaffoldArgs {
                    id,
                    out,
                    vars,
                    dir,
                    overwrite,
                    dry_run,
                },
                json,
            ),
            Commands::Schema { subcommand } => cmd::schema::run(&project, subcommand, json),
            Commands::Sdd { subcommand } => cmd::sdd::run(&project, subcommand, json),
        }
    });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
