use crate::output::print_json;
use crate::root::Project;
use anyhow::Context;
use clap::Subcommand;
use magen_core::json_schema::{metadata_json_schema, verify_json_schema, write_json_schema};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum SchemaSubcommand {
    /// Write the template metadata JSON Schema
    Generate {
        /// Output file (default: schema_path from config); `-` prints to stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Fail if the checked-in schema differs from the generated one
    Verify {
        /// Schema file (default: schema_path from config)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

pub fn run(project: &Project, subcmd: SchemaSubcommand, json: bool) -> anyhow::Result<()> {
    let default_path = project.config.schema_path(&project.root);
    match subcmd {
        SchemaSubcommand::Generate { out } => {
            let path = out.unwrap_or(default_path);
            if path.as_os_str() == "-" {
                return print_json(&metadata_json_schema()?);
            }
            write_json_schema(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            report(json, "written", &path)
        }
        SchemaSubcommand::Verify { path } => {
            let path = path.unwrap_or(default_path);
            verify_json_schema(&path)
                .with_context(|| format!("failed to verify {}", path.display()))?;
            report(json, "in sync", &path)
        }
    }
}

fn report(json: bool, status: &str, path: &std::path::Path) -> anyhow::Result<()> {
    if json {
        print_json(&serde_json::json!({ "status": status, "path": path }))
    } else {
        println!("Schema {status}: {}", path.display());
        Ok(())
    }
}
