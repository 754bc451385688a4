use super::parse_vars;
use crate::output::{print_fields, print_json};
use crate::root::Project;
use anyhow::Context;
use magen_core::metadata::MetadataCatalog;
use magen_core::paths;
use magen_core::scaffold::{scaffold, ScaffoldOptions};
use std::path::PathBuf;

pub struct ScaffoldArgs {
    pub id: String,
    pub out: PathBuf,
    pub vars: Vec<String>,
    pub dir: Option<PathBuf>,
    pub overwrite: bool,
    pub dry_run: bool,
}

pub fn run(project: &Project, args: ScaffoldArgs, json: bool) -> anyhow::Result<()> {
    let variables = parse_vars(&args.vars)?;
    let dir = args
        .dir
        .unwrap_or_else(|| paths::project_templates_dir(&project.root));
    let catalog = MetadataCatalog::load(&dir)
        .with_context(|| format!("failed to read template metadata in {}", dir.display()))?;

    let report = scaffold(
        &catalog,
        &ScaffoldOptions {
            template_id: args.id.clone(),
            output_dir: args.out,
            variables,
            overwrite: args.overwrite,
            dry_run: args.dry_run,
        },
    )
    .with_context(|| format!("failed to scaffold '{}'", args.id))?;

    if json {
        return print_json(&report);
    }
    let verb = if report.dry_run { "Would write" } else { "Files" };
    print_fields(&[
        ("Template", report.template.clone()),
        ("Output", report.output_directory.display().to_string()),
        (verb, report.files.len().to_string()),
    ]);
    for file in &report.files {
        println!("  {}", file.display());
    }
    for op in &report.operations {
        println!("applied: {op}");
    }
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}
