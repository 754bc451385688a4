use super::{lookup, parse_vars};
use crate::output::print_json;
use crate::root::Project;
use anyhow::Context;
use magen_core::generator::{generate_app, GenerateOptions};
use magen_core::patch::GitPatchEngine;
use std::path::PathBuf;

pub fn run(
    project: &Project,
    template: &str,
    out: PathBuf,
    vars: &[String],
    overwrite: bool,
    json: bool,
) -> anyhow::Result<()> {
    let variables = parse_vars(vars)?;
    let registry = project.registry();
    let entry = lookup(&registry, template)?;

    let report = generate_app(
        &registry,
        &GitPatchEngine::new(),
        &GenerateOptions {
            template: entry.id(),
            output_dir: out,
            variables,
            overwrite,
            template_dir: None,
        },
    )
    .with_context(|| format!("failed to generate from '{template}'"))?;

    if json {
        return print_json(&report);
    }
    println!(
        "Generated {} file(s) from {} into {}",
        report.files_created,
        report.template_used,
        report.output_directory.display()
    );
    Ok(())
}
