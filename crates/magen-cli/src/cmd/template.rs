use super::{lookup, parse_vars};
use crate::output::{print_fields, print_json};
use crate::root::Project;
use anyhow::{bail, Context};
use clap::Subcommand;
use magen_core::authoring::{
    create_template, layer_patch, version_template, CreateOptions, VersionOptions,
};
use magen_core::layering::{create_layer, materialize_to_work};
use magen_core::paths;
use magen_core::patch::GitPatchEngine;
use magen_core::registry::{load_template_dir, TemplateRegistry};
use magen_core::testing::{test_template, TestTemplateOptions};
use magen_core::types::Platform;
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum TemplateSubcommand {
    /// Start a new template, optionally layered on an existing one
    Create {
        /// Template name (lowercase letters, digits and hyphens)
        name: String,
        /// Target platform (ios, android, cross-platform)
        #[arg(long, default_value = "ios")]
        platform: String,
        /// Initial semver version
        #[arg(long = "template-version", default_value = "1.0.0")]
        template_version: String,
        /// Parent template name[@version]; makes the new template layered
        #[arg(long)]
        based_on: Option<String>,
        /// Templates directory (default: .magen/templates)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Copy a template into a new version directory
    Version {
        /// Template name
        name: String,
        /// New semver version
        new_version: String,
        /// Version to copy from (default: highest)
        #[arg(long)]
        source_version: Option<String>,
        /// Templates directory holding <name>/<version>/
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the stored layer patch of a layered template
    Diff {
        /// Template name[@version] or template directory
        template: String,
    },
    /// Check template.json and variables.json in a template directory
    Validate { dir: PathBuf },
    /// Write a layered template's full file tree into its work/ directory
    Materialize {
        /// Template name[@version] or template directory
        template: String,
        /// Replace an existing work/ directory
        #[arg(long)]
        force: bool,
    },
    /// Diff work/ against the parent template and save the layer patch
    Layer {
        /// Template name[@version] or template directory
        template: String,
        /// Parent template, overriding basedOn
        #[arg(long)]
        based_on: Option<String>,
    },
    /// Generate a throwaway instance into the template's test/ directory
    Test {
        /// Template name[@version] or template directory
        template: String,
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
        /// Rebuild test/ even if it already has content
        #[arg(long)]
        regenerate: bool,
    },
}

pub fn run(project: &Project, subcmd: TemplateSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        TemplateSubcommand::Create {
            name,
            platform,
            template_version,
            based_on,
            out,
        } => create(project, name, &platform, template_version, based_on, out, json),
        TemplateSubcommand::Version {
            name,
            new_version,
            source_version,
            out,
        } => version(project, name, new_version, source_version, out, json),
        TemplateSubcommand::Diff { template } => diff(project, &template, json),
        TemplateSubcommand::Validate { dir } => validate(&dir, json),
        TemplateSubcommand::Materialize { template, force } => {
            materialize(project, &template, force, json)
        }
        TemplateSubcommand::Layer { template, based_on } => {
            layer(project, &template, based_on.as_deref(), json)
        }
        TemplateSubcommand::Test {
            template,
            vars,
            regenerate,
        } => test(project, &template, &vars, regenerate, json),
    }
}

/// A directory holding `template.json`, or a registry lookup.
fn template_dir(registry: &TemplateRegistry, template: &str) -> anyhow::Result<PathBuf> {
    let as_path = Path::new(template);
    if paths::descriptor_path(as_path).is_file() {
        return Ok(as_path.to_path_buf());
    }
    Ok(lookup(registry, template)?.path.clone())
}

fn create(
    project: &Project,
    name: String,
    platform: &str,
    version: String,
    based_on: Option<String>,
    out: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let platform: Platform = platform.parse()?;
    let templates_dir = out.unwrap_or_else(|| paths::project_templates_dir(&project.root));
    let report = create_template(
        &project.registry(),
        &GitPatchEngine::new(),
        &CreateOptions {
            name: name.clone(),
            platform,
            version,
            based_on,
            templates_dir,
        },
    )
    .with_context(|| format!("failed to create template '{name}'"))?;

    if json {
        return print_json(&report);
    }
    let mut fields = vec![
        ("Template", report.template.clone()),
        ("Directory", report.template_directory.display().to_string()),
        ("Variables", report.variables.to_string()),
    ];
    if let Some(parent) = &report.based_on {
        fields.push(("Based on", parent.clone()));
    }
    print_fields(&fields);
    let dir = report.template_directory.display();
    if report.based_on.is_some() {
        println!("Edit work/, then run: magen template layer {dir}");
    } else {
        println!("Add files under template/, then run: magen template validate {dir}");
    }
    Ok(())
}

fn version(
    project: &Project,
    name: String,
    new_version: String,
    source_version: Option<String>,
    out: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let report = version_template(
        &project.registry(),
        &GitPatchEngine::new(),
        &VersionOptions {
            name: name.clone(),
            new_version,
            source_version,
            templates_dir: out,
        },
    )
    .with_context(|| format!("failed to version template '{name}'"))?;

    if json {
        return print_json(&report);
    }
    print_fields(&[
        ("Template", report.template.clone()),
        ("Copied from", report.source.clone()),
        ("Directory", report.template_directory.display().to_string()),
    ]);
    Ok(())
}

fn diff(project: &Project, template: &str, json: bool) -> anyhow::Result<()> {
    let registry = project.registry();
    let dir = template_dir(&registry, template)?;
    let patch = layer_patch(&dir).with_context(|| format!("no layer patch for '{template}'"))?;

    if json {
        return print_json(&patch);
    }
    if patch.is_empty() {
        println!("{} has no changes over {}", patch.template, patch.based_on);
    } else {
        print!("{}", patch.content);
    }
    Ok(())
}

fn validate(dir: &Path, json: bool) -> anyhow::Result<()> {
    let descriptor = load_template_dir(dir)
        .with_context(|| format!("template at {} is invalid", dir.display()))?;

    let mut notes = Vec::new();
    if descriptor.is_layered() {
        let patch = dir.join(descriptor.patch_file());
        if !patch.is_file() {
            notes.push(format!(
                "layer patch {} has not been created yet",
                patch.display()
            ));
        }
    } else {
        let files = paths::template_files_dir(dir);
        if !files.is_dir() {
            bail!("template files not found at {}", files.display());
        }
    }

    if json {
        return print_json(&serde_json::json!({
            "valid": true,
            "template": descriptor.id(),
            "layered": descriptor.is_layered(),
            "variables": descriptor.variables.len(),
            "notes": notes,
        }));
    }
    println!(
        "{} is valid ({} variable(s))",
        descriptor.id(),
        descriptor.variables.len()
    );
    for note in notes {
        println!("note: {note}");
    }
    Ok(())
}

fn materialize(project: &Project, template: &str, force: bool, json: bool) -> anyhow::Result<()> {
    let registry = project.registry();
    let dir = template_dir(&registry, template)?;
    let work = materialize_to_work(&registry, &GitPatchEngine::new(), &dir, force)
        .with_context(|| format!("failed to materialize '{template}'"))?;

    if json {
        return print_json(&serde_json::json!({ "workDirectory": work }));
    }
    println!("Materialized into {}", work.display());
    println!("Edit the files there, then run: magen template layer {template}");
    Ok(())
}

fn layer(
    project: &Project,
    template: &str,
    based_on: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let registry = project.registry();
    let dir = template_dir(&registry, template)?;
    let report = create_layer(&registry, &GitPatchEngine::new(), &dir, based_on)
        .with_context(|| format!("failed to create layer for '{template}'"))?;

    if json {
        return print_json(&report);
    }
    print_fields(&[
        ("Template", report.child_template.clone()),
        ("Parent", report.parent_template.clone()),
        ("Patch", report.patch_path.display().to_string()),
    ]);
    if !report.changed {
        println!("work/ matches the parent; the patch is empty.");
    }
    Ok(())
}

fn test(
    project: &Project,
    template: &str,
    vars: &[String],
    regenerate: bool,
    json: bool,
) -> anyhow::Result<()> {
    let variables = parse_vars(vars)?;
    let registry = project.registry();
    let dir = template_dir(&registry, template)?;
    let name = if paths::descriptor_path(&dir).is_file() {
        load_template_dir(&dir)
            .with_context(|| format!("template at {} is invalid", dir.display()))?
            .id()
    } else {
        template.to_string()
    };

    let instance = test_template(
        &registry,
        &GitPatchEngine::new(),
        &TestTemplateOptions {
            template: name,
            template_dir: dir,
            variables,
            regenerate,
        },
    )
    .with_context(|| format!("failed to build test instance for '{template}'"))?;

    if json {
        return print_json(&instance);
    }
    let verb = if instance.created { "Generated" } else { "Reusing" };
    println!(
        "{verb} test instance at {}",
        instance.test_directory.display()
    );
    if !instance.created {
        println!("Pass --regenerate to rebuild it.");
    }
    Ok(())
}
