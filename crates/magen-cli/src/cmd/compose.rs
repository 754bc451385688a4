use crate::output::print_json;
use crate::root::Project;
use anyhow::Context;
use magen_core::metadata::MetadataCatalog;
use magen_core::paths;
use std::path::PathBuf;

pub fn run(project: &Project, id: &str, dir: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let dir = dir.unwrap_or_else(|| paths::project_templates_dir(&project.root));
    let catalog = MetadataCatalog::load(&dir)
        .with_context(|| format!("failed to read template metadata in {}", dir.display()))?;
    let merged = catalog
        .resolve(id)
        .with_context(|| format!("failed to resolve '{id}'"))?;

    if !json {
        let mut chain = vec![id.to_string()];
        let mut current = catalog.get(id)?;
        while let Some(parent) = current.extends.as_deref() {
            chain.push(parent.to_string());
            current = catalog.get(parent)?;
        }
        eprintln!("Resolved {}", chain.join(" → "));
    }
    print_json(&merged)
}
