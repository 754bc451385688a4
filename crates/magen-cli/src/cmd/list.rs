use super::parse_platform;
use crate::output::{print_json, print_table};
use crate::root::Project;
use magen_core::registry::{SearchQuery, TemplateEntry};

pub fn list(project: &Project, platform: Option<&str>, json: bool) -> anyhow::Result<()> {
    let platform = parse_platform(platform)?;
    let registry = project.registry();
    print_entries(&registry.list_templates(platform), json)
}

pub fn search(
    project: &Project,
    query: Option<String>,
    platform: Option<&str>,
    tags: Vec<String>,
    name: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let query = SearchQuery {
        query,
        platform: parse_platform(platform)?,
        tags,
        name,
    };
    let registry = project.registry();
    print_entries(&registry.search_templates(&query), json)
}

fn print_entries(entries: &[&TemplateEntry], json: bool) -> anyhow::Result<()> {
    if json {
        let summaries: Vec<_> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "name": e.descriptor.name,
                    "version": e.version,
                    "platform": e.descriptor.platform,
                    "description": e.descriptor.description,
                    "tags": e.descriptor.tags,
                    "basedOn": e.descriptor.parent().map(|p| p.to_string()),
                    "path": e.path,
                    "source": e.root_kind,
                })
            })
            .collect();
        return print_json(&summaries);
    }

    if entries.is_empty() {
        println!("No templates found.");
        return Ok(());
    }

    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.descriptor.name.clone(),
                e.version.clone(),
                e.descriptor.platform.to_string(),
                e.descriptor
                    .parent()
                    .map(|p| p.to_string())
                    .unwrap_or_default(),
                e.descriptor.description.clone().unwrap_or_default(),
            ]
        })
        .collect();
    print_table(&["NAME", "VERSION", "PLATFORM", "BASED ON", "DESCRIPTION"], rows);
    Ok(())
}
