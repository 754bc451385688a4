use crate::output::{print_json, print_table};
use crate::root::Project;
use anyhow::Context;
use magen_core::metadata::MetadataCatalog;
use magen_core::paths;
use magen_core::selection::{explain_selection, Complexity, TemplateRequirements, TemplateSelector};
use magen_core::types::Platform;
use std::path::PathBuf;

pub struct SelectArgs {
    pub platform: String,
    pub capabilities: Vec<String>,
    pub complexity: Option<String>,
    pub tags: Vec<String>,
    pub dir: Option<PathBuf>,
    pub all: bool,
}

pub fn run(project: &Project, args: SelectArgs, json: bool) -> anyhow::Result<()> {
    let dir = args
        .dir
        .unwrap_or_else(|| paths::project_templates_dir(&project.root));
    let catalog = MetadataCatalog::load(&dir)
        .with_context(|| format!("failed to read template metadata in {}", dir.display()))?;

    let mut requirements = TemplateRequirements::new(args.platform.parse::<Platform>()?);
    requirements.required_capabilities = args.capabilities;
    requirements.tags = args.tags;
    requirements.complexity = args
        .complexity
        .as_deref()
        .map(str::parse::<Complexity>)
        .transpose()?;

    let templates = catalog.list(false);
    let selector = TemplateSelector::new();

    if args.all {
        let ranked = selector.rank(&templates, &requirements);
        if json {
            return print_json(&ranked);
        }
        let rows = ranked
            .iter()
            .map(|r| {
                vec![
                    r.template.id.clone(),
                    format!("{:.2}", r.score),
                    r.missing_capabilities.join(", "),
                ]
            })
            .collect();
        print_table(&["ID", "SCORE", "MISSING"], rows);
        return Ok(());
    }

    let best = selector
        .select(&templates, &requirements)
        .with_context(|| format!("no {} template in {}", requirements.platform, dir.display()))?;
    if json {
        return print_json(&best);
    }
    println!("{}", explain_selection(&best));
    Ok(())
}
