use super::lookup;
use crate::output::{print_fields, print_json};
use crate::root::Project;
use anyhow::Context;

pub fn run(project: &Project, template: &str, json: bool) -> anyhow::Result<()> {
    let registry = project.registry();
    let entry = lookup(&registry, template)?;
    let info = registry
        .template_info(&entry.id())
        .with_context(|| format!("failed to inspect template '{template}'"))?;

    if json {
        return print_json(&info);
    }

    let d = &info.descriptor;
    let mut fields = vec![
        ("Template", entry.id()),
        ("Platform", d.platform.to_string()),
        ("Path", info.path.display().to_string()),
    ];
    if let Some(desc) = &d.description {
        fields.push(("Description", desc.clone()));
    }
    if !d.tags.is_empty() {
        fields.push(("Tags", d.tags.join(", ")));
    }
    fields.push(("Layered", if info.is_layered { "yes" } else { "no" }.to_string()));
    fields.push(("Chain", info.inheritance_chain.join(" → ")));
    if info.has_test_instance {
        fields.push(("Test instance", info.path.join("test").display().to_string()));
    }
    print_fields(&fields);

    if d.variables.is_empty() {
        return Ok(());
    }
    println!("\nVariables ({}):", info.total_variables);
    for v in &d.variables {
        let marker = if v.required { "*" } else { " " };
        let default = v
            .default
            .as_ref()
            .map(|d| format!(" = {d}"))
            .unwrap_or_default();
        println!("  {marker} {:<20} {}{default}", v.name, v.var_type.as_str());
        if let Some(desc) = &v.description {
            println!("      {desc}");
        }
    }
    Ok(())
}
