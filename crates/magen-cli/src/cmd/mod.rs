pub mod compose;
pub mod generate;
pub mod info;
pub mod list;
pub mod scaffold;
pub mod schema;
pub mod sdd;
pub mod select;
pub mod template;

use anyhow::{bail, Context};
use magen_core::registry::{TemplateEntry, TemplateRegistry};
use magen_core::types::{Platform, VariableValue, Variables};

pub fn parse_platform(raw: Option<&str>) -> anyhow::Result<Option<Platform>> {
    raw.map(str::parse::<Platform>).transpose().map_err(Into::into)
}

/// Parse repeated `--var key=value` flags, coercing each value.
pub fn parse_vars(raw: &[String]) -> anyhow::Result<Variables> {
    let mut vars = Variables::new();
    for item in raw {
        let (key, value) = item
            .split_once('=')
            .with_context(|| format!("invalid --var '{item}': expected KEY=VALUE"))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid --var '{item}': empty key");
        }
        vars.insert(key.to_string(), VariableValue::coerce(value));
    }
    Ok(vars)
}

/// Look a template up, suggesting close names when it does not exist.
pub fn lookup<'a>(registry: &'a TemplateRegistry, name: &str) -> anyhow::Result<&'a TemplateEntry> {
    if let Some(entry) = registry.find_template(name) {
        return Ok(entry);
    }
    let similar = registry.find_similar_templates(name, 3);
    if similar.is_empty() {
        bail!("template not found: {name}");
    }
    bail!(
        "template not found: {name}. Did you mean: {}?",
        similar.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vars_are_coerced() {
        let vars = parse_vars(&[
            "appName=Field Service".to_string(),
            "port=8080".to_string(),
            "offline=true".to_string(),
            "expr=a=b".to_string(),
        ])
        .unwrap();
        assert_eq!(vars["appName"], VariableValue::from("Field Service"));
        assert_eq!(vars["port"], VariableValue::from(8080_i64));
        assert_eq!(vars["offline"], VariableValue::from(true));
        assert_eq!(vars["expr"], VariableValue::from("a=b"));
    }

    #[test]
    fn malformed_vars_are_rejected() {
        assert!(parse_vars(&["novalue".to_string()]).is_err());
        assert!(parse_vars(&["=x".to_string()]).is_err());
    }

    #[test]
    fn platform_flag() {
        assert_eq!(parse_platform(Some("android")).unwrap(), Some(Platform::Android));
        assert_eq!(parse_platform(None).unwrap(), None);
        assert!(parse_platform(Some("web")).is_err());
    }
}
