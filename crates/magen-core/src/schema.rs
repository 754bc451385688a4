//! Field-level validation for `template.json` and `variables.json`.
//!
//! Validation walks the raw JSON so that every violation is reported with its
//! field path (`variables.1.type: ...`) instead of stopping at the first serde
//! error. Only documents that pass are deserialized into typed descriptors.

use crate::error::{MagenError, Result};
use crate::paths::is_semver;
use crate::types::{Platform, TemplateDescriptor, TemplateVariable};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

pub type Validation<T> = std::result::Result<T, Vec<String>>;

/// Validate a raw descriptor, returning the typed value or every error found.
pub fn safe_validate_descriptor(data: &Value) -> Validation<TemplateDescriptor> {
    let mut errors = Vec::new();
    let Some(obj) = data.as_object() else {
        return Err(vec!["Expected object, received ".to_string() + json_kind(data)]);
    };

    check_non_empty_string(obj, "name", "Template name is required", true, &mut errors);
    match obj.get("platform") {
        None => errors.push("platform: Required".to_string()),
        Some(Value::String(p)) if p.parse::<Platform>().is_ok() => {}
        Some(Value::String(p)) => errors.push(format!(
            "platform: Invalid platform '{p}', expected one of: ios, android, cross-platform"
        )),
        Some(other) => errors.push(expected("platform", "string", other)),
    }
    match obj.get("version") {
        None => errors.push("version: Required".to_string()),
        Some(Value::String(v)) if is_semver(v) => {}
        Some(Value::String(_)) => errors
            .push("version: Version must follow semver format (e.g., 0.1.0)".to_string()),
        Some(other) => errors.push(expected("version", "string", other)),
    }
    check_optional_string(obj, "basedOn", &mut errors);
    check_optional_string(obj, "description", &mut errors);

    if let Some(ext) = obj.get("extends") {
        match ext.as_object() {
            Some(ext_obj) => {
                let mut ext_errors = Vec::new();
                check_non_empty_string(
                    ext_obj,
                    "template",
                    "Parent template name is required",
                    true,
                    &mut ext_errors,
                );
                match ext_obj.get("version") {
                    None => {}
                    Some(Value::String(s)) if s == "latest" || is_semver(s) => {}
                    Some(Value::String(_)) => ext_errors
                        .push("version: Version must be semver format or 'latest'".to_string()),
                    Some(other) => ext_errors.push(expected("version", "string", other)),
                }
                errors.extend(ext_errors.into_iter().map(|e| format!("extends.{e}")));
            }
            None => errors.push(expected("extends", "object", ext)),
        }
    }

    if let Some(layer) = obj.get("layer") {
        match layer.as_object() {
            Some(layer_obj) => {
                let mut layer_errors = Vec::new();
                check_non_empty_string(
                    layer_obj,
                    "patchFile",
                    "Patch file path is required",
                    true,
                    &mut layer_errors,
                );
                errors.extend(layer_errors.into_iter().map(|e| format!("layer.{e}")));
            }
            None => errors.push(expected("layer", "object", layer)),
        }
    }

    if let Some(tags) = obj.get("tags") {
        check_string_array(tags, "tags", &mut errors);
    }

    if let Some(vars) = obj.get("variables") {
        if let Err(var_errors) = validate_variable_list(vars) {
            errors.extend(var_errors.into_iter().map(|e| format!("variables{e}")));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    serde_json::from_value(data.clone()).map_err(|e| vec![e.to_string()])
}

/// Validate a raw descriptor, failing with [`MagenError::InvalidDescriptor`].
pub fn validate_descriptor(data: &Value, path: &Path) -> Result<TemplateDescriptor> {
    safe_validate_descriptor(data).map_err(|errors| MagenError::InvalidDescriptor {
        path: path.to_path_buf(),
        errors,
    })
}

/// Validate a `variables.json` document: `{"variables": [...]}`.
pub fn safe_validate_variables(data: &Value) -> Validation<Vec<TemplateVariable>> {
    let Some(obj) = data.as_object() else {
        return Err(vec!["Expected object, received ".to_string() + json_kind(data)]);
    };
    let Some(vars) = obj.get("variables") else {
        return Err(vec!["variables: Required".to_string()]);
    };
    validate_variable_list(vars).map_err(|errs| {
        errs.into_iter()
            .map(|e| format!("variables{e}"))
            .collect::<Vec<_>>()
    })?;
    serde_json::from_value(vars.clone()).map_err(|e| vec![e.to_string()])
}

/// Errors are returned with a leading `.N.field` / `: msg` suffix so callers can
/// prefix them with the list's own path.
fn validate_variable_list(vars: &Value) -> Validation<()> {
    let Some(list) = vars.as_array() else {
        return Err(vec![format!(
            ": Expected array, received {}",
            json_kind(vars)
        )]);
    };

    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for (i, var) in list.iter().enumerate() {
        let Some(v) = var.as_object() else {
            errors.push(format!(".{i}: Expected object, received {}", json_kind(var)));
            continue;
        };
        let mut local = Vec::new();
        check_non_empty_string(v, "name", "Variable name is required", true, &mut local);
        if let Some(Value::String(name)) = v.get("name") {
            if !name.is_empty() && !seen.insert(name.clone()) {
                local.push(format!("name: Duplicate variable name '{name}'"));
            }
        }

        let declared = match v.get("type") {
            None => {
                local.push("type: Required".to_string());
                None
            }
            Some(Value::String(t)) if matches!(t.as_str(), "string" | "number" | "boolean") => {
                Some(t.as_str())
            }
            Some(_) => {
                local.push(
                    "type: Variable type must be string, number, or boolean".to_string(),
                );
                None
            }
        };

        match v.get("required") {
            None => local.push("required: Required".to_string()),
            Some(Value::Bool(_)) => {}
            Some(other) => local.push(expected("required", "boolean", other)),
        }

        check_non_empty_string(
            v,
            "description",
            "Variable description is required",
            false,
            &mut local,
        );

        if let Some(default) = v.get("default") {
            let kind = match default {
                Value::String(_) => Some("string"),
                Value::Number(_) => Some("number"),
                Value::Bool(_) => Some("boolean"),
                _ => None,
            };
            match (kind, declared) {
                (None, _) => local.push(format!(
                    "default: Expected string, number or boolean, received {}",
                    json_kind(default)
                )),
                (Some(k), Some(t)) if k != t => local.push(format!(
                    "default: Default value type {k} does not match declared type {t}"
                )),
                _ => {}
            }
        }

        match v.get("regex") {
            None => {}
            Some(Value::String(pattern)) => {
                if let Err(e) = Regex::new(pattern) {
                    local.push(format!("regex: Invalid pattern '{pattern}': {e}"));
                }
            }
            Some(other) => local.push(expected("regex", "string", other)),
        }

        if let Some(allowed) = v.get("enum") {
            check_string_array(allowed, "enum", &mut local);
        }

        errors.extend(local.into_iter().map(|e| format!(".{i}.{e}")));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected(field: &str, kind: &str, got: &Value) -> String {
    format!("{field}: Expected {kind}, received {}", json_kind(got))
}

fn check_non_empty_string(
    obj: &Map<String, Value>,
    field: &str,
    empty_msg: &str,
    required: bool,
    errors: &mut Vec<String>,
) {
    match obj.get(field) {
        None if required => errors.push(format!("{field}: Required")),
        None => {}
        Some(Value::String(s)) if s.is_empty() => errors.push(format!("{field}: {empty_msg}")),
        Some(Value::String(_)) => {}
        Some(other) => errors.push(expected(field, "string", other)),
    }
}

fn check_optional_string(obj: &Map<String, Value>, field: &str, errors: &mut Vec<String>) {
    match obj.get(field) {
        None | Some(Value::String(_)) => {}
        Some(other) => errors.push(expected(field, "string", other)),
    }
}

fn check_string_array(value: &Value, field: &str, errors: &mut Vec<String>) {
    match value.as_array() {
        Some(items) => {
            for (i, item) in items.iter().enumerate() {
                if !item.is_string() {
                    errors.push(expected(&format!("{field}.{i}"), "string", item));
                }
            }
        }
        None => errors.push(expected(field, "array", value)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Value {
        json!({"name": "ios-base", "platform": "ios", "version": "1.0.0"})
    }

    #[test]
    fn minimal_descriptor_is_valid() {
        let d = safe_validate_descriptor(&base()).unwrap();
        assert_eq!(d.name, "ios-base");
        assert!(d.variables.is_empty());
    }

    #[test]
    fn semver_gate() {
        for bad in ["1.0", "v1.0.0", "1.0.0-beta", "1.0.0.0"] {
            let mut d = base();
            d["version"] = json!(bad);
            let errs = safe_validate_descriptor(&d).unwrap_err();
            assert_eq!(
                errs,
                vec!["version: Version must follow semver format (e.g., 0.1.0)"],
                "{bad}"
            );
        }
        for good in ["0.0.1", "1.0.0", "10.20.30"] {
            let mut d = base();
            d["version"] = json!(good);
            assert!(safe_validate_descriptor(&d).is_ok(), "{good}");
        }
    }

    #[test]
    fn errors_are_collected_with_paths() {
        let errs = safe_validate_descriptor(&json!({
            "name": "",
            "platform": "windows",
            "layer": {"patchFile": ""},
            "tags": ["ok", 3]
        }))
        .unwrap_err();
        assert!(errs.contains(&"name: Template name is required".to_string()));
        assert!(errs.iter().any(|e| e.starts_with("platform: Invalid platform")));
        assert!(errs.contains(&"version: Required".to_string()));
        assert!(errs.contains(&"layer.patchFile: Patch file path is required".to_string()));
        assert!(errs.contains(&"tags.1: Expected string, received number".to_string()));
    }

    #[test]
    fn extends_object_is_checked() {
        let mut d = base();
        d["extends"] = json!({"template": "", "version": "2.x"});
        let errs = safe_validate_descriptor(&d).unwrap_err();
        assert!(errs.contains(&"extends.template: Parent template name is required".to_string()));
        assert!(errs.iter().any(|e| e.starts_with("extends.version:")));

        d["extends"] = json!({"template": "ios-base", "version": "latest"});
        assert!(safe_validate_descriptor(&d).is_ok());
    }

    #[test]
    fn variable_errors_carry_index() {
        let errs = safe_validate_variables(&json!({"variables": [
            {"name": "appName", "type": "string", "required": true},
            {"name": "appName", "type": "string", "required": false},
            {"name": "count", "type": "integer", "required": true},
            {"name": "flag", "type": "boolean", "required": false, "default": "yes"},
            {"name": "id", "type": "string", "required": true, "regex": "([a-z"}
        ]}))
        .unwrap_err();
        assert!(errs.contains(&"variables.1.name: Duplicate variable name 'appName'".to_string()));
        assert!(errs.contains(
            &"variables.2.type: Variable type must be string, number, or boolean".to_string()
        ));
        assert!(errs.contains(
            &"variables.3.default: Default value type string does not match declared type boolean"
                .to_string()
        ));
        assert!(errs.iter().any(|e| e.starts_with("variables.4.regex: Invalid pattern")));
    }

    #[test]
    fn valid_variables_parse() {
        let vars = safe_validate_variables(&json!({"variables": [
            {"name": "appName", "type": "string", "required": true, "default": "TestApp",
             "regex": "^[A-Z]", "description": "App name"},
            {"name": "theme", "type": "string", "required": false, "enum": ["light", "dark"]}
        ]}))
        .unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[1].allowed.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn missing_variables_key() {
        assert_eq!(
            safe_validate_variables(&json!({})).unwrap_err(),
            vec!["variables: Required"]
        );
    }

    #[test]
    fn validate_descriptor_wraps_errors() {
        let err = validate_descriptor(&json!({}), Path::new("/t/template.json")).unwrap_err();
        match err {
            MagenError::InvalidDescriptor { errors, .. } => assert_eq!(errors.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }
}
