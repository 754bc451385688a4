use crate::schema::Validation;
use crate::types::{TemplateVariable, VariableType, VariableValue, Variables};
use regex::Regex;

/// Declared defaults first, then every caller-provided binding on top.
///
/// Undeclared caller keys pass through unchecked.
pub fn merge_variables(declared: &[TemplateVariable], provided: &Variables) -> Variables {
    let mut merged = Variables::new();
    for var in declared {
        if let Some(default) = &var.default {
            merged.insert(var.name.clone(), default.clone());
        }
    }
    for (k, v) in provided {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Check merged values against declarations, accumulating every violation.
pub fn validate_variables(declared: &[TemplateVariable], merged: &Variables) -> Validation<()> {
    let mut errors = Vec::new();

    for var in declared {
        let Some(value) = merged.get(&var.name) else {
            if var.required {
                errors.push(format!("Required variable '{}' is missing", var.name));
            }
            continue;
        };

        let actual = value.var_type();
        if actual != var.var_type {
            errors.push(format!(
                "Variable '{}' has wrong type: expected {}, got {}",
                var.name, var.var_type, actual
            ));
        }

        if let (Some(pattern), Some(s)) = (&var.regex, value.as_str()) {
            match Regex::new(pattern) {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => errors.push(format!(
                    "Variable '{}' does not match pattern: {}",
                    var.name, pattern
                )),
                Err(e) => errors.push(format!(
                    "Variable '{}' has an invalid pattern {}: {}",
                    var.name, pattern, e
                )),
            }
        }

        if let (Some(allowed), Some(s)) = (&var.allowed, value.as_str()) {
            if !allowed.iter().any(|a| a == s) {
                errors.push(format!(
                    "Variable '{}' must be one of: {}. Got: {}",
                    var.name,
                    allowed.join(", "),
                    s
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Stand-in value for a variable with no default, used when a template is
/// instantiated for inspection rather than for a real app.
pub fn placeholder_value(var: &TemplateVariable) -> VariableValue {
    match var.var_type {
        VariableType::String => VariableValue::String(format!("{{{{{}}}}}", var.name)),
        VariableType::Number => VariableValue::from(0),
        VariableType::Boolean => VariableValue::Bool(false),
    }
}

/// Defaults where declared, placeholders for required variables without one.
pub fn placeholder_variables(declared: &[TemplateVariable]) -> Variables {
    let mut vars = Variables::new();
    for var in declared {
        if let Some(default) = &var.default {
            vars.insert(var.name.clone(), default.clone());
        } else if var.required {
            vars.insert(var.name.clone(), placeholder_value(var));
        }
    }
    vars
}
