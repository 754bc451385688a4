use crate::error::MagenError;
use crate::paths::DEFAULT_PATCH_FILE;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Ios,
    Android,
    CrossPlatform,
}

impl Platform {
    pub fn all() -> &'static [Platform] {
        &[Platform::Ios, Platform::Android, Platform::CrossPlatform]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::CrossPlatform => "cross-platform",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = MagenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "cross-platform" => Ok(Platform::CrossPlatform),
            _ => Err(MagenError::InvalidPlatform(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Variable values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Number,
    Boolean,
}

impl VariableType {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableType::String => "string",
            VariableType::Number => "number",
            VariableType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete value bound to a template variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl VariableValue {
    /// Interpret a raw `key=value` right-hand side: booleans, then numbers,
    /// otherwise the string as given.
    pub fn coerce(raw: &str) -> Self {
        match raw {
            "true" => return VariableValue::Bool(true),
            "false" => return VariableValue::Bool(false),
            _ => {}
        }
        if let Ok(n) = raw.parse::<i64>() {
            return VariableValue::Number(n.into());
        }
        if let Ok(f) = raw.parse::<f64>() {
            if let Some(n) = serde_json::Number::from_f64(f) {
                return VariableValue::Number(n);
            }
        }
        VariableValue::String(raw.to_string())
    }

    pub fn var_type(&self) -> VariableType {
        match self {
            VariableValue::Bool(_) => VariableType::Boolean,
            VariableValue::Number(_) => VariableType::Number,
            VariableValue::String(_) => VariableType::String,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            VariableValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON scalar; arrays, objects and null have no variable form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(VariableValue::Bool(*b)),
            serde_json::Value::Number(n) => Some(VariableValue::Number(n.clone())),
            serde_json::Value::String(s) => Some(VariableValue::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Bool(b) => write!(f, "{b}"),
            VariableValue::Number(n) => write!(f, "{n}"),
            VariableValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        VariableValue::String(s.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        VariableValue::String(s)
    }
}

impl From<bool> for VariableValue {
    fn from(b: bool) -> Self {
        VariableValue::Bool(b)
    }
}

impl From<i64> for VariableValue {
    fn from(n: i64) -> Self {
        VariableValue::Number(n.into())
    }
}

/// Ordered variable bindings, in declaration order then caller order.
pub type Variables = IndexMap<String, VariableValue>;

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<VariableValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl TemplateVariable {
    pub fn new(name: &str, var_type: VariableType, required: bool) -> Self {
        Self {
            name: name.to_string(),
            var_type,
            required,
            description: None,
            default: None,
            regex: None,
            allowed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    pub patch_file: String,
}

/// Object form of a parent reference: `"extends": {"template": "ios-base", "version": "1.0.0"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendsConfig {
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// `name` or `name@version`. A version of `latest` means "highest available".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateRef {
    pub name: String,
    pub version: Option<String>,
}

impl TemplateRef {
    pub fn parse(s: &str) -> Self {
        match s.split_once('@') {
            Some((name, version)) => Self::new(name, Some(version)),
            None => Self::new(s, None),
        }
    }

    pub fn new(name: &str, version: Option<&str>) -> Self {
        let version = version
            .filter(|v| !v.is_empty() && *v != "latest")
            .map(str::to_string);
        Self {
            name: name.to_string(),
            version,
        }
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => f.write_str(&self.name),
        }
    }
}

/// One template's `template.json`, with `variables` filled from `variables.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDescriptor {
    pub name: String,
    pub platform: Platform,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub based_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<ExtendsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<LayerConfig>,
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TemplateDescriptor {
    /// The parent this template layers on. `extends` takes precedence over `basedOn`.
    pub fn parent(&self) -> Option<TemplateRef> {
        if let Some(ext) = &self.extends {
            return Some(TemplateRef::new(&ext.template, ext.version.as_deref()));
        }
        self.based_on.as_deref().map(TemplateRef::parse)
    }

    pub fn is_layered(&self) -> bool {
        self.parent().is_some()
    }

    pub fn patch_file(&self) -> &str {
        self.layer
            .as_ref()
            .map(|l| l.patch_file.as_str())
            .unwrap_or(DEFAULT_PATCH_FILE)
    }

    /// `name@version`, the registry's unique key.
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    pub fn required_variables(&self) -> impl Iterator<Item = &TemplateVariable> {
        self.variables.iter().filter(|v| v.required)
    }

    pub fn optional_variables(&self) -> impl Iterator<Item = &TemplateVariable> {
        self.variables.iter().filter(|v| !v.required)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trip() {
        for p in Platform::all() {
            let parsed: Platform = p.as_str().parse().unwrap();
            assert_eq!(parsed, *p);
        }
        assert!("windows".parse::<Platform>().is_err());
        assert_eq!(
            serde_json::to_string(&Platform::CrossPlatform).unwrap(),
            "\"cross-platform\""
        );
    }

    #[test]
    fn coerce_cli_values() {
        assert_eq!(VariableValue::coerce("true"), VariableValue::Bool(true));
        assert_eq!(VariableValue::coerce("42"), VariableValue::from(42));
        assert_eq!(VariableValue::coerce("1.5").var_type(), VariableType::Number);
        assert_eq!(VariableValue::coerce("MyApp"), VariableValue::from("MyApp"));
        assert_eq!(VariableValue::coerce("True").var_type(), VariableType::String);
    }

    #[test]
    fn untagged_values_deserialize_by_json_type() {
        let v: Vec<VariableValue> = serde_json::from_str(r#"[true, 3, "x"]"#).unwrap();
        assert_eq!(v[0].var_type(), VariableType::Boolean);
        assert_eq!(v[1].var_type(), VariableType::Number);
        assert_eq!(v[2].var_type(), VariableType::String);
        assert_eq!(v[1].to_string(), "3");
    }

    #[test]
    fn template_ref_parse() {
        let r = TemplateRef::parse("ios-base@1.2.0");
        assert_eq!(r.name, "ios-base");
        assert_eq!(r.version.as_deref(), Some("1.2.0"));
        assert_eq!(r.to_string(), "ios-base@1.2.0");

        let latest = TemplateRef::parse("ios-base@latest");
        assert_eq!(latest.version, None);
        assert_eq!(latest.to_string(), "ios-base");
    }

    #[test]
    fn descriptor_parent_prefers_extends() {
        let d: TemplateDescriptor = serde_json::from_str(
            r#"{
                "name": "ios-login",
                "platform": "ios",
                "version": "1.0.0",
                "basedOn": "ios-old",
                "extends": {"template": "ios-base", "version": "2.0.0"}
            }"#,
        )
        .unwrap();
        let parent = d.parent().unwrap();
        assert_eq!(parent.to_string(), "ios-base@2.0.0");
        assert!(d.is_layered());
        assert_eq!(d.patch_file(), "layer.patch");
        assert_eq!(d.id(), "ios-login@1.0.0");
    }

    #[test]
    fn descriptor_serializes_camel_case() {
        let d = TemplateDescriptor {
            name: "a".into(),
            platform: Platform::Android,
            version: "0.1.0".into(),
            based_on: Some("b".into()),
            extends: None,
            layer: Some(LayerConfig {
                patch_file: "custom.patch".into(),
            }),
            variables: vec![],
            tags: vec![],
            description: None,
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["basedOn"], "b");
        assert_eq!(json["layer"]["patchFile"], "custom.patch");
        assert!(json.get("tags").is_none());
        assert_eq!(d.patch_file(), "custom.patch");
    }
}
