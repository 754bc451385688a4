//! The rich `TemplateMetadata` document: use cases, features, extension points,
//! generation hooks and documentation links. This is the shape the composer
//! merges and the JSON Schema export describes.

use crate::compose::TemplateComposer;
use crate::error::{MagenError, Result};
use crate::paths::TEMPLATE_JSON;
use crate::schema::Validation;
use crate::types::Platform;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Application,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    #[serde(rename = "type")]
    pub platform_type: Platform,
    pub min_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UseCaseInfo {
    pub primary: String,
    pub scenarios: Vec<String>,
    pub when: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionPoint {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_guidance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_files: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FeatureInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub files: Vec<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MetadataVariableType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// A variable as declared in rich metadata. Unlike the descriptor variant it
/// allows array/object types and arbitrary JSON defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MetadataVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: MetadataVariableType,
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileProcessor {
    Handlebars,
    Copy,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileTransform {
    pub pattern: String,
    pub processor: FileProcessor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_extension: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Rename,
    Move,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FileOperation {
    pub action: FileAction,
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_hook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_hook: Option<String>,
    pub file_transforms: Vec<FileTransform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_operations: Option<Vec<FileOperation>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExternalLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub getting_started: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_links: Option<Vec<ExternalLink>>,
}

/// Complete metadata for an application template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateMetadata {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub platform: PlatformInfo,
    pub use_case: UseCaseInfo,
    pub capabilities: Vec<String>,
    /// Id of the template this one inherits from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<FeatureInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_points: Option<Vec<ExtensionPoint>>,
    pub requirements: serde_json::Map<String, Value>,
    pub template_variables: Vec<MetadataVariable>,
    pub generation: GenerationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<DocumentationLinks>,
    pub tags: Vec<String>,
}

impl TemplateMetadata {
    pub fn is_hidden(&self) -> bool {
        self.hidden.unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Keyed collections
// ---------------------------------------------------------------------------

/// Entries of a collection that merges by identity rather than by position.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for MetadataVariable {
    fn key(&self) -> &str {
        &self.name
    }
}

impl Keyed for ExtensionPoint {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for FeatureInfo {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for crate::types::TemplateVariable {
    fn key(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

const REQUIRED_FIELDS: &[&str] = &[
    "$schema",
    "version",
    "type",
    "id",
    "displayName",
    "description",
    "platform",
    "useCase",
    "capabilities",
    "requirements",
    "templateVariables",
    "generation",
    "tags",
];

/// Check a raw metadata document, reporting every problem with its field path.
pub fn validate_metadata(data: &Value) -> Validation<TemplateMetadata> {
    let Some(obj) = data.as_object() else {
        return Err(vec!["Expected object".to_string()]);
    };

    let mut errors: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|f| !obj.contains_key(**f))
        .map(|f| format!("{f}: Required"))
        .collect();

    if let Some(kind) = obj.get("type") {
        if kind != "application" {
            errors.push(format!("type: Invalid literal value, expected \"application\", received {kind}"));
        }
    }

    if let Some(platform) = obj.get("platform") {
        match platform.get("type").and_then(Value::as_str) {
            Some(p) if p.parse::<Platform>().is_ok() => {}
            Some(p) => errors.push(format!(
                "platform.type: Invalid enum value. Expected 'ios' | 'android' | 'cross-platform', received '{p}'"
            )),
            None => errors.push("platform.type: Required".to_string()),
        }
        if platform.get("minVersion").is_none() {
            errors.push("platform.minVersion: Required".to_string());
        }
    }

    if let Some(use_case) = obj.get("useCase") {
        for field in ["primary", "scenarios", "when"] {
            if use_case.get(field).is_none() {
                errors.push(format!("useCase.{field}: Required"));
            }
        }
    }

    if let Some(generation) = obj.get("generation") {
        if generation.get("fileTransforms").is_none() {
            errors.push("generation.fileTransforms: Required".to_string());
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    serde_json::from_value(data.clone()).map_err(|e| vec![e.to_string()])
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub metadata: TemplateMetadata,
    pub path: PathBuf,
}

/// Metadata documents found at `<dir>/*/template.json`, keyed by `id`.
#[derive(Debug, Clone, Default)]
pub struct MetadataCatalog {
    entries: Vec<CatalogEntry>,
}

impl MetadataCatalog {
    /// Load every parseable metadata document under `dir`. Invalid ones are
    /// logged and skipped. Files without an `id` are plain template
    /// descriptors sharing the directory and are passed over silently.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut children: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.join(TEMPLATE_JSON).is_file())
            .collect();
        children.sort();

        let mut entries = Vec::new();
        for path in children {
            let file = path.join(TEMPLATE_JSON);
            let raw = match std::fs::read_to_string(&file) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "could not read template metadata");
                    continue;
                }
            };
            let value: Value = match serde_json::from_str(&raw) {
                Ok(v) => v,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "template metadata is not valid JSON");
                    continue;
                }
            };
            if value.get("id").is_none() {
                debug!(path = %file.display(), "no metadata id, skipping template descriptor");
                continue;
            }
            match validate_metadata(&value) {
                Ok(metadata) => entries.push(CatalogEntry { metadata, path }),
                Err(errors) => warn!(
                    path = %file.display(),
                    "skipping invalid template metadata:\n  {}",
                    errors.join("\n  ")
                ),
            }
        }
        Ok(Self { entries })
    }

    pub fn list(&self, include_hidden: bool) -> Vec<&TemplateMetadata> {
        self.entries
            .iter()
            .map(|e| &e.metadata)
            .filter(|m| include_hidden || !m.is_hidden())
            .collect()
    }

    pub fn get(&self, id: &str) -> Result<&TemplateMetadata> {
        self.entry(id).map(|e| &e.metadata)
    }

    pub fn path(&self, id: &str) -> Result<&Path> {
        self.entry(id).map(|e| e.path.as_path())
    }

    fn entry(&self, id: &str) -> Result<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.metadata.id == id)
            .ok_or_else(|| MagenError::TemplateNotFound(id.to_string()))
    }

    /// Fully merged metadata for `id`, with every ancestor folded in.
    pub fn resolve(&self, id: &str) -> Result<TemplateMetadata> {
        TemplateComposer::new().resolve_inheritance_chain(id, |tid| self.get(tid).cloned())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde_json::json;

    pub fn metadata(id: &str, extends: Option<&str>) -> TemplateMetadata {
        let mut value = metadata_json(id);
        if let Some(parent) = extends {
            value["extends"] = json!(parent);
        }
        serde_json::from_value(value).unwrap()
    }

    pub fn metadata_json(id: &str) -> Value {
        json!({
            "$schema": "https://magen.dev/schemas/template.json",
            "version": "1.0.0",
            "type": "application",
            "id": id,
            "displayName": id.to_uppercase(),
            "description": format!("{id} template"),
            "platform": {"type": "ios", "minVersion": "17.0"},
            "useCase": {"primary": "demo", "scenarios": [format!("{id}-scenario")], "when": "always"},
            "capabilities": [],
            "requirements": {},
            "templateVariables": [],
            "generation": {"fileTransforms": []},
            "tags": []
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn valid_metadata_parses() {
        let m = validate_metadata(&metadata_json("ios-base")).unwrap();
        assert_eq!(m.id, "ios-base");
        assert_eq!(m.platform.platform_type, Platform::Ios);
        assert!(!m.is_hidden());
    }

    #[test]
    fn missing_fields_are_listed() {
        let errs = validate_metadata(&json!({"id": "x", "type": "library"})).unwrap_err();
        assert!(errs.contains(&"displayName: Required".to_string()));
        assert!(errs.contains(&"generation: Required".to_string()));
        assert!(errs.iter().any(|e| e.starts_with("type: Invalid literal value")));
    }

    #[test]
    fn nested_platform_checked() {
        let mut v = metadata_json("x");
        v["platform"] = json!({"type": "web"});
        let errs = validate_metadata(&v).unwrap_err();
        assert!(errs.iter().any(|e| e.starts_with("platform.type: Invalid enum value")));
        assert!(errs.contains(&"platform.minVersion: Required".to_string()));
    }

    #[test]
    fn metadata_round_trips_field_names() {
        let m = metadata("ios-base", Some("root"));
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["$schema"], "https://magen.dev/schemas/template.json");
        assert_eq!(v["displayName"], "IOS-BASE");
        assert_eq!(v["useCase"]["when"], "always");
        assert_eq!(v["extends"], "root");
        assert!(v.get("hidden").is_none());
    }

    #[test]
    fn catalog_loads_resolves_and_hides() {
        let dir = TempDir::new().unwrap();
        let mut base = metadata_json("base");
        base["capabilities"] = json!(["offline"]);
        let mut child = metadata_json("child");
        child["extends"] = json!("base");
        child["capabilities"] = json!(["login"]);
        let mut hidden = metadata_json("internal");
        hidden["hidden"] = json!(true);

        for (name, v) in [("base", &base), ("child", &child), ("internal", &hidden)] {
            std::fs::create_dir_all(dir.path().join(name)).unwrap();
            std::fs::write(
                dir.path().join(name).join("template.json"),
                serde_json::to_string_pretty(v).unwrap(),
            )
            .unwrap();
        }
        std::fs::create_dir_all(dir.path().join("ios-base")).unwrap();
        std::fs::write(
            dir.path().join("ios-base/template.json"),
            r#"{"name": "ios-base", "platform": "ios", "version": "1.0.0"}"#,
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("broken")).unwrap();
        std::fs::write(dir.path().join("broken/template.json"), "{not json").unwrap();

        let catalog = MetadataCatalog::load(dir.path()).unwrap();
        assert_eq!(catalog.list(false).len(), 2);
        assert_eq!(catalog.list(true).len(), 3);

        let resolved = catalog.resolve("child").unwrap();
        assert_eq!(resolved.capabilities, vec!["offline", "login"]);
        assert_eq!(resolved.extends, None);
        assert!(matches!(
            catalog.get("nope"),
            Err(MagenError::TemplateNotFound(_))
        ));
    }
}
