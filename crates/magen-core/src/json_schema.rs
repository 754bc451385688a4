//! JSON Schema for `TemplateMetadata`, generated from the Rust types so the
//! checked-in schema file cannot drift from what the composer accepts.

use crate::error::{MagenError, Result};
use crate::io::atomic_write;
use crate::metadata::TemplateMetadata;
use schemars::generate::SchemaSettings;
use serde_json::Value;
use std::path::Path;
use tracing::info;

pub const SCHEMA_ID: &str = "https://magen.dev/schemas/template-metadata.schema.json";
pub const SCHEMA_TITLE: &str = "Magen Template Metadata";
pub const SCHEMA_DESCRIPTION: &str =
    "Metadata describing an application template, its extension points and how it is generated";

/// Draft-07 schema document for `TemplateMetadata`.
pub fn metadata_json_schema() -> Result<Value> {
    let schema = SchemaSettings::draft07()
        .with(|s| s.inline_subschemas = true)
        .into_generator()
        .into_root_schema_for::<TemplateMetadata>();

    let mut value = serde_json::to_value(schema)?;
    if let Value::Object(map) = &mut value {
        map.insert("$id".into(), Value::String(SCHEMA_ID.into()));
        map.insert("title".into(), Value::String(SCHEMA_TITLE.into()));
        map.insert("description".into(), Value::String(SCHEMA_DESCRIPTION.into()));
    }
    Ok(value)
}

pub fn write_json_schema(path: &Path) -> Result<()> {
    let mut text = serde_json::to_string_pretty(&metadata_json_schema()?)?;
    text.push('\n');
    atomic_write(path, text.as_bytes())?;
    info!(path = %path.display(), "wrote metadata JSON schema");
    Ok(())
}

/// Compare the schema file at `path` with the generated one. Key order and
/// formatting are ignored.
pub fn verify_json_schema(path: &Path) -> Result<()> {
    let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    if on_disk != metadata_json_schema()? {
        return Err(MagenError::SchemaOutOfSync(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn schema_has_identity_fields() {
        let schema = metadata_json_schema().unwrap();
        assert_eq!(schema["$schema"], "http://json-schema.org/draft-07/schema#");
        assert_eq!(schema["$id"], SCHEMA_ID);
        assert_eq!(schema["title"], SCHEMA_TITLE);
        let props = schema["properties"].as_object().unwrap();
        for field in ["id", "displayName", "platform", "useCase", "templateVariables"] {
            assert!(props.contains_key(field), "missing {field}");
        }
    }

    #[test]
    fn written_schema_verifies() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        write_json_schema(&path).unwrap();
        verify_json_schema(&path).unwrap();
    }

    #[test]
    fn reordered_keys_still_verify() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        let Value::Object(map) = metadata_json_schema().unwrap() else {
            panic!("schema is not an object");
        };
        let reversed: serde_json::Map<String, Value> = map.into_iter().rev().collect();
        std::fs::write(&path, serde_json::to_string(&reversed).unwrap()).unwrap();
        verify_json_schema(&path).unwrap();
    }

    #[test]
    fn drift_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        let mut schema = metadata_json_schema().unwrap();
        schema["properties"]
            .as_object_mut()
            .unwrap()
            .remove("tags");
        std::fs::write(&path, serde_json::to_string(&schema).unwrap()).unwrap();
        assert!(matches!(
            verify_json_schema(&path).unwrap_err(),
            MagenError::SchemaOutOfSync(_)
        ));
    }
}
