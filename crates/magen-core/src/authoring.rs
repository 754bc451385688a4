//! Scaffolding for template authors: new templates, new versions of existing
//! ones, and a look at a layered template's stored patch.
//!
//! New directories are assembled in a hidden staging directory next to their
//! destination and renamed into place at the end, so a failure part way
//! through never leaves a half-written template behind for discovery to trip
//! over.

use crate::error::{MagenError, Result};
use crate::io::{atomic_write, copy_tree, ensure_dir, has_entries};
use crate::layering::{materialize_template, materialize_to_work};
use crate::patch::PatchEngine;
use crate::paths::{self, README_FILE, VARIABLES_JSON};
use crate::registry::{read_template_json, TemplateEntry, TemplateRegistry};
use crate::types::{Platform, TemplateRef, TemplateVariable, VariableType};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub name: String,
    pub platform: Platform,
    pub version: String,
    /// Parent template (`name[@version]`) for a layered template.
    pub based_on: Option<String>,
    /// The template lands in `<templates_dir>/<name>/<version>/`.
    pub templates_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReport {
    pub template: String,
    pub template_directory: PathBuf,
    /// Parent id (`name@version`) for layered templates.
    pub based_on: Option<String>,
    pub variables: usize,
}

/// Scaffold a new template.
///
/// A base template gets an empty `template/` directory and a starter
/// `variables.json`. A layered template gets `extends` pointing at the exact
/// parent version, an empty patch file, and a `work/` directory holding the
/// materialized parent plus its variables, ready for editing.
pub fn create_template(
    registry: &TemplateRegistry,
    engine: &dyn PatchEngine,
    options: &CreateOptions,
) -> Result<CreateReport> {
    check_name(&options.name)?;
    check_version(&options.version)?;

    let target = options
        .templates_dir
        .join(&options.name)
        .join(&options.version);
    if has_entries(&target)? {
        return Err(MagenError::TemplateExists(target));
    }

    let parent = match &options.based_on {
        Some(raw) => {
            let reference = TemplateRef::parse(raw);
            let entry = registry
                .find(&reference)
                .ok_or_else(|| MagenError::ParentNotFound(reference.to_string()))?;
            Some(entry)
        }
        None => None,
    };

    let name = &options.name;
    let description = match parent {
        Some(p) => format!("{name} template based on {}", p.descriptor.name),
        None => format!("{name} template"),
    };
    let mut descriptor = json!({
        "name": name,
        "platform": options.platform.as_str(),
        "version": options.version,
        "description": description,
        "tags": [],
    });

    let variables = build_in_stage(&target, |stage| {
        let variables = match parent {
            Some(parent) => {
                descriptor["extends"] = json!({
                    "template": parent.descriptor.name,
                    "version": parent.version,
                });
                let work = paths::work_dir(stage);
                ensure_dir(&work)?;
                materialize_template(registry, engine, &parent.descriptor, &parent.path, &work)?;
                write_json(
                    &work.join(VARIABLES_JSON),
                    &json!({ "variables": parent.descriptor.variables }),
                )?;
                atomic_write(&stage.join(paths::DEFAULT_PATCH_FILE), b"")?;
                parent.descriptor.variables.clone()
            }
            None => {
                ensure_dir(&paths::template_files_dir(stage))?;
                let variables = vec![starter_variable()];
                write_json(
                    &stage.join(VARIABLES_JSON),
                    &json!({ "variables": variables }),
                )?;
                variables
            }
        };
        write_json(&paths::descriptor_path(stage), &descriptor)?;
        let readme = readme(name, &description, &variables, parent);
        atomic_write(&stage.join(README_FILE), readme.as_bytes())?;
        Ok(variables)
    })?;

    let id = format!("{name}@{}", options.version);
    info!(template = %id, path = %target.display(), "created template");
    Ok(CreateReport {
        template: id,
        template_directory: target,
        based_on: parent.map(TemplateEntry::id),
        variables: variables.len(),
    })
}

fn starter_variable() -> TemplateVariable {
    let mut var = TemplateVariable::new("appName", VariableType::String, true);
    var.description = Some("The name of the application".to_string());
    var.default = Some("MyApp".into());
    var
}

fn readme(
    name: &str,
    description: &str,
    variables: &[TemplateVariable],
    parent: Option<&TemplateEntry>,
) -> String {
    let mut out = format!("# {name}\n\n{description}\n\n## Variables\n\n");
    for v in variables {
        let required = if v.required { "(required)" } else { "(optional)" };
        let default = v
            .default
            .as_ref()
            .map(|d| format!(" - default: `{d}`"))
            .unwrap_or_default();
        out.push_str(&format!(
            "- **{}** (`{}`) {required}: {}{default}\n",
            v.name,
            v.var_type.as_str(),
            v.description.as_deref().unwrap_or("")
        ));
    }
    out.push_str(&format!(
        "\n## Usage\n\n```bash\nmagen generate {name} --out ~/MyApp --var appName=MyApp\n```\n\n## Development\n\n"
    ));
    match parent {
        Some(p) => out.push_str(&format!(
            "This template is based on `{}`. To modify:\n\n\
             1. Edit files in `work/` (the parent's files, placeholders intact)\n\
             2. Generate the layer patch: `magen template layer {name}`\n\
             3. Test: `magen template test {name}`\n\n\
             Only `template.json`, `{}` and `README.md` belong in version control.\n\
             Keep `work/` out of it.\n",
            p.descriptor.name,
            paths::DEFAULT_PATCH_FILE,
        )),
        None => out.push_str(&format!(
            "1. Add template files under `template/`\n\
             2. Use Handlebars placeholders such as `{{{{appName}}}}`\n\
             3. Test: `magen template test {name}`\n"
        )),
    }
    out
}

// ---------------------------------------------------------------------------
// version
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct VersionOptions {
    pub name: String,
    pub new_version: String,
    /// Copy from this version instead of the highest one.
    pub source_version: Option<String>,
    /// Base templates directory for `<name>/<new_version>/`. Defaults to the
    /// directory holding the source's own version directories.
    pub templates_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionReport {
    pub template: String,
    pub source: String,
    pub template_directory: PathBuf,
    pub layered: bool,
}

/// Copy an existing template into a new semver directory with its
/// `template.json` version bumped.
///
/// A base template brings its `template/` files along. A layered one brings
/// its patch file, and its `work/` directory is rebuilt from the parent with
/// that patch applied so editing can resume straight away.
pub fn version_template(
    registry: &TemplateRegistry,
    engine: &dyn PatchEngine,
    options: &VersionOptions,
) -> Result<VersionReport> {
    check_version(&options.new_version)?;
    let reference = TemplateRef::new(&options.name, options.source_version.as_deref());
    let source = registry
        .find(&reference)
        .ok_or_else(|| MagenError::TemplateNotFound(reference.to_string()))?;

    let versions_dir = match &options.templates_dir {
        Some(dir) => dir.join(&source.descriptor.name),
        None => versioned_parent(source)?,
    };
    let target = versions_dir.join(&options.new_version);
    if target.exists() {
        return Err(MagenError::TemplateExists(target));
    }

    let layered = source.descriptor.is_layered();
    build_in_stage(&target, |stage| {
        let mut raw: Value = serde_json::from_str(&std::fs::read_to_string(
            paths::descriptor_path(&source.path),
        )?)?;
        raw["version"] = Value::String(options.new_version.clone());
        write_json(&paths::descriptor_path(stage), &raw)?;

        for file in [README_FILE, VARIABLES_JSON] {
            copy_if_present(&source.path.join(file), &stage.join(file))?;
        }
        if layered {
            let patch = source.descriptor.patch_file();
            copy_if_present(&source.path.join(patch), &stage.join(patch))?;
            materialize_to_work(registry, engine, stage, false)?;
        } else {
            copy_tree(
                &paths::template_files_dir(&source.path),
                &paths::template_files_dir(stage),
            )?;
        }
        Ok(())
    })?;

    let id = format!("{}@{}", source.descriptor.name, options.new_version);
    info!(template = %id, source = %source.id(), path = %target.display(), "created template version");
    Ok(VersionReport {
        template: id,
        source: source.id(),
        template_directory: target,
        layered,
    })
}

/// `<root>/<name>` for a template stored at `<root>/<name>/<version>`.
fn versioned_parent(entry: &TemplateEntry) -> Result<PathBuf> {
    let in_version_dir = entry
        .path
        .file_name()
        .is_some_and(|n| n.to_string_lossy() == entry.version);
    match entry.path.parent() {
        Some(parent) if in_version_dir => Ok(parent.to_path_buf()),
        _ => Err(MagenError::UnversionedTemplate(entry.descriptor.name.clone())),
    }
}

fn copy_if_present(from: &Path, to: &Path) -> Result<()> {
    match std::fs::read(from) {
        Ok(bytes) => atomic_write(to, &bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerPatch {
    pub template: String,
    pub based_on: String,
    pub patch_path: PathBuf,
    pub content: String,
}

impl LayerPatch {
    /// True until `template layer` has recorded a change.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// The stored patch of the layered template in `template_dir`.
pub fn layer_patch(template_dir: &Path) -> Result<LayerPatch> {
    let descriptor = read_template_json(template_dir)?;
    let Some(parent) = descriptor.parent() else {
        return Err(MagenError::NotLayered(descriptor.name));
    };
    let patch_path = template_dir.join(descriptor.patch_file());
    let content = match std::fs::read_to_string(&patch_path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MagenError::MissingPatch(patch_path))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(LayerPatch {
        template: descriptor.id(),
        based_on: parent.to_string(),
        patch_path,
        content,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_name(name: &str) -> Result<()> {
    let single_segment = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '@'])
        && !name.starts_with('.');
    if single_segment {
        Ok(())
    } else {
        Err(MagenError::InvalidTemplateName(name.to_string()))
    }
}

fn check_version(version: &str) -> Result<()> {
    if paths::is_semver(version) {
        Ok(())
    } else {
        Err(MagenError::InvalidVersion(version.to_string()))
    }
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let mut data = serde_json::to_string_pretty(value)?;
    data.push('\n');
    atomic_write(path, data.as_bytes())
}

/// Run `build` against a fresh hidden directory beside `target`, then move
/// the result to `target`. An existing empty `target` is replaced.
fn build_in_stage<T>(target: &Path, build: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;
    let stage = tempfile::Builder::new()
        .prefix(".magen-staging-")
        .tempdir_in(parent)?;
    let out = build(stage.path())?;
    if target.is_dir() {
        std::fs::remove_dir(target)?;
    }
    std::fs::rename(stage.path(), target)?;
    Ok(out)
}
