//! Generate an app from a metadata template in the catalog.
//!
//! Files come from `<template>/template/`. Each file takes the first
//! `generation.fileTransforms` entry whose pattern matches its relative path;
//! unmatched files are copied. `generation.fileOperations` then run against
//! the rendered tree. Everything is built in a staging directory so a dry run
//! reports exactly what a real run would write.

use crate::error::{MagenError, Result};
use crate::io::{copy_tree, ensure_dir, has_entries};
use crate::metadata::{
    FileAction, FileOperation, FileProcessor, FileTransform, MetadataCatalog, MetadataVariable,
    MetadataVariableType, TemplateMetadata,
};
use crate::paths;
use crate::render::Renderer;
use crate::schema::Validation;
use crate::types::{VariableType, VariableValue, Variables};
use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const HBS_EXTENSION: &str = "hbs";

#[derive(Debug, Clone, Default)]
pub struct ScaffoldOptions {
    /// Metadata `id` in the catalog.
    pub template_id: String,
    pub output_dir: PathBuf,
    pub variables: Variables,
    pub overwrite: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldReport {
    pub template: String,
    pub output_directory: PathBuf,
    pub dry_run: bool,
    pub variables_used: Variables,
    pub files: Vec<PathBuf>,
    pub operations: Vec<String>,
    pub warnings: Vec<String>,
}

/// Render the resolved metadata template `options.template_id`.
pub fn scaffold(catalog: &MetadataCatalog, options: &ScaffoldOptions) -> Result<ScaffoldReport> {
    let metadata = catalog.resolve(&options.template_id)?;
    let files_dir = paths::template_files_dir(catalog.path(&options.template_id)?);
    if !files_dir.is_dir() {
        return Err(MagenError::MissingTemplateFiles(files_dir));
    }

    let vars = bind_variables(&metadata.template_variables, &options.variables)
        .map_err(MagenError::VariableValidation)?;
    let transforms = compile_transforms(&metadata.generation.file_transforms)?;

    let out = &options.output_dir;
    if !options.overwrite && has_entries(out)? {
        return Err(MagenError::OutputNotEmpty(out.clone()));
    }

    let mut warnings = hook_warnings(&metadata);
    let renderer = Renderer::new();
    let stage = TempDir::new()?;
    render_files(&renderer, &files_dir, stage.path(), &vars, &transforms, &mut warnings)?;

    let operations = metadata
        .generation
        .file_operations
        .as_deref()
        .unwrap_or_default();
    let applied = apply_operations(&renderer, stage.path(), operations, &vars, &mut warnings)?;
    let files = list_files(stage.path())?;

    if options.dry_run {
        debug!(template = %metadata.id, files = files.len(), "dry run, nothing written");
    } else {
        ensure_dir(out)?;
        copy_tree(stage.path(), out)?;
        info!(
            template = %metadata.id,
            output = %out.display(),
            files = files.len(),
            "scaffolded app"
        );
    }

    Ok(ScaffoldReport {
        template: metadata.id,
        output_directory: out.clone(),
        dry_run: options.dry_run,
        variables_used: vars,
        files,
        operations: applied,
        warnings,
    })
}

/// Defaults first, then caller values, then every declared constraint.
///
/// Array and object defaults have no scalar form and are left unbound.
fn bind_variables(declared: &[MetadataVariable], provided: &Variables) -> Validation<Variables> {
    let mut vars = Variables::new();
    for var in declared {
        if let Some(value) = var.default.as_ref().and_then(VariableValue::from_json) {
            vars.insert(var.name.clone(), value);
        }
    }
    for (k, v) in provided {
        vars.insert(k.clone(), v.clone());
    }

    let mut errors = Vec::new();
    for var in declared {
        let Some(value) = vars.get(&var.name) else {
            if var.required {
                errors.push(format!("Required variable missing: {}", var.name));
            }
            continue;
        };
        if let Some(expected) = scalar_type(var.var_type) {
            if value.var_type() != expected {
                errors.push(format!(
                    "Variable {} expected type {}, got {}",
                    var.name,
                    expected,
                    value.var_type()
                ));
                continue;
            }
        } else {
            errors.push(format!(
                "Variable {} expects a structured value and cannot be set from a scalar",
                var.name
            ));
            continue;
        }
        if let (Some(pattern), Some(text)) = (&var.validation, value.as_str()) {
            match Regex::new(pattern) {
                Ok(re) if re.is_match(text) => {}
                Ok(_) => errors.push(format!(
                    "Variable {} does not match required format: {pattern}",
                    var.name
                )),
                Err(e) => errors.push(format!("Variable {} has an invalid validation pattern: {e}", var.name)),
            }
        }
    }

    if errors.is_empty() {
        Ok(vars)
    } else {
        Err(errors)
    }
}

fn scalar_type(t: MetadataVariableType) -> Option<VariableType> {
    match t {
        MetadataVariableType::String => Some(VariableType::String),
        MetadataVariableType::Number => Some(VariableType::Number),
        MetadataVariableType::Boolean => Some(VariableType::Boolean),
        MetadataVariableType::Array | MetadataVariableType::Object => None,
    }
}

fn compile_transforms(transforms: &[FileTransform]) -> Result<Vec<(Pattern, &FileTransform)>> {
    transforms
        .iter()
        .map(|t| {
            Pattern::new(&t.pattern)
                .map(|p| (p, t))
                .map_err(|e| MagenError::InvalidPattern {
                    pattern: t.pattern.clone(),
                    reason: e.msg.to_string(),
                })
        })
        .collect()
}

fn hook_warnings(metadata: &TemplateMetadata) -> Vec<String> {
    let generation = &metadata.generation;
    [("Pre-hook", &generation.pre_hook), ("Post-hook", &generation.post_hook)]
        .into_iter()
        .filter_map(|(label, hook)| {
            hook.as_ref()
                .map(|h| format!("{label} {h} was not run; hooks are not executed"))
        })
        .collect()
}

fn matching_transform<'a>(
    rel: &Path,
    transforms: &'a [(Pattern, &'a FileTransform)],
) -> Option<&'a FileTransform> {
    let rel = rel.to_string_lossy().replace('\\', "/");
    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::new()
    };
    transforms
        .iter()
        .find(|(pattern, _)| pattern.matches_with(&rel, options))
        .map(|(_, t)| *t)
}

/// Processed files drop a trailing `.hbs`, or swap their last extension for
/// the transform's `outputExtension` when it names one.
fn output_name(path: &Path, transform: &FileTransform) -> PathBuf {
    match &transform.output_extension {
        Some(ext) => path.with_extension(ext.trim_start_matches('.')),
        None if path.extension().is_some_and(|e| e == HBS_EXTENSION) => path.with_extension(""),
        None => path.to_path_buf(),
    }
}

fn render_files(
    renderer: &Renderer,
    src: &Path,
    dst: &Path,
    vars: &Variables,
    transforms: &[(Pattern, &FileTransform)],
    warnings: &mut Vec<String>,
) -> Result<()> {
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let rendered_rel = renderer.render_path(rel, vars)?;

        let (target_rel, contents) = match matching_transform(rel, transforms) {
            Some(t) if t.processor == FileProcessor::Handlebars => {
                let text = std::fs::read_to_string(entry.path())
                    .map_err(|e| MagenError::Render(format!("{}: {e}", rel.display())))?;
                let rendered = renderer
                    .render_str(&text, vars)
                    .map_err(|e| MagenError::Render(format!("{}: {e}", rel.display())))?;
                (output_name(&rendered_rel, t), rendered.into_bytes())
            }
            Some(t) => {
                if t.processor == FileProcessor::Custom {
                    warnings.push(format!(
                        "{}: custom processor is not supported, copied as-is",
                        rel.display()
                    ));
                }
                (output_name(&rendered_rel, t), std::fs::read(entry.path())?)
            }
            None => (rendered_rel, std::fs::read(entry.path())?),
        };

        let target = dst.join(&target_rel);
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        std::fs::write(&target, contents)?;
    }
    Ok(())
}

/// Run each operation inside `root`. Both ends are rendered and must stay
/// under `root`. An operation whose source is absent is skipped with a
/// warning.
fn apply_operations(
    renderer: &Renderer,
    root: &Path,
    operations: &[FileOperation],
    vars: &Variables,
    warnings: &mut Vec<String>,
) -> Result<Vec<String>> {
    let mut applied = Vec::new();
    for op in operations {
        let from_rel = renderer.render_path(Path::new(&op.from), vars)?;
        let from = root.join(&from_rel);
        if !from.exists() {
            warnings.push(format!("{:?} skipped: {} does not exist", op.action, from_rel.display()));
            continue;
        }

        match op.action {
            FileAction::Delete => {
                if from.is_dir() {
                    std::fs::remove_dir_all(&from)?;
                } else {
                    std::fs::remove_file(&from)?;
                }
                applied.push(format!("delete {}", from_rel.display()));
            }
            FileAction::Rename | FileAction::Move => {
                let Some(to) = &op.to else {
                    warnings.push(format!("{:?} of {} has no target", op.action, from_rel.display()));
                    continue;
                };
                let to_rel = renderer.render_path(Path::new(to), vars)?;
                let dest = root.join(&to_rel);
                if let Some(parent) = dest.parent() {
                    ensure_dir(parent)?;
                }
                std::fs::rename(&from, &dest)?;
                let verb = if op.action == FileAction::Rename { "rename" } else { "move" };
                applied.push(format!("{verb} {} -> {}", from_rel.display(), to_rel.display()));
            }
        }
    }
    if !applied.is_empty() {
        debug!(count = applied.len(), "applied file operations");
    }
    Ok(applied)
}

fn list_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            if let Ok(rel) = entry.path().strip_prefix(root) {
                files.push(rel.to_path_buf());
            }
        } else if entry.file_type().is_symlink() {
            warn!(path = %entry.path().display(), "symlink in scaffold output ignored");
        }
    }
    Ok(files)
}
