//! Layered templates: a child template stored as a patch against its parent.
//!
//! Authoring flow:
//! 1. [`materialize_to_work`] writes the parent (plus any existing patch) into
//!    the child's `work/` directory, placeholders intact.
//! 2. The author edits `work/`.
//! 3. [`create_layer`] diffs the materialized parent against `work/` and stores
//!    the result as the child's patch file.
//!
//! [`materialize_template`] is the inverse of step 3: copy the root template's
//! files, then apply each layer's patch from the root down to the child.

use crate::error::{MagenError, Result};
use crate::io::{atomic_write, copy_tree, copy_tree_filtered, ensure_dir};
use crate::patch::PatchEngine;
use crate::paths::{self, VARIABLES_JSON};
use crate::registry::{load_template_dir, read_template_json, TemplateRegistry};
use crate::types::{TemplateDescriptor, TemplateRef};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerReport {
    pub patch_path: PathBuf,
    pub parent_template: String,
    pub child_template: String,
    /// False when `work/` matched the parent exactly and the patch is empty.
    pub changed: bool,
}

/// Reconstruct the still-templated file tree of `descriptor` into `target`.
pub fn materialize_template(
    registry: &TemplateRegistry,
    engine: &dyn PatchEngine,
    descriptor: &TemplateDescriptor,
    template_dir: &Path,
    target: &Path,
) -> Result<()> {
    let mut visited = Vec::new();
    materialize_chain(registry, engine, descriptor, template_dir, target, &mut visited)
}

fn materialize_chain(
    registry: &TemplateRegistry,
    engine: &dyn PatchEngine,
    descriptor: &TemplateDescriptor,
    template_dir: &Path,
    target: &Path,
    visited: &mut Vec<String>,
) -> Result<()> {
    let id = descriptor.id();
    if visited.contains(&id) {
        visited.push(id);
        return Err(MagenError::CircularDependency(visited.clone()));
    }
    visited.push(id);

    let Some(parent_ref) = descriptor.parent() else {
        let files = paths::template_files_dir(template_dir);
        if !files.is_dir() {
            return Err(MagenError::MissingTemplateFiles(files));
        }
        copy_tree(&files, target)?;
        return Ok(());
    };

    let parent = registry
        .find(&parent_ref)
        .ok_or_else(|| MagenError::ParentNotFound(parent_ref.to_string()))?;
    materialize_chain(
        registry,
        engine,
        &parent.descriptor,
        &parent.path,
        target,
        visited,
    )?;

    let patch = template_dir.join(descriptor.patch_file());
    check_patch(&patch)?;
    engine.apply_patch(target, &patch)?;
    info!(template = %descriptor.name, patch = %patch.display(), "applied layer");
    Ok(())
}

fn check_patch(patch: &Path) -> Result<()> {
    let content = match std::fs::read(patch) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MagenError::MissingPatch(patch.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if content.iter().all(u8::is_ascii_whitespace) {
        return Err(MagenError::EmptyPatch(patch.to_path_buf()));
    }
    Ok(())
}

/// True once `create_layer` has written a non-blank patch. A freshly
/// scaffolded template carries an empty one.
fn has_recorded_layer(patch: &Path) -> Result<bool> {
    match std::fs::read(patch) {
        Ok(content) => Ok(!content.iter().all(u8::is_ascii_whitespace)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Diff the materialized parent against `<template_dir>/work` and store the
/// result as the child's patch file.
///
/// `parent_override` takes precedence over the descriptor's own parent.
pub fn create_layer(
    registry: &TemplateRegistry,
    engine: &dyn PatchEngine,
    template_dir: &Path,
    parent_override: Option<&str>,
) -> Result<LayerReport> {
    engine.ensure_available()?;

    let child = read_template_json(template_dir)?;
    let parent_ref = parent_override
        .map(TemplateRef::parse)
        .or_else(|| child.parent())
        .ok_or_else(|| MagenError::NoParent(child.name.clone()))?;
    let parent = registry
        .find(&parent_ref)
        .ok_or_else(|| MagenError::ParentNotFound(parent_ref.to_string()))?;

    let work = paths::work_dir(template_dir);
    if !work.is_dir() {
        return Err(MagenError::MissingWorkDir(work));
    }

    let stage = TempDir::new()?;
    let before = stage.path().join("before");
    let after = stage.path().join("after");
    ensure_dir(&before)?;
    materialize_template(registry, engine, &parent.descriptor, &parent.path, &before)?;
    // work/variables.json is authoring metadata, not template content.
    copy_tree_filtered(&work, &after, |rel| rel == Path::new(VARIABLES_JSON))?;

    let outcome = engine.compute_diff(&before, &after)?;
    let patch_path = template_dir.join(child.patch_file());
    atomic_write(&patch_path, outcome.patch_text().as_bytes())?;

    if outcome.is_changed() {
        info!(
            template = %child.name,
            parent = %parent.id(),
            patch = %patch_path.display(),
            "created layer patch"
        );
    } else {
        warn!(
            template = %child.name,
            "work/ is identical to {}; wrote an empty patch",
            parent.id()
        );
    }

    Ok(LayerReport {
        patch_path,
        parent_template: parent.id(),
        child_template: child.name,
        changed: outcome.is_changed(),
    })
}

/// Write the materialized, still-templated tree of a layered template into its
/// `work/` directory for editing.
///
/// Without an existing patch, `work/` is seeded from the parent alone. The
/// template's variables file is carried into `work/variables.json`.
pub fn materialize_to_work(
    registry: &TemplateRegistry,
    engine: &dyn PatchEngine,
    template_dir: &Path,
    force: bool,
) -> Result<PathBuf> {
    let descriptor = load_template_dir(template_dir)?;
    let Some(parent_ref) = descriptor.parent() else {
        return Err(MagenError::NotLayered(descriptor.name));
    };

    let work = paths::work_dir(template_dir);
    if work.exists() && !force {
        return Err(MagenError::WorkDirExists(work));
    }

    let stage = TempDir::new()?;
    let tree = stage.path().join("tree");
    ensure_dir(&tree)?;
    let patch = template_dir.join(descriptor.patch_file());
    if has_recorded_layer(&patch)? {
        materialize_template(registry, engine, &descriptor, template_dir, &tree)?;
    } else {
        info!(template = %descriptor.name, "no layer patch yet; seeding work/ from {parent_ref}");
        let parent = registry
            .find(&parent_ref)
            .ok_or_else(|| MagenError::ParentNotFound(parent_ref.to_string()))?;
        materialize_template(registry, engine, &parent.descriptor, &parent.path, &tree)?;
    }

    let work_vars = work.join(VARIABLES_JSON);
    let preserved = match std::fs::read(&work_vars) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    if work.exists() {
        std::fs::remove_dir_all(&work)?;
    }
    copy_tree(&tree, &work)?;

    let root_vars = template_dir.join(VARIABLES_JSON);
    match preserved {
        Some(bytes) => atomic_write(&work_vars, &bytes)?,
        None if root_vars.is_file() => {
            std::fs::copy(&root_vars, &work_vars)?;
        }
        None => {}
    }

    info!(template = %descriptor.name, work = %work.display(), "materialized to work/");
    Ok(work)
}
