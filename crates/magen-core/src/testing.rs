//! Throwaway test instances under `<templateDir>/test/` for eyeballing a
//! template's output while authoring it.

use crate::error::Result;
use crate::generator::{generate_app, GenerateOptions};
use crate::io::{has_entries, reset_dir};
use crate::patch::PatchEngine;
use crate::paths;
use crate::registry::{load_template_dir, TemplateRegistry};
use crate::types::Variables;
use crate::variables::placeholder_variables;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct TestTemplateOptions {
    pub template: String,
    pub template_dir: PathBuf,
    pub variables: Variables,
    /// Delete and rebuild a non-empty test directory instead of reusing it.
    pub regenerate: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestInstance {
    pub test_directory: PathBuf,
    pub template_directory: PathBuf,
    pub variables: Variables,
    /// False when an existing instance was reused untouched.
    pub created: bool,
}

/// Generate (or reuse) the test instance for a template.
///
/// Variables are the declared defaults, then placeholders for required
/// variables without a default, then the caller's values.
pub fn test_template(
    registry: &TemplateRegistry,
    engine: &dyn PatchEngine,
    options: &TestTemplateOptions,
) -> Result<TestInstance> {
    let template_dir = options.template_dir.clone();
    let local = paths::descriptor_path(&template_dir).is_file();
    let descriptor = if local {
        load_template_dir(&template_dir)?
    } else {
        registry.get_template(&options.template)?.descriptor.clone()
    };

    let mut variables = placeholder_variables(&descriptor.variables);
    for (k, v) in &options.variables {
        variables.insert(k.clone(), v.clone());
    }

    let test_dir = paths::test_dir(&template_dir);
    if has_entries(&test_dir)? && !options.regenerate {
        info!(path = %test_dir.display(), "reusing existing test instance");
        return Ok(TestInstance {
            test_directory: test_dir,
            template_directory: template_dir,
            variables,
            created: false,
        });
    }
    reset_dir(&test_dir)?;

    let source = local.then(|| template_dir.clone());
    generate_app(
        registry,
        engine,
        &GenerateOptions {
            template: options.template.clone(),
            output_dir: test_dir.clone(),
            variables: variables.clone(),
            overwrite: options.regenerate,
            template_dir: source,
        },
    )?;

    Ok(TestInstance {
        test_directory: test_dir,
        template_directory: template_dir,
        variables,
        created: true,
    })
}

/// True if `<template_dir>/test` exists and is non-empty.
pub fn has_test_instance(template_dir: &Path) -> Result<bool> {
    has_entries(&paths::test_dir(template_dir))
}
