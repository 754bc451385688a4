use crate::error::{MagenError, Result};
use crate::io::{ensure_dir, has_entries};
use crate::layering::materialize_template;
use crate::patch::PatchEngine;
use crate::paths;
use crate::registry::{load_template_dir, TemplateRegistry};
use crate::render::Renderer;
use crate::types::{TemplateDescriptor, Variables};
use crate::variables::{merge_variables, validate_variables};
use serde::Serialize;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// `name` or `name@version`, resolved through the registry.
    pub template: String,
    pub output_dir: PathBuf,
    pub variables: Variables,
    pub overwrite: bool,
    /// Load the template from this directory instead of the registry.
    pub template_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReport {
    pub output_directory: PathBuf,
    pub template_used: String,
    pub variables_used: Variables,
    pub files_created: usize,
    pub files: Vec<PathBuf>,
}

/// Render a template (layered or not) into `options.output_dir`.
pub fn generate_app(
    registry: &TemplateRegistry,
    engine: &dyn PatchEngine,
    options: &GenerateOptions,
) -> Result<GenerateReport> {
    let (descriptor, template_dir) = resolve(registry, options)?;

    if descriptor.is_layered() && registry.detect_cycle(&descriptor.id()) {
        let chain = match registry.inheritance_chain(&descriptor.id()) {
            Err(MagenError::CircularDependency(chain)) => chain,
            _ => vec![descriptor.id()],
        };
        return Err(MagenError::CircularDependency(chain));
    }

    let vars = merge_variables(&descriptor.variables, &options.variables);
    validate_variables(&descriptor.variables, &vars).map_err(MagenError::VariableValidation)?;

    let out = &options.output_dir;
    if !options.overwrite && has_entries(out)? {
        return Err(MagenError::OutputNotEmpty(out.clone()));
    }
    ensure_dir(out)?;

    let renderer = Renderer::new();
    let files = if descriptor.is_layered() {
        let stage = TempDir::new()?;
        materialize_template(registry, engine, &descriptor, &template_dir, stage.path())?;
        renderer.render_tree(stage.path(), out, &vars, options.overwrite)?
    } else {
        let files_dir = paths::template_files_dir(&template_dir);
        if !files_dir.is_dir() {
            return Err(MagenError::MissingTemplateFiles(files_dir));
        }
        renderer.render_tree(&files_dir, out, &vars, options.overwrite)?
    };

    info!(
        template = %descriptor.id(),
        output = %out.display(),
        files = files.len(),
        "generated app"
    );
    Ok(GenerateReport {
        output_directory: out.clone(),
        template_used: descriptor.id(),
        variables_used: vars,
        files_created: files.len(),
        files,
    })
}

fn resolve(
    registry: &TemplateRegistry,
    options: &GenerateOptions,
) -> Result<(TemplateDescriptor, PathBuf)> {
    match &options.template_dir {
        Some(dir) => {
            if !paths::descriptor_path(dir).is_file() {
                return Err(MagenError::TemplateNotFound(dir.display().to_string()));
            }
            Ok((load_template_dir(dir)?, dir.clone()))
        }
        None => {
            let entry = registry.get_template(&options.template)?;
            Ok((entry.descriptor.clone(), entry.path.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::GitPatchEngine;
    use crate::registry::fixtures::{base_template, write_template};
    use crate::types::VariableValue;
    use serde_json::json;
    use std::path::Path;

    fn generate_into(
        registry: &TemplateRegistry,
        engine: &dyn PatchEngine,
        template: &str,
        output_dir: &Path,
        variables: Variables,
    ) -> Result<GenerateReport> {
        generate_app(
            registry,
            engine,
            &GenerateOptions {
                template: template.to_string(),
                output_dir: output_dir.to_path_buf(),
                variables,
                ..Default::default()
            },
        )
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn renders_defaults_deterministically() {
        let root = TempDir::new().unwrap();
        base_template(root.path(), "t", "1.0.0");
        let reg = TemplateRegistry::from_root(root.path());
        let engine = GitPatchEngine::new();

        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        generate_into(&reg, &engine, "t", first.path(), Variables::new()).unwrap();
        let report = generate_into(&reg, &engine, "t", second.path(), Variables::new()).unwrap();

        assert_eq!(read(&first.path().join("App.swift")), "TestApp");
        assert_eq!(
            std::fs::read(first.path().join("App.swift")).unwrap(),
            std::fs::read(second.path().join("App.swift")).unwrap()
        );
        assert_eq!(report.files_created, 1);
        assert_eq!(report.template_used, "t@1.0.0");
    }

    #[test]
    fn caller_values_override_defaults() {
        let root = TempDir::new().unwrap();
        base_template(root.path(), "t", "1.0.0");
        let reg = TemplateRegistry::from_root(root.path());
        let out = TempDir::new().unwrap();
        let mut vars = Variables::new();
        vars.insert("appName".into(), VariableValue::from("Field Service"));
        generate_into(&reg, &GitPatchEngine::new(), "t", out.path(), vars).unwrap();
        assert_eq!(read(&out.path().join("App.swift")), "Field Service");
    }

    #[test]
    fn validation_errors_stop_generation() {
        let root = TempDir::new().unwrap();
        write_template(
            &root.path().join("strict").join("1.0.0"),
            json!({"name": "strict", "platform": "android", "version": "1.0.0"}),
            json!([{"name": "x", "type": "string", "required": true},
                   {"name": "y", "type": "number", "required": true}]),
            &[("README.md", "{{x}} {{y}}")],
        );
        let reg = TemplateRegistry::from_root(root.path());
        let out = TempDir::new().unwrap();
        let err = generate_into(&reg, &GitPatchEngine::new(), "strict", out.path(), Variables::new())
            .unwrap_err();
        match err {
            MagenError::VariableValidation(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!has_entries(out.path()).unwrap());
    }

    #[test]
    fn overwrite_guard() {
        let root = TempDir::new().unwrap();
        base_template(root.path(), "t", "1.0.0");
        let reg = TemplateRegistry::from_root(root.path());
        let engine = GitPatchEngine::new();
        let out = TempDir::new().unwrap();
        std::fs::write(out.path().join("App.swift"), "mine").unwrap();
        std::fs::write(out.path().join("notes.txt"), "keep").unwrap();

        let mut options = GenerateOptions {
            template: "t".into(),
            output_dir: out.path().to_path_buf(),
            ..Default::default()
        };
        let err = generate_app(&reg, &engine, &options).unwrap_err();
        assert!(matches!(err, MagenError::OutputNotEmpty(_)));
        assert_eq!(read(&out.path().join("App.swift")), "mine");

        options.overwrite = true;
        generate_app(&reg, &engine, &options).unwrap();
        assert_eq!(read(&out.path().join("App.swift")), "TestApp");
        assert_eq!(read(&out.path().join("notes.txt")), "keep");
    }

    #[test]
    fn unknown_template_is_not_found() {
        let root = TempDir::new().unwrap();
        let reg = TemplateRegistry::from_root(root.path());
        let out = TempDir::new().unwrap();
        let err = generate_into(&reg, &GitPatchEngine::new(), "ghost", out.path(), Variables::new())
            .unwrap_err();
        assert!(matches!(err, MagenError::TemplateNotFound(_)));
    }

    #[test]
    fn explicit_template_dir_bypasses_registry() {
        let root = TempDir::new().unwrap();
        let dir = base_template(root.path(), "local", "0.1.0");
        let reg = TemplateRegistry::from_root(root.path().join("elsewhere"));
        let out = TempDir::new().unwrap();
        let report = generate_app(
            &reg,
            &GitPatchEngine::new(),
            &GenerateOptions {
                template: "local".into(),
                output_dir: out.path().join("app"),
                template_dir: Some(dir),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(report.files, vec![PathBuf::from("App.swift")]);
        assert_eq!(read(&out.path().join("app/App.swift")), "TestApp");
    }

    #[test]
    fn cyclic_layers_refuse_to_generate() {
        let root = TempDir::new().unwrap();
        for (name, parent) in [("a", "b"), ("b", "a")] {
            write_template(
                &root.path().join(name).join("1.0.0"),
                json!({"name": name, "platform": "ios", "version": "1.0.0", "basedOn": parent}),
                json!([]),
                &[],
            );
        }
        let reg = TemplateRegistry::from_root(root.path());
        let out = TempDir::new().unwrap();
        let err = generate_into(&reg, &GitPatchEngine::new(), "a", out.path(), Variables::new())
            .unwrap_err();
        assert!(matches!(err, MagenError::CircularDependency(_)));
    }

    #[test]
    fn layered_template_generates_rendered_output() {
        if which::which("git").is_err() {
            return;
        }
        let root = TempDir::new().unwrap();
        base_template(root.path(), "ios-base", "1.0.0");
        let child = write_template(
            &root.path().join("ios-login").join("1.0.0"),
            json!({"name": "ios-login", "platform": "ios", "version": "1.0.0",
                   "basedOn": "ios-base"}),
            json!([{"name": "appName", "type": "string", "required": true},
                   {"name": "title", "type": "string", "required": false, "default": "Welcome"}]),
            &[],
        );
        let reg = TemplateRegistry::from_root(root.path());
        let engine = GitPatchEngine::new();
        let work = crate::layering::materialize_to_work(&reg, &engine, &child, false).unwrap();
        std::fs::create_dir_all(work.join("{{appName}}")).unwrap();
        std::fs::write(work.join("{{appName}}/Login.swift"), "{{title}}, {{appName}}").unwrap();
        crate::layering::create_layer(&reg, &engine, &child, None).unwrap();

        let reg = TemplateRegistry::from_root(root.path());
        let out = TempDir::new().unwrap();
        let mut vars = Variables::new();
        vars.insert("appName".into(), VariableValue::from("Acme"));
        generate_into(&reg, &engine, "ios-login", out.path(), vars).unwrap();
        assert_eq!(read(&out.path().join("App.swift")), "Acme");
        assert_eq!(read(&out.path().join("Acme/Login.swift")), "Welcome, Acme");
    }
}
