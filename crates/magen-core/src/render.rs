use crate::error::{MagenError, Result};
use crate::io::ensure_dir;
use crate::types::Variables;
use handlebars::Handlebars;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Expands `{{name}}` placeholders in file contents and in path components.
pub struct Renderer {
    handlebars: Handlebars<'static>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Output is source code, not HTML.
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    pub fn render_str(&self, template: &str, vars: &Variables) -> Result<String> {
        self.handlebars
            .render_template(template, vars)
            .map_err(|e| MagenError::Render(e.to_string()))
    }

    /// Render each component of `rel` separately. A rendered component must
    /// stay a single normal path segment, so variable values cannot climb out
    /// of the destination or name an absolute path.
    pub fn render_path(&self, rel: &Path, vars: &Variables) -> Result<PathBuf> {
        let mut out = PathBuf::new();
        for component in rel.components() {
            let name = component.as_os_str().to_string_lossy();
            let rendered = self.render_str(&name, vars)?;
            check_segment(rel, &rendered)?;
            out.push(rendered);
        }
        Ok(out)
    }

    /// Render every file under `src` into `dst`.
    ///
    /// Directories are created before their contents. An existing destination
    /// file is an error unless `overwrite` is set. Files that are not UTF-8 are
    /// copied byte for byte.
    pub fn render_tree(
        &self,
        src: &Path,
        dst: &Path,
        vars: &Variables,
        overwrite: bool,
    ) -> Result<Vec<PathBuf>> {
        ensure_dir(dst)?;
        let mut written = Vec::new();

        for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let Ok(rel) = entry.path().strip_prefix(src) else {
                continue;
            };
            let rendered_rel = self.render_path(rel, vars)?;
            let target = dst.join(&rendered_rel);

            if entry.file_type().is_dir() {
                ensure_dir(&target)?;
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            if target.exists() && !overwrite {
                return Err(MagenError::FileExists(target));
            }
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }

            let bytes = std::fs::read(entry.path())?;
            match String::from_utf8(bytes) {
                Ok(text) => {
                    let rendered = self.render_str(&text, vars).map_err(|e| {
                        MagenError::Render(format!("{}: {e}", rel.display()))
                    })?;
                    std::fs::write(&target, rendered)?;
                }
                Err(raw) => {
                    debug!(path = %rel.display(), "copying non-UTF-8 file verbatim");
                    std::fs::write(&target, raw.into_bytes())?;
                }
            }
            written.push(rendered_rel);
        }

        Ok(written)
    }
}

fn check_segment(rel: &Path, rendered: &str) -> Result<()> {
    let single_normal = matches!(
        Path::new(rendered).components().collect::<Vec<_>>().as_slice(),
        [Component::Normal(_)]
    );
    if rendered.is_empty() || rendered.contains(['/', '\\']) || !single_normal {
        return Err(MagenError::Render(format!(
            "{}: path segment renders to '{rendered}'",
            rel.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VariableValue;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, VariableValue)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn renders_without_html_escaping() {
        let r = Renderer::new();
        let v = vars(&[("name", "<App & Co>".into())]);
        assert_eq!(r.render_str("let n = \"{{name}}\"", &v).unwrap(), "let n = \"<App & Co>\"");
    }

    #[test]
    fn renders_numbers_and_booleans() {
        let r = Renderer::new();
        let v = vars(&[("port", 8080.into()), ("debug", true.into())]);
        assert_eq!(r.render_str("{{port}}/{{debug}}", &v).unwrap(), "8080/true");
    }

    #[test]
    fn renders_directory_and_file_names() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::create_dir_all(src.path().join("{{appName}}/Sources")).unwrap();
        std::fs::write(
            src.path().join("{{appName}}/Sources/{{appName}}App.swift"),
            "struct {{appName}}App {}",
        )
        .unwrap();

        let v = vars(&[("appName", "Demo".into())]);
        let written = Renderer::new()
            .render_tree(src.path(), dst.path(), &v, false)
            .unwrap();

        assert_eq!(written, vec![PathBuf::from("Demo/Sources/DemoApp.swift")]);
        assert_eq!(
            std::fs::read_to_string(dst.path().join("Demo/Sources/DemoApp.swift")).unwrap(),
            "struct DemoApp {}"
        );
    }

    #[test]
    fn existing_file_requires_overwrite() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        std::fs::write(src.path().join("App.swift"), "{{appName}}").unwrap();
        std::fs::write(dst.path().join("App.swift"), "original").unwrap();
        let v = vars(&[("appName", "TestApp".into())]);
        let r = Renderer::new();

        let err = r.render_tree(src.path(), dst.path(), &v, false).unwrap_err();
        assert!(matches!(err, MagenError::FileExists(_)));
        assert_eq!(
            std::fs::read_to_string(dst.path().join("App.swift")).unwrap(),
            "original"
        );

        r.render_tree(src.path(), dst.path(), &v, true).unwrap();
        assert_eq!(
            std::fs::read_to_string(dst.path().join("App.swift")).unwrap(),
            "TestApp"
        );
    }

    #[test]
    fn binary_files_copied_verbatim() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let png = [0x89u8, b'P', b'N', b'G', 0xff, 0xfe, b'{', b'{'];
        std::fs::write(src.path().join("icon.png"), png).unwrap();
        Renderer::new()
            .render_tree(src.path(), dst.path(), &Variables::new(), false)
            .unwrap();
        assert_eq!(std::fs::read(dst.path().join("icon.png")).unwrap(), png);
    }

    #[test]
    fn rejects_segments_that_leave_the_destination() {
        let base = TempDir::new().unwrap();
        let src = base.path().join("src");
        let dst = base.path().join("out");
        std::fs::create_dir_all(src.join("{{appName}}")).unwrap();
        std::fs::write(src.join("{{appName}}/App.swift"), "app").unwrap();
        let r = Renderer::new();

        let absolute = base.path().join("abs").to_string_lossy().into_owned();
        for value in ["../escaped", "..", ".", "", absolute.as_str(), "a\\b"] {
            let v = vars(&[("appName", value.into())]);
            let err = r.render_tree(&src, &dst, &v, false).unwrap_err();
            assert!(matches!(err, MagenError::Render(_)), "{value}: {err}");
        }
        assert!(!base.path().join("escaped").exists());
        assert!(!base.path().join("abs").exists());
        assert!(!dst.join("App.swift").exists());
    }

    #[test]
    fn unknown_placeholders_render_empty() {
        let r = Renderer::new();
        assert_eq!(r.render_str("a{{missing}}b", &Variables::new()).unwrap(), "ab");
    }
}
