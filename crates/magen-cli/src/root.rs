use anyhow::Context;
use magen_core::config::{resolve_template_roots, MagenConfig};
use magen_core::paths::MAGEN_DIR;
use magen_core::registry::TemplateRegistry;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `MAGEN_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `.magen/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, MAGEN_DIR)
        .or_else(|| find_upward(&cwd, ".git"))
        .unwrap_or(cwd)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

/// Everything a command needs: the project root, its config and the
/// `--templates` override.
pub struct Project {
    pub root: PathBuf,
    pub config: MagenConfig,
    templates: Option<PathBuf>,
}

impl Project {
    pub fn load(root: PathBuf, templates: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = MagenConfig::load(&root)
            .with_context(|| format!("failed to load config under {}", root.display()))?;
        Ok(Self {
            root,
            config,
            templates,
        })
    }

    pub fn registry(&self) -> TemplateRegistry {
        TemplateRegistry::new(resolve_template_roots(
            &self.root,
            &self.config,
            self.templates.as_deref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn finds_magen_dir_above_start() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".magen")).unwrap();
        let deep = dir.path().join("ios/App/Sources");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(find_upward(&deep, MAGEN_DIR).unwrap(), dir.path());
    }

    #[test]
    fn templates_flag_feeds_registry() {
        let dir = TempDir::new().unwrap();
        let templates = dir.path().join("tpl");
        std::fs::create_dir_all(&templates).unwrap();
        let project = Project::load(dir.path().to_path_buf(), Some(templates.clone())).unwrap();
        assert!(project
            .registry()
            .roots()
            .iter()
            .any(|r| r.path == templates));
    }
}
