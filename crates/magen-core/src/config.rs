use crate::error::Result;
use crate::paths;
use crate::registry::{RootKind, TemplateRoot};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const TEMPLATES_ENV: &str = "MAGEN_TEMPLATES_PATH";

// ---------------------------------------------------------------------------
// MagenConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagenConfig {
    /// Extra template roots. Relative paths resolve against the project root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_roots: Vec<PathBuf>,
    #[serde(default = "default_sdd_directory")]
    pub sdd_directory: String,
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
}

fn default_sdd_directory() -> String {
    paths::DEFAULT_SDD_DIR.to_string()
}

fn default_schema_path() -> PathBuf {
    PathBuf::from(paths::DEFAULT_SCHEMA_FILE)
}

impl Default for MagenConfig {
    fn default() -> Self {
        Self {
            template_roots: Vec::new(),
            sdd_directory: default_sdd_directory(),
            schema_path: default_schema_path(),
        }
    }
}

impl MagenConfig {
    /// Load `.magen/config.yaml`, or defaults when the file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: MagenConfig = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn schema_path(&self, root: &Path) -> PathBuf {
        root.join(&self.schema_path)
    }
}

// ---------------------------------------------------------------------------
// Template roots
// ---------------------------------------------------------------------------

const FLAG_PRIORITY: u32 = 500;
const ENV_PRIORITY: u32 = 400;
const CONFIG_PRIORITY: u32 = 300;
const USER_PRIORITY: u32 = 200;
const PROJECT_PRIORITY: u32 = 100;

/// Assemble the registry's roots, highest priority first: `--templates`
/// flag, `MAGEN_TEMPLATES_PATH`, config `template_roots`, `~/.magen/templates`,
/// then `<root>/.magen/templates`. Missing directories are dropped.
pub fn resolve_template_roots(
    root: &Path,
    config: &MagenConfig,
    flag: Option<&Path>,
) -> Vec<TemplateRoot> {
    collect_roots(
        root,
        config,
        flag,
        std::env::var_os(TEMPLATES_ENV),
        paths::user_templates_dir(),
    )
}

fn collect_roots(
    root: &Path,
    config: &MagenConfig,
    flag: Option<&Path>,
    env: Option<OsString>,
    user: Option<PathBuf>,
) -> Vec<TemplateRoot> {
    let mut candidates = Vec::new();

    if let Some(dir) = flag {
        candidates.push(TemplateRoot::new(dir, RootKind::Flag, FLAG_PRIORITY));
    }
    if let Some(value) = env {
        for (i, dir) in std::env::split_paths(&value).enumerate() {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let priority = ENV_PRIORITY.saturating_sub(i as u32);
            candidates.push(TemplateRoot::new(dir, RootKind::Env, priority));
        }
    }
    for (i, dir) in config.template_roots.iter().enumerate() {
        let priority = CONFIG_PRIORITY.saturating_sub(i as u32);
        candidates.push(TemplateRoot::new(root.join(dir), RootKind::Config, priority));
    }
    if let Some(dir) = user {
        candidates.push(TemplateRoot::new(dir, RootKind::User, USER_PRIORITY));
    }
    candidates.push(TemplateRoot::new(
        paths::project_templates_dir(root),
        RootKind::Project,
        PROJECT_PRIORITY,
    ));

    let mut roots: Vec<TemplateRoot> = Vec::new();
    for candidate in candidates {
        if !candidate.path.is_dir() {
            debug!(path = %candidate.path.display(), kind = %candidate.kind, "skipping missing template root");
            continue;
        }
        if roots.iter().any(|r| r.path == candidate.path) {
            continue;
        }
        roots.push(candidate);
    }
    roots
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
