use crate::error::{MagenError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Template directory layout
// ---------------------------------------------------------------------------

pub const TEMPLATE_JSON: &str = "template.json";
pub const VARIABLES_JSON: &str = "variables.json";
pub const TEMPLATE_DIR: &str = "template";
pub const WORK_DIR: &str = "work";
pub const TEST_DIR: &str = "test";
pub const DEFAULT_PATCH_FILE: &str = "layer.patch";
pub const README_FILE: &str = "README.md";

// ---------------------------------------------------------------------------
// Project layout
// ---------------------------------------------------------------------------

pub const MAGEN_DIR: &str = ".magen";
pub const CONFIG_FILE: &str = ".magen/config.yaml";
pub const PROJECT_TEMPLATES_DIR: &str = ".magen/templates";
pub const USER_TEMPLATES_DIR: &str = ".magen/templates";
pub const DEFAULT_SDD_DIR: &str = "magi-sdd";
pub const DEFAULT_SCHEMA_FILE: &str = "template-metadata.schema.json";

pub const PRD_FILE: &str = "prd.md";
pub const TDD_FILE: &str = "tdd.md";
pub const TASKS_FILE: &str = "tasks.md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn descriptor_path(template_dir: &Path) -> PathBuf {
    template_dir.join(TEMPLATE_JSON)
}

pub fn template_files_dir(template_dir: &Path) -> PathBuf {
    template_dir.join(TEMPLATE_DIR)
}

pub fn work_dir(template_dir: &Path) -> PathBuf {
    template_dir.join(WORK_DIR)
}

pub fn test_dir(template_dir: &Path) -> PathBuf {
    template_dir.join(TEST_DIR)
}

/// `work/variables.json` wins over the root `variables.json` when present.
pub fn variables_path(template_dir: &Path) -> PathBuf {
    let work = work_dir(template_dir).join(VARIABLES_JSON);
    if work.is_file() {
        work
    } else {
        template_dir.join(VARIABLES_JSON)
    }
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn project_templates_dir(root: &Path) -> PathBuf {
    root.join(PROJECT_TEMPLATES_DIR)
}

pub fn user_templates_dir() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(USER_TEMPLATES_DIR))
}

pub fn sdd_dir(root: &Path, sdd_directory: &str) -> PathBuf {
    root.join(sdd_directory)
}

pub fn feature_dir(root: &Path, sdd_directory: &str, feature_id: &str) -> PathBuf {
    sdd_dir(root, sdd_directory).join(feature_id)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

static SEMVER_RE: OnceLock<Regex> = OnceLock::new();
static FEATURE_ID_RE: OnceLock<Regex> = OnceLock::new();

fn semver_re() -> &'static Regex {
    SEMVER_RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+$").unwrap())
}

fn feature_id_re() -> &'static Regex {
    FEATURE_ID_RE.get_or_init(|| Regex::new(r"^\d{3}-[a-z0-9-]+$").unwrap())
}

/// Strict `MAJOR.MINOR.PATCH`; no pre-release or build suffixes.
pub fn is_semver(version: &str) -> bool {
    semver_re().is_match(version)
}

pub fn is_valid_feature_id(id: &str) -> bool {
    feature_id_re().is_match(id)
}

pub fn validate_feature_id(id: &str) -> Result<()> {
    if !is_valid_feature_id(id) {
        return Err(MagenError::InvalidFeatureId(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn semver_gate() {
        for bad in ["1.0", "v1.0.0", "1.0.0-beta", "1.0.0.0", "", "1..0"] {
            assert!(!is_semver(bad), "{bad} should be rejected");
        }
        for good in ["0.0.1", "1.0.0", "10.20.30"] {
            assert!(is_semver(good), "{good} should be accepted");
        }
    }

    #[test]
    fn feature_ids() {
        assert!(is_valid_feature_id("001-login-flow"));
        assert!(is_valid_feature_id("123-a"));
        assert!(!is_valid_feature_id("1-login"));
        assert!(!is_valid_feature_id("001_login"));
        assert!(!is_valid_feature_id("001-Login"));
        assert!(validate_feature_id("abc").is_err());
    }

    #[test]
    fn variables_path_prefers_work_copy() {
        let dir = TempDir::new().unwrap();
        assert_eq!(variables_path(dir.path()), dir.path().join("variables.json"));

        std::fs::create_dir_all(dir.path().join("work")).unwrap();
        std::fs::write(dir.path().join("work/variables.json"), "{}").unwrap();
        assert_eq!(
            variables_path(dir.path()),
            dir.path().join("work/variables.json")
        );
    }

    #[test]
    fn feature_dir_layout() {
        let root = Path::new("/proj");
        assert_eq!(
            feature_dir(root, DEFAULT_SDD_DIR, "001-x"),
            PathBuf::from("/proj/magi-sdd/001-x")
        );
    }
}
