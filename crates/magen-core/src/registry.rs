//! Template discovery and lookup.
//!
//! A registry is built once from an explicit, prioritised list of template
//! roots and holds an in-memory index of every valid descriptor found. Each
//! root may use a flat layout (`<root>/<name>/template.json`) or a versioned
//! one (`<root>/<name>/<MAJOR.MINOR.PATCH>/template.json`).

use crate::error::{MagenError, Result};
use crate::paths::{self, is_semver, TEMPLATE_JSON};
use crate::schema::{safe_validate_variables, validate_descriptor};
use crate::testing::has_test_instance;
use crate::types::{Platform, TemplateDescriptor, TemplateRef, TemplateVariable};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Roots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootKind {
    Flag,
    Env,
    Config,
    User,
    Project,
}

impl RootKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RootKind::Flag => "flag",
            RootKind::Env => "env",
            RootKind::Config => "config",
            RootKind::User => "user",
            RootKind::Project => "project",
        }
    }
}

impl fmt::Display for RootKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directory of templates. Higher priority wins on `name@version` clashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateRoot {
    pub path: PathBuf,
    pub kind: RootKind,
    pub priority: u32,
}

impl TemplateRoot {
    pub fn new(path: impl Into<PathBuf>, kind: RootKind, priority: u32) -> Self {
        Self {
            path: path.into(),
            kind,
            priority,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading a single template directory
// ---------------------------------------------------------------------------

/// Parse and validate `<dir>/template.json` alone.
pub fn read_template_json(dir: &Path) -> Result<TemplateDescriptor> {
    let path = paths::descriptor_path(dir);
    let raw = std::fs::read_to_string(&path)?;
    let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
        MagenError::InvalidDescriptor {
            path: path.clone(),
            errors: vec![e.to_string()],
        }
    })?;
    validate_descriptor(&value, &path)
}

/// Variables from `work/variables.json` or `variables.json`, if either exists.
pub fn read_variables(dir: &Path) -> Result<Option<Vec<TemplateVariable>>> {
    let path = paths::variables_path(dir);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| MagenError::InvalidDescriptor {
            path: path.clone(),
            errors: vec![e.to_string()],
        })?;
    safe_validate_variables(&value)
        .map(Some)
        .map_err(|errors| MagenError::InvalidDescriptor { path, errors })
}

/// Load a template directory strictly: both files must be valid.
pub fn load_template_dir(dir: &Path) -> Result<TemplateDescriptor> {
    let mut descriptor = read_template_json(dir)?;
    if let Some(vars) = read_variables(dir)? {
        descriptor.variables = vars;
    }
    Ok(descriptor)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateEntry {
    pub descriptor: TemplateDescriptor,
    pub path: PathBuf,
    pub root_kind: RootKind,
    pub version: String,
}

impl TemplateEntry {
    pub fn id(&self) -> String {
        format!("{}@{}", self.descriptor.name, self.version)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub platform: Option<Platform>,
    pub tags: Vec<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    pub descriptor: TemplateDescriptor,
    pub path: PathBuf,
    pub inheritance_chain: Vec<String>,
    pub total_variables: usize,
    pub required_variables: Vec<String>,
    pub optional_variables: Vec<String>,
    pub is_layered: bool,
    /// Whether `template test` has left an instance under `test/`.
    pub has_test_instance: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    roots: Vec<TemplateRoot>,
    entries: Vec<TemplateEntry>,
}

impl TemplateRegistry {
    /// Discover every template under `roots`. Missing roots and invalid
    /// templates are skipped; discovery itself never fails.
    pub fn new(mut roots: Vec<TemplateRoot>) -> Self {
        roots.sort_by(|a, b| b.priority.cmp(&a.priority));
        let mut registry = Self {
            roots,
            entries: Vec::new(),
        };
        registry.discover();
        registry
    }

    /// A registry over a single directory.
    pub fn from_root(path: impl Into<PathBuf>) -> Self {
        Self::new(vec![TemplateRoot::new(path, RootKind::Flag, 100)])
    }

    pub fn roots(&self) -> &[TemplateRoot] {
        &self.roots
    }

    fn discover(&mut self) {
        let mut seen: HashSet<String> = HashSet::new();
        let roots = self.roots.clone();
        for root in &roots {
            if !root.path.is_dir() {
                debug!(root = %root.path.display(), "template root does not exist, skipping");
                continue;
            }
            let dirs = match sorted_subdirs(&root.path) {
                Ok(dirs) => dirs,
                Err(e) => {
                    warn!(root = %root.path.display(), error = %e, "could not read template root");
                    continue;
                }
            };
            for template_dir in dirs {
                if template_dir.join(TEMPLATE_JSON).is_file() {
                    self.load_entry(&template_dir, None, root.kind, &mut seen);
                    continue;
                }
                let versions = match sorted_subdirs(&template_dir) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(path = %template_dir.display(), error = %e, "could not read template directory");
                        continue;
                    }
                };
                for version_dir in versions {
                    if !version_dir.join(TEMPLATE_JSON).is_file() {
                        continue;
                    }
                    let dir_name = file_name(&version_dir);
                    if !is_semver(&dir_name) {
                        warn!(
                            path = %version_dir.display(),
                            "invalid version directory: version must be semver format (e.g., 1.0.0)"
                        );
                        continue;
                    }
                    self.load_entry(&version_dir, Some(dir_name), root.kind, &mut seen);
                }
            }
        }
        debug!(count = self.entries.len(), "template discovery complete");
    }

    fn load_entry(
        &mut self,
        dir: &Path,
        dir_version: Option<String>,
        kind: RootKind,
        seen: &mut HashSet<String>,
    ) {
        let mut descriptor = match read_template_json(dir) {
            Ok(d) => d,
            Err(e) => {
                warn!(path = %dir.display(), "skipping invalid template: {e}");
                return;
            }
        };
        match read_variables(dir) {
            Ok(Some(vars)) => descriptor.variables = vars,
            Ok(None) => {}
            Err(e) => warn!(path = %dir.display(), "ignoring variables: {e}"),
        }

        let version = match dir_version {
            Some(v) => {
                if v != descriptor.version {
                    warn!(
                        path = %dir.display(),
                        declared = %descriptor.version,
                        "template.json version differs from its directory; using the directory"
                    );
                }
                v
            }
            None => descriptor.version.clone(),
        };

        let key = format!("{}@{}", descriptor.name, version);
        if !seen.insert(key.clone()) {
            debug!(template = %key, path = %dir.display(), "shadowed by higher-priority root");
            return;
        }
        self.entries.push(TemplateEntry {
            descriptor,
            path: dir.to_path_buf(),
            root_kind: kind,
            version,
        });
    }

    /// All templates in discovery order, optionally for one platform.
    pub fn list_templates(&self, platform: Option<Platform>) -> Vec<&TemplateEntry> {
        self.entries
            .iter()
            .filter(|e| platform.is_none_or(|p| e.descriptor.platform == p))
            .collect()
    }

    /// `name` resolves to its highest version, `name@x.y.z` to that exact one.
    pub fn find_template(&self, name: &str) -> Option<&TemplateEntry> {
        self.find(&TemplateRef::parse(name))
    }

    pub fn find(&self, template: &TemplateRef) -> Option<&TemplateEntry> {
        let candidates = self
            .entries
            .iter()
            .filter(|e| e.descriptor.name == template.name);
        match &template.version {
            Some(v) => candidates.into_iter().find(|e| &e.version == v),
            None => candidates.max_by_key(|e| semver::Version::parse(&e.version).ok()),
        }
    }

    pub fn get_template(&self, name: &str) -> Result<&TemplateEntry> {
        self.find_template(name)
            .ok_or_else(|| MagenError::TemplateNotFound(name.to_string()))
    }

    pub fn search_templates(&self, query: &SearchQuery) -> Vec<&TemplateEntry> {
        let name = query.name.as_deref().map(str::to_lowercase);
        let text = query.query.as_deref().map(str::to_lowercase);

        self.list_templates(query.platform)
            .into_iter()
            .filter(|e| {
                name.as_deref()
                    .is_none_or(|n| e.descriptor.name.to_lowercase().contains(n))
            })
            .filter(|e| query.tags.iter().all(|t| e.descriptor.tags.contains(t)))
            .filter(|e| {
                let Some(q) = text.as_deref() else {
                    return true;
                };
                let d = &e.descriptor;
                d.name.to_lowercase().contains(q)
                    || d
                        .description
                        .as_deref()
                        .is_some_and(|desc| desc.to_lowercase().contains(q))
                    || d.tags.iter().any(|t| t.to_lowercase().contains(q))
            })
            .collect()
    }

    /// Entries from `name` up to its root ancestor.
    pub fn inheritance_chain(&self, name: &str) -> Result<Vec<&TemplateEntry>> {
        let mut chain = vec![self.get_template(name)?];
        let mut ids = vec![chain[0].id()];
        while let Some(parent) = chain[chain.len() - 1].descriptor.parent() {
            let entry = self
                .find(&parent)
                .ok_or_else(|| MagenError::ParentNotFound(parent.to_string()))?;
            let id = entry.id();
            if ids.contains(&id) {
                ids.push(id);
                return Err(MagenError::CircularDependency(ids));
            }
            ids.push(id);
            chain.push(entry);
        }
        Ok(chain)
    }

    pub fn template_info(&self, name: &str) -> Result<TemplateInfo> {
        let entry = self.get_template(name)?;
        let d = &entry.descriptor;

        // A dangling parent still shows the chain as far as it resolves.
        let inheritance_chain = match self.inheritance_chain(name) {
            Ok(chain) => chain.iter().map(|e| e.id()).collect(),
            Err(MagenError::ParentNotFound(parent)) => {
                let mut ids = vec![entry.id()];
                let mut current = entry;
                while let Some(p) = current.descriptor.parent() {
                    match self.find(&p) {
                        Some(next) => {
                            ids.push(next.id());
                            current = next;
                        }
                        None => break,
                    }
                }
                ids.push(parent);
                ids
            }
            Err(e) => return Err(e),
        };

        Ok(TemplateInfo {
            descriptor: d.clone(),
            path: entry.path.clone(),
            inheritance_chain,
            total_variables: d.variables.len(),
            required_variables: d.required_variables().map(|v| v.name.clone()).collect(),
            optional_variables: d.optional_variables().map(|v| v.name.clone()).collect(),
            is_layered: d.is_layered(),
            has_test_instance: has_test_instance(&entry.path)?,
        })
    }

    /// Up to `limit` template names resembling `name`, best first.
    pub fn find_similar_templates(&self, name: &str, limit: usize) -> Vec<String> {
        let needle = name.to_lowercase();
        let mut names: Vec<&str> = Vec::new();
        for e in &self.entries {
            if !names.contains(&e.descriptor.name.as_str()) {
                names.push(&e.descriptor.name);
            }
        }
        let mut scored: Vec<(f64, &str)> = names
            .into_iter()
            .map(|n| (similarity(&needle, &n.to_lowercase()), n))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(limit)
            .filter(|(score, _)| *score > SIMILARITY_THRESHOLD)
            .map(|(_, n)| n.to_string())
            .collect()
    }

    /// True if following parent links from `name` ever revisits a template.
    /// Unknown names and dangling parents are not cycles.
    pub fn detect_cycle(&self, name: &str) -> bool {
        let mut visited = HashSet::new();
        let mut current = TemplateRef::parse(name);
        loop {
            let Some(entry) = self.find(&current) else {
                return false;
            };
            if !visited.insert(entry.id()) {
                return true;
            }
            match entry.descriptor.parent() {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}

const SIMILARITY_THRESHOLD: f64 = 0.3;

/// Substring and shared-prefix matches score first, then normalised
/// Levenshtein distance.
pub fn similarity(needle: &str, candidate: &str) -> f64 {
    if candidate.contains(needle) {
        return 0.9;
    }
    if needle.contains(candidate) {
        return 0.8;
    }
    let a: Vec<char> = needle.chars().collect();
    let b: Vec<char> = candidate.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    if prefix > 0 {
        return prefix as f64 / max_len as f64;
    }

    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        cur[0] = i;
        for j in 1..=b.len() {
            cur[j] = if a[i - 1] == b[j - 1] {
                prev[j - 1]
            } else {
                1 + prev[j - 1].min(prev[j]).min(cur[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

fn sorted_subdirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};
    use std::path::{Path, PathBuf};

    /// Write a template directory with `template.json`, `variables.json` and
    /// the given template files.
    pub fn write_template(
        dir: &Path,
        descriptor: Value,
        variables: Value,
        files: &[(&str, &str)],
    ) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join("template.json"),
            serde_json::to_string_pretty(&descriptor).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.join("variables.json"),
            serde_json::to_string_pretty(&json!({ "variables": variables })).unwrap(),
        )
        .unwrap();
        for (rel, content) in files {
            let path = dir.join("template").join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        dir.to_path_buf()
    }

    pub fn base_template(root: &Path, name: &str, version: &str) -> PathBuf {
        write_template(
            &root.join(name).join(version),
            json!({"name": name, "platform": "ios", "version": version, "tags": ["ios", "base"],
                   "description": "Minimal SwiftUI app"}),
            json!([{"name": "appName", "type": "string", "required": true, "default": "TestApp"}]),
            &[("App.swift", "{{appName}}")],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn discovers_flat_and_versioned_layouts() {
        let root = TempDir::new().unwrap();
        base_template(root.path(), "ios-base", "1.0.0");
        base_template(root.path(), "ios-base", "1.10.0");
        base_template(root.path(), "ios-base", "1.2.0");
        write_template(
            &root.path().join("android-flat"),
            json!({"name": "android-flat", "platform": "android", "version": "0.1.0"}),
            json!([]),
            &[],
        );

        let reg = TemplateRegistry::from_root(root.path());
        let ids: Vec<_> = reg.list_templates(None).iter().map(|e| e.id()).collect();
        assert_eq!(
            ids,
            vec!["android-flat@0.1.0", "ios-base@1.0.0", "ios-base@1.10.0", "ios-base@1.2.0"]
        );
        assert_eq!(reg.list_templates(Some(Platform::Android)).len(), 1);
    }

    #[test]
    fn find_picks_highest_semver_or_exact() {
        let root = TempDir::new().unwrap();
        base_template(root.path(), "ios-base", "1.2.0");
        base_template(root.path(), "ios-base", "1.10.0");

        let reg = TemplateRegistry::from_root(root.path());
        assert_eq!(reg.find_template("ios-base").unwrap().version, "1.10.0");
        assert_eq!(reg.find_template("ios-base@1.2.0").unwrap().version, "1.2.0");
        assert!(reg.find_template("ios-base@9.9.9").is_none());
        assert!(matches!(
            reg.get_template("missing"),
            Err(MagenError::TemplateNotFound(_))
        ));
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let root = TempDir::new().unwrap();
        base_template(root.path(), "ios-base", "1.0.0");
        write_template(
            &root.path().join("bad-version").join("1.0"),
            json!({"name": "bad-version", "platform": "ios", "version": "1.0"}),
            json!([]),
            &[],
        );
        write_template(
            &root.path().join("bad-desc").join("1.0.0"),
            json!({"name": "bad-desc", "platform": "ios", "version": "one"}),
            json!([]),
            &[],
        );
        let reg = TemplateRegistry::from_root(root.path());
        assert_eq!(reg.list_templates(None).len(), 1);
    }

    #[test]
    fn invalid_variables_keep_template() {
        let root = TempDir::new().unwrap();
        let dir = base_template(root.path(), "ios-base", "1.0.0");
        std::fs::write(dir.join("variables.json"), "{\"variables\": 3}").unwrap();
        let reg = TemplateRegistry::from_root(root.path());
        let entry = reg.get_template("ios-base").unwrap();
        assert!(entry.descriptor.variables.is_empty());
        assert!(load_template_dir(&dir).is_err());
    }

    #[test]
    fn work_variables_take_precedence() {
        let root = TempDir::new().unwrap();
        let dir = base_template(root.path(), "ios-base", "1.0.0");
        std::fs::create_dir_all(dir.join("work")).unwrap();
        std::fs::write(
            dir.join("work/variables.json"),
            json!({"variables": [{"name": "bundleId", "type": "string", "required": true}]})
                .to_string(),
        )
        .unwrap();
        let d = load_template_dir(&dir).unwrap();
        assert_eq!(d.variables[0].name, "bundleId");
    }

    #[test]
    fn higher_priority_root_wins() {
        let high = TempDir::new().unwrap();
        let low = TempDir::new().unwrap();
        base_template(high.path(), "ios-base", "1.0.0");
        base_template(low.path(), "ios-base", "1.0.0");
        base_template(low.path(), "ios-extra", "1.0.0");

        let reg = TemplateRegistry::new(vec![
            TemplateRoot::new(low.path(), RootKind::Project, 25),
            TemplateRoot::new(high.path(), RootKind::Env, 75),
            TemplateRoot::new(high.path().join("missing"), RootKind::User, 50),
        ]);
        assert_eq!(reg.list_templates(None).len(), 2);
        let entry = reg.get_template("ios-base").unwrap();
        assert_eq!(entry.root_kind, RootKind::Env);
        assert!(entry.path.starts_with(high.path()));
    }

    #[test]
    fn search_filters_combine() {
        let root = TempDir::new().unwrap();
        base_template(root.path(), "ios-base", "1.0.0");
        write_template(
            &root.path().join("ios-login").join("1.0.0"),
            json!({"name": "ios-login", "platform": "ios", "version": "1.0.0",
                   "tags": ["ios", "auth"], "description": "Login with Salesforce"}),
            json!([]),
            &[],
        );
        let reg = TemplateRegistry::from_root(root.path());

        let q = |query: Option<&str>, tags: &[&str]| SearchQuery {
            query: query.map(String::from),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        };
        assert_eq!(reg.search_templates(&q(None, &["ios"])).len(), 2);
        assert_eq!(reg.search_templates(&q(None, &["ios", "auth"])).len(), 1);
        assert_eq!(reg.search_templates(&q(Some("salesforce"), &[])).len(), 1);
        assert_eq!(reg.search_templates(&q(Some("swiftui"), &[])).len(), 1);
        let by_name = SearchQuery {
            name: Some("LOGIN".into()),
            ..Default::default()
        };
        assert_eq!(reg.search_templates(&by_name)[0].descriptor.name, "ios-login");
    }

    #[test]
    fn info_reports_chain_and_variables() {
        let root = TempDir::new().unwrap();
        base_template(root.path(), "ios-base", "1.0.0");
        write_template(
            &root.path().join("ios-login").join("2.0.0"),
            json!({"name": "ios-login", "platform": "ios", "version": "2.0.0",
                   "extends": {"template": "ios-base", "version": "1.0.0"}}),
            json!([
                {"name": "appName", "type": "string", "required": true},
                {"name": "theme", "type": "string", "required": false}
            ]),
            &[],
        );
        let reg = TemplateRegistry::from_root(root.path());
        let info = reg.template_info("ios-login").unwrap();
        assert_eq!(info.inheritance_chain, vec!["ios-login@2.0.0", "ios-base@1.0.0"]);
        assert_eq!(info.required_variables, vec!["appName"]);
        assert_eq!(info.optional_variables, vec!["theme"]);
        assert!(info.is_layered);
        assert!(!info.has_test_instance);
    }

    #[test]
    fn similar_names_suggested() {
        let root = TempDir::new().unwrap();
        base_template(root.path(), "ios-base", "1.0.0");
        base_template(root.path(), "android-base", "1.0.0");
        base_template(root.path(), "zzz", "1.0.0");
        let reg = TemplateRegistry::from_root(root.path());
        let similar = reg.find_similar_templates("ios", 5);
        assert_eq!(similar[0], "ios-base");
        assert!(!similar.contains(&"zzz".to_string()));
        assert!(reg.find_similar_templates("ios-bsae", 5).contains(&"ios-base".to_string()));
    }

    #[test]
    fn similarity_scores() {
        assert_eq!(similarity("ios", "ios-base"), 0.9);
        assert_eq!(similarity("ios-base-extra", "ios-base"), 0.8);
        assert!((similarity("abcd", "abxy") - 0.5).abs() < f64::EPSILON);
        assert_eq!(similarity("kitten", "sitting"), 1.0 - 3.0 / 7.0);
    }

    #[test]
    fn cycle_detection_through_registry() {
        let root = TempDir::new().unwrap();
        for (name, parent) in [("a", "b"), ("b", "a")] {
            write_template(
                &root.path().join(name).join("1.0.0"),
                json!({"name": name, "platform": "ios", "version": "1.0.0", "basedOn": parent}),
                json!([]),
                &[],
            );
        }
        base_template(root.path(), "ios-base", "1.0.0");
        let reg = TemplateRegistry::from_root(root.path());
        assert!(reg.detect_cycle("a"));
        assert!(!reg.detect_cycle("ios-base"));
        assert!(!reg.detect_cycle("unknown"));
        assert!(matches!(
            reg.inheritance_chain("a"),
            Err(MagenError::CircularDependency(_))
        ));
    }
}
