//! Spec-driven development (SDD) feature workflow.
//!
//! A feature moves through `init → buildingPrd → buildingTdd → buildingTasks →
//! completed`. There is no state file: the phase is derived every time from
//! which of `prd.md`, `tdd.md` and `tasks.md` exist under
//! `<project>/<sdd_directory>/<featureId>/` and whether they carry a
//! finalization marker.

use crate::error::{MagenError, Result};
use crate::io::{append_text, atomic_write};
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

pub const FINALIZED_MARKER: &str = "✅ **FINALIZED**";
pub const FINALIZED_FOOTER: &str = "*This document was finalized by the magi workflow system.*";

const FINALIZATION_BLOCK: &str = "\n\n---\n\n## Finalization Status\n\n\
✅ **FINALIZED** - This document is complete and approved for the next phase.\n\n\
*This document was finalized by the magi workflow system.*";

// ---------------------------------------------------------------------------
// SddState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SddState {
    Init,
    BuildingPrd,
    BuildingTdd,
    BuildingTasks,
    Completed,
}

impl SddState {
    pub fn as_str(self) -> &'static str {
        match self {
            SddState::Init => "init",
            SddState::BuildingPrd => "buildingPrd",
            SddState::BuildingTdd => "buildingTdd",
            SddState::BuildingTasks => "buildingTasks",
            SddState::Completed => "completed",
        }
    }

    /// The document being written in this state, if any.
    pub fn document(self) -> Option<Document> {
        match self {
            SddState::BuildingPrd => Some(Document::Prd),
            SddState::BuildingTdd => Some(Document::Tdd),
            SddState::BuildingTasks => Some(Document::Tasks),
            SddState::Init | SddState::Completed => None,
        }
    }
}

impl fmt::Display for SddState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Document {
    Prd,
    Tdd,
    Tasks,
}

impl Document {
    pub fn all() -> &'static [Document] {
        &[Document::Prd, Document::Tdd, Document::Tasks]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Document::Prd => "prd",
            Document::Tdd => "tdd",
            Document::Tasks => "tasks",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Document::Prd => "PRD",
            Document::Tdd => "TDD",
            Document::Tasks => "Tasks",
        }
    }

    pub fn filename(self) -> &'static str {
        match self {
            Document::Prd => paths::PRD_FILE,
            Document::Tdd => paths::TDD_FILE,
            Document::Tasks => paths::TASKS_FILE,
        }
    }

    pub fn next(self) -> Option<Document> {
        match self {
            Document::Prd => Some(Document::Tdd),
            Document::Tdd => Some(Document::Tasks),
            Document::Tasks => None,
        }
    }

    pub fn building_state(self) -> SddState {
        match self {
            Document::Prd => SddState::BuildingPrd,
            Document::Tdd => SddState::BuildingTdd,
            Document::Tasks => SddState::BuildingTasks,
        }
    }

    fn missing_hint(self, feature_id: &str) -> String {
        match self {
            Document::Prd => format!("write {} for feature {feature_id} first", paths::PRD_FILE),
            Document::Tdd => format!("run 'magen sdd finalize {feature_id} prd' to start the TDD"),
            Document::Tasks => {
                format!("run 'magen sdd finalize {feature_id} tdd' to start the task list")
            }
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Document {
    type Err = MagenError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prd" => Ok(Document::Prd),
            "tdd" => Ok(Document::Tdd),
            "tasks" => Ok(Document::Tasks),
            _ => Err(MagenError::InvalidDocument(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Init,
    InProgress,
    Finalized,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Init => "init",
            DocumentStatus::InProgress => "in_progress",
            DocumentStatus::Finalized => "finalized",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub document: Document,
    pub status: DocumentStatus,
    pub path: PathBuf,
}

/// Per-document status implied by a workflow state.
pub fn document_statuses(state: SddState) -> [(Document, DocumentStatus); 3] {
    use DocumentStatus::*;
    let [prd, tdd, tasks] = match state {
        SddState::Init => [Init, Init, Init],
        SddState::BuildingPrd => [InProgress, Init, Init],
        SddState::BuildingTdd => [Finalized, InProgress, Init],
        SddState::BuildingTasks => [Finalized, Finalized, InProgress],
        SddState::Completed => [Finalized, Finalized, Finalized],
    };
    [
        (Document::Prd, prd),
        (Document::Tdd, tdd),
        (Document::Tasks, tasks),
    ]
}

pub fn is_finalized(content: &str) -> bool {
    content.contains(FINALIZED_MARKER) || content.contains(FINALIZED_FOOTER)
}

/// Read a document, treating a missing or whitespace-only file as absent.
fn read_document(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(s) if s.trim().is_empty() => Ok(None),
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Derive the workflow state from the documents in `feature_dir`.
pub fn determine_state(feature_dir: &Path) -> Result<SddState> {
    let mut contents = Vec::with_capacity(3);
    for doc in Document::all() {
        contents.push((*doc, read_document(&feature_dir.join(doc.filename()))?));
    }

    if contents.iter().all(|(_, c)| c.is_none()) {
        return Ok(SddState::Init);
    }
    let pending = contents
        .iter()
        .find(|(_, c)| !c.as_deref().is_some_and(is_finalized));
    Ok(match pending {
        Some((doc, _)) => doc.building_state(),
        None => SddState::Completed,
    })
}

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeReport {
    pub document: Document,
    pub path: PathBuf,
    /// False when the document already carried a marker.
    pub changed: bool,
    pub state: SddState,
    /// Placeholder created for the next document, if one was written.
    pub placeholder: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub id: String,
    pub dir: PathBuf,
}

impl Feature {
    pub fn open(root: &Path, sdd_directory: &str, id: &str) -> Result<Self> {
        paths::validate_feature_id(id)?;
        Ok(Feature {
            id: id.to_string(),
            dir: paths::feature_dir(root, sdd_directory, id),
        })
    }

    pub fn document_path(&self, doc: Document) -> PathBuf {
        self.dir.join(doc.filename())
    }

    pub fn state(&self) -> Result<SddState> {
        determine_state(&self.dir)
    }

    pub fn documents(&self) -> Result<Vec<DocumentReport>> {
        let state = self.state()?;
        Ok(document_statuses(state)
            .into_iter()
            .map(|(document, status)| DocumentReport {
                document,
                status,
                path: self.document_path(document),
            })
            .collect())
    }

    /// Mark `doc` as finalized by appending the finalization block.
    ///
    /// Only the document the feature is currently building may be finalized.
    /// Finalizing PRD or TDD also seeds a placeholder for the next document.
    pub fn finalize(&self, doc: Document) -> Result<FinalizeReport> {
        let path = self.document_path(doc);
        let content = read_document(&path)?.ok_or_else(|| MagenError::DocumentMissing {
            document: doc.label().to_string(),
            hint: doc.missing_hint(&self.id),
        })?;

        if is_finalized(&content) {
            return Ok(FinalizeReport {
                document: doc,
                path,
                changed: false,
                state: self.state()?,
                placeholder: None,
            });
        }

        let current = self.state()?;
        if current != doc.building_state() {
            return Err(MagenError::InvalidTransition {
                from: current.to_string(),
                to: format!("{doc} finalized"),
                reason: match current.document() {
                    Some(building) => format!("{} must be finalized first", building.label()),
                    None => format!("feature is {current}"),
                },
            });
        }

        append_text(&path, FINALIZATION_BLOCK)?;
        info!(feature = %self.id, document = %doc, "finalized document");

        let mut placeholder = None;
        if let Some(next) = doc.next() {
            let next_path = self.document_path(next);
            if !next_path.exists() {
                atomic_write(&next_path, placeholder_content(next, &self.id).as_bytes())?;
                placeholder = Some(next_path);
            }
        }

        Ok(FinalizeReport {
            document: doc,
            path,
            changed: true,
            state: self.state()?,
            placeholder,
        })
    }
}

fn placeholder_content(doc: Document, feature_id: &str) -> String {
    let label = doc.label();
    format!(
        "# {label} Document\n\n\
         ## Overview\n\
         This is a placeholder {label} document. Replace this content with the actual {label}.\n\n\
         ## Instructions\n\
         - Edit this file with the {label} content\n\
         - When it is complete, run 'magen sdd finalize {feature_id} {doc}' to move to the next phase\n\n\
         ---\n\
         *This file was created by the magi workflow system.*\n"
    )
}

// ---------------------------------------------------------------------------
// Feature ids
// ---------------------------------------------------------------------------

static PREFIX_RE: OnceLock<Regex> = OnceLock::new();

fn prefix_re() -> &'static Regex {
    PREFIX_RE.get_or_init(|| Regex::new(r"^(\d{3})-").unwrap())
}

/// Lowercase, drop everything but `[a-z0-9 -]`, collapse spaces and dashes.
pub fn kebab_case(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() || *c == '-')
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    cleaned
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Numeric prefix of a feature id (`"007-login"` → `7`).
pub fn feature_id_prefix(id: &str) -> Option<u32> {
    prefix_re()
        .captures(id)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Next free `NNN-kebab-name` id under `<project>/<sdd_directory>`.
pub fn next_feature_id(project: &Path, sdd_directory: &str, name: &str) -> Result<String> {
    let slug = kebab_case(name);
    let dir = paths::sdd_dir(project, sdd_directory);

    let mut highest = 0;
    if dir.is_dir() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(n) = feature_id_prefix(&entry.file_name().to_string_lossy()) {
                highest = highest.max(n);
            }
        }
    }

    let id = format!("{:03}-{slug}", highest + 1);
    paths::validate_feature_id(&id)?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
