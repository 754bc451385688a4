//! Tree diff and patch application behind a narrow interface.
//!
//! [`GitPatchEngine`] shells out to `git diff --no-index` and `git apply`, which
//! handle added, deleted and binary files without needing a repository. Callers
//! only see [`PatchEngine`], so an in-process implementation can replace it.

use crate::error::{MagenError, Result};
use crate::io::copy_tree;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;
use tracing::debug;

/// Result of comparing two trees. Finding differences is not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOutcome {
    Identical,
    Changed(String),
}

impl DiffOutcome {
    pub fn patch_text(&self) -> &str {
        match self {
            DiffOutcome::Identical => "",
            DiffOutcome::Changed(text) => text,
        }
    }

    pub fn is_changed(&self) -> bool {
        matches!(self, DiffOutcome::Changed(_))
    }
}

pub trait PatchEngine {
    /// Fail fast with [`MagenError::ToolUnavailable`] if the engine cannot run.
    fn ensure_available(&self) -> Result<()>;

    /// Unified diff turning `before` into `after`, with paths relative to the
    /// tree roots under `a/` and `b/`.
    fn compute_diff(&self, before: &Path, after: &Path) -> Result<DiffOutcome>;

    /// Apply the patch stored at `patch` to the files under `tree`, in place.
    fn apply_patch(&self, tree: &Path, patch: &Path) -> Result<()>;
}

const GIT: &str = "git";

#[derive(Debug, Clone, Default)]
pub struct GitPatchEngine {
    program: Option<PathBuf>,
}

impl GitPatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific git binary instead of looking one up on `PATH`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn program(&self) -> PathBuf {
        self.program.clone().unwrap_or_else(|| PathBuf::from(GIT))
    }

    fn command(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new(self.program());
        cmd.current_dir(cwd);
        // Never let an enclosing repository change how paths resolve.
        if let Some(parent) = cwd.parent() {
            cmd.env("GIT_CEILING_DIRECTORIES", parent);
        }
        cmd.env_remove("GIT_DIR");
        cmd.env_remove("GIT_WORK_TREE");
        cmd.env_remove("GIT_INDEX_FILE");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    fn run(&self, mut cmd: Command) -> Result<Output> {
        cmd.output().map_err(|e| MagenError::ToolUnavailable {
            tool: GIT.to_string(),
            reason: e.to_string(),
        })
    }
}

impl PatchEngine for GitPatchEngine {
    fn ensure_available(&self) -> Result<()> {
        match &self.program {
            Some(p) if p.is_file() => Ok(()),
            Some(p) => Err(MagenError::ToolUnavailable {
                tool: GIT.to_string(),
                reason: format!("{} does not exist", p.display()),
            }),
            None => which::which(GIT).map(|_| ()).map_err(|e| MagenError::ToolUnavailable {
                tool: GIT.to_string(),
                reason: format!("{e}. Install git and ensure it is on your PATH"),
            }),
        }
    }

    fn compute_diff(&self, before: &Path, after: &Path) -> Result<DiffOutcome> {
        let stage = TempDir::new()?;
        copy_tree(before, &stage.path().join("a"))?;
        copy_tree(after, &stage.path().join("b"))?;

        let mut cmd = self.command(stage.path());
        cmd.args([
            "diff",
            "--no-index",
            "--no-prefix",
            "--binary",
            "--no-renames",
            "--no-color",
            "--no-ext-diff",
            "a",
            "b",
        ]);
        let output = self.run(cmd)?;

        // `--no-index` implies `--exit-code`: 1 means "differences found".
        match output.status.code() {
            Some(0) => Ok(DiffOutcome::Identical),
            Some(1) => {
                let text = String::from_utf8_lossy(&output.stdout).into_owned();
                debug!(bytes = text.len(), "computed tree diff");
                Ok(DiffOutcome::Changed(text))
            }
            code => Err(MagenError::ToolFailed {
                tool: GIT.to_string(),
                status: code.unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    fn apply_patch(&self, tree: &Path, patch: &Path) -> Result<()> {
        let patch_abs = std::path::absolute(patch)?;
        let mut cmd = self.command(tree);
        cmd.args(["apply", "-p1", "--whitespace=nowarn"]).arg(&patch_abs);
        let output = self.run(cmd)?;

        if !output.status.success() {
            return Err(MagenError::PatchApplyFailed {
                patch: patch.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(patch = %patch.display(), tree = %tree.display(), "applied patch");
        Ok(())
    }
}
