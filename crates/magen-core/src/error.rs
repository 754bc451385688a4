use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MagenError {
    #[error("invalid template descriptor at {}:\n  {}", path.display(), errors.join("\n  "))]
    InvalidDescriptor { path: PathBuf, errors: Vec<String> },

    #[error("invalid platform '{0}': expected ios, android or cross-platform")]
    InvalidPlatform(String),

    #[error("invalid document '{0}': expected prd, tdd or tasks")]
    InvalidDocument(String),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("parent template not found: {0}")]
    ParentNotFound(String),

    #[error("template {0} cannot extend itself")]
    SelfReference(String),

    #[error("circular dependency detected: {}", .0.join(" → "))]
    CircularDependency(Vec<String>),

    #[error("variable validation failed:\n  {}", .0.join("\n  "))]
    VariableValidation(Vec<String>),

    #[error("file already exists: {}. Use --overwrite to replace existing files.", .0.display())]
    FileExists(PathBuf),

    #[error("output directory is not empty: {}. Use --overwrite to replace existing files.", .0.display())]
    OutputNotEmpty(PathBuf),

    #[error("work/ directory already exists at {}. Use --force to overwrite it.", .0.display())]
    WorkDirExists(PathBuf),

    #[error("{tool} is required but not available: {reason}")]
    ToolUnavailable { tool: String, reason: String },

    #[error("{tool} exited with status {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: i32,
        stderr: String,
    },

    #[error("layer patch {} no longer applies cleanly: {stderr}", patch.display())]
    PatchApplyFailed { patch: PathBuf, stderr: String },

    #[error("layer patch file not found at {}", .0.display())]
    MissingPatch(PathBuf),

    #[error("layer patch file is empty: {}", .0.display())]
    EmptyPatch(PathBuf),

    #[error("work directory not found at {}. Edit layered templates in work/, not template/.", .0.display())]
    MissingWorkDir(PathBuf),

    #[error("no parent template specified for '{0}': pass --based-on or set basedOn in template.json")]
    NoParent(String),

    #[error("template '{0}' is not a layered template")]
    NotLayered(String),

    #[error("invalid version '{0}': must be semver format (e.g., 1.0.0)")]
    InvalidVersion(String),

    #[error("invalid template name '{0}': use a single directory name such as ios-login")]
    InvalidTemplateName(String),

    #[error("template directory already exists and is not empty: {}", .0.display())]
    TemplateExists(PathBuf),

    #[error("template '{0}' uses the flat layout; pass an output directory for the new version")]
    UnversionedTemplate(String),

    #[error("no templates match the requirements")]
    NoTemplateMatch,

    #[error("invalid complexity '{0}': expected simple, moderate or advanced")]
    InvalidComplexity(String),

    #[error("invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("template files not found at {}", .0.display())]
    MissingTemplateFiles(PathBuf),

    #[error("render error: {0}")]
    Render(String),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("invalid feature id '{0}': expected NNN-kebab-name")]
    InvalidFeatureId(String),

    #[error("{document} document not found or empty: {hint}")]
    DocumentMissing { document: String, hint: String },

    #[error("JSON schema at {} is out of sync with TemplateMetadata: run 'magen schema generate'", .0.display())]
    SchemaOutOfSync(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MagenError>;
