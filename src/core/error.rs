use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AkrError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Template not found: {0}")]
    TemplateNotFound(String),
    #[error("Template fetch failed: {0}")]
    TemplateFetch(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Path escapes repository root: {0}")]
    PathTraversal(String),
    #[error("Workflow violation: {0}")]
    WorkflowViolation(String),
    #[error("Version control error: {0}")]
    Vcs(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Error taxonomy surfaced in structured responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    PermissionDenied,
    EnforcementFailed,
    ConfigDisabled,
    FileNotFound,
    WriteFailed,
    CommitFailed,
    WorkflowViolation,
    PathTraversal,
    InitializationFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::EnforcementFailed => "ENFORCEMENT_FAILED",
            Self::ConfigDisabled => "CONFIG_DISABLED",
            Self::FileNotFound => "FILE_NOT_FOUND",
            Self::WriteFailed => "WRITE_FAILED",
            Self::CommitFailed => "COMMIT_FAILED",
            Self::WorkflowViolation => "WORKFLOW_VIOLATION",
            Self::PathTraversal => "PATH_TRAVERSAL",
            Self::InitializationFailed => "INITIALIZATION_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AkrError {
    /// Taxonomy bucket used when this error crosses the public boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AkrError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            AkrError::PathTraversal(_) => ErrorKind::PathTraversal,
            AkrError::WorkflowViolation(_) => ErrorKind::WorkflowViolation,
            AkrError::Vcs(_) => ErrorKind::CommitFailed,
            AkrError::IoError(e) if e.kind() == io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            AkrError::IoError(_) => ErrorKind::WriteFailed,
            AkrError::Config(_) | AkrError::TemplateFetch(_) => ErrorKind::InitializationFailed,
            AkrError::JsonError(_)
            | AkrError::TemplateNotFound(_)
            | AkrError::ValidationError(_) => ErrorKind::EnforcementFailed,
        }
    }
}
