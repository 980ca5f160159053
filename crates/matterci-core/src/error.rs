//! Error types for matterci-core

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the certification CI pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Required environment variable is missing
    #[error("required environment variable {0} is not set")]
    MissingEnv(String),

    /// Test manifest file not found
    #[error("test manifest not found at path: {path}")]
    ManifestNotFound { path: PathBuf },

    /// Test manifest failed schema validation
    #[error("invalid test manifest: {0}")]
    InvalidManifest(String),

    /// Template placeholder with no binding
    #[error("unresolved template placeholder: {{{0}}}")]
    UnresolvedPlaceholder(String),

    /// No map file matched the build output pattern
    #[error("no map file matching pattern: {0}")]
    MapFileNotFound(String),

    /// No pipeline found for a commit
    #[error("no pipeline found: {0}")]
    PipelineNotFound(String),

    /// Named job missing from a pipeline
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Artifact download failed
    #[error("artifact download failed: {0}")]
    ArtifactDownload(String),

    /// External tool invocation failed
    #[error("external tool failed: {0}")]
    ToolFailed(String),

    /// Blocking command exceeded its deadline
    #[error("command timed out after {timeout_secs}s: {command}")]
    CommandTimeout { command: String, timeout_secs: u64 },

    /// DUT communication failure
    #[error("DUT error: {0}")]
    Dut(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error (GitLab API)
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}
