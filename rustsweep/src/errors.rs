//! Error types shared by every stage of a sweep job.
//!
//! Errors fall into two groups. Setup and pattern errors (`EmptyManifest`,
//! `FileNotFound` raised while building a manifest, `InvalidPattern`,
//! `ConfigError`) end the whole job before any file is touched. Everything
//! else is raised while a single file is being scanned or rewritten; the
//! coordinator contains those at the file boundary and records them on the
//! file's outcome instead of aborting.
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for sweep operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur while preparing or running a sweep job
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("No input files to process")]
    EmptyManifest,
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Failed to create temporary file next to {path}: {source}")]
    TempFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to commit rewritten file {path}: {source}")]
    Commit {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Audit log error: {0}")]
    AuditLog(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid UTF-8 in file {path}: {source}")]
    EncodingError {
        path: PathBuf,
        source: std::str::Utf8Error,
    },
}

impl SearchError {
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn audit_log(msg: impl Into<String>) -> Self {
        Self::AuditLog(msg.into())
    }

    pub fn encoding_error(path: impl Into<PathBuf>, source: std::str::Utf8Error) -> Self {
        Self::EncodingError {
            path: path.into(),
            source,
        }
    }

    /// Maps an error from opening `path` onto the matching variant
    pub fn from_open(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }
}
