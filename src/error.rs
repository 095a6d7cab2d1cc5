//! Error types for docsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::git::GatewayError;
use crate::sync::SyncError;

/// Result type alias for docsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    PageNotFound,

    // Validation (exit 4)
    InvalidArgument,

    // Structure (exit 5)
    CycleDetected,

    // Sync (exit 6)
    SyncError,
    SyncBusy,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Repository gateway (exit 9)
    GitError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::PageNotFound => "PAGE_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::CycleDetected => "CYCLE_DETECTED",
            Self::SyncError => "SYNC_ERROR",
            Self::SyncBusy => "SYNC_BUSY",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::GitError => "GIT_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-9).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::PageNotFound => 3,
            Self::InvalidArgument => 4,
            Self::CycleDetected => 5,
            Self::SyncError | Self::SyncBusy => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
            Self::GitError => 9,
        }
    }

    /// Whether retrying the same command can succeed.
    ///
    /// True for a busy repository lock and transient database contention.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SyncBusy | Self::DatabaseError | Self::InvalidArgument
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in docsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `docsync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Page not found: {id}")]
    PageNotFound { id: String },

    #[error("Page not found: {id} (did you mean: {}?)", similar.join(", "))]
    PageNotFoundSimilar { id: String, similar: Vec<String> },

    #[error("Cannot move page {id} under {parent}: it would become its own ancestor")]
    CycleDetected { id: i64, parent: i64 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Git error: {0}")]
    Git(#[from] GatewayError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::PageNotFound { .. } | Self::PageNotFoundSimilar { .. } => {
                ErrorCode::PageNotFound
            }
            Self::CycleDetected { .. } => ErrorCode::CycleDetected,
            Self::Sync(SyncError::RepositoryMissing(_)) | Self::Config(_) => {
                ErrorCode::ConfigError
            }
            Self::Sync(SyncError::Busy(_)) => ErrorCode::SyncBusy,
            Self::Sync(SyncError::PageNotFound(_)) => ErrorCode::PageNotFound,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::Git(_) => ErrorCode::GitError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `docsync init --repo <path>` to create the database".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::PageNotFound { id } => Some(format!(
                "No page matching '{id}'. Use `docsync page list` to see available pages."
            )),
            Self::PageNotFoundSimilar { similar, .. } => {
                Some(format!("Did you mean: {}?", similar.join(", ")))
            }

            Self::CycleDetected { .. } => {
                Some("Choose a parent outside the page's own subtree.".to_string())
            }

            Self::Sync(SyncError::RepositoryMissing(path)) => Some(format!(
                "Create {} or point docsync elsewhere with --repo / DOCSYNC_REPO.",
                path.display()
            )),
            Self::Sync(SyncError::Busy(path)) => Some(format!(
                "Wait for the running sync to finish. If none is running, remove {}.",
                path.display()
            )),

            Self::Git(GatewayError::NotARepository(path)) => Some(format!(
                "Run `git init` in {} (or clone the documentation repository there).",
                path.display()
            )),

            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Sync(_)
            | Self::Git(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
