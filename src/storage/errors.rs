//! Storage error types
//!
//! Error codes:
//! - FLATDEX_STORAGE_IO_ERROR (ERROR severity)
//! - FLATDEX_STORAGE_CORRUPT (FATAL severity)
//! - FLATDEX_STORAGE_READ_ONLY (ERROR severity)
//! - FLATDEX_STORAGE_POSITION_OUT_OF_RANGE (ERROR severity)

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Severity levels shared by every flatdex error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the caller may retry or report
    Error,
    /// Internal consistency is lost; the caller should stop using the files
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Errors raised by the flat file and the position-container file
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("corrupt file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("{} is opened read-only", path.display())]
    ReadOnly { path: PathBuf },

    #[error("position {position} is outside the flat file data region (size {size})")]
    PositionOutOfRange { position: u64, size: u64 },
}

impl StorageError {
    /// Create an I/O error with context
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        StorageError::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a corruption error for the file at `path`
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StorageError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Io { .. } => "FLATDEX_STORAGE_IO_ERROR",
            StorageError::Corrupt { .. } => "FLATDEX_STORAGE_CORRUPT",
            StorageError::ReadOnly { .. } => "FLATDEX_STORAGE_READ_ONLY",
            StorageError::PositionOutOfRange { .. } => "FLATDEX_STORAGE_POSITION_OUT_OF_RANGE",
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        match self {
            StorageError::Io { .. }
            | StorageError::ReadOnly { .. }
            | StorageError::PositionOutOfRange { .. } => Severity::Error,
            StorageError::Corrupt { .. } => Severity::Fatal,
        }
    }

    /// Returns whether the files themselves failed, as opposed to a caller
    /// passing an argument they cannot serve.
    pub fn is_file_failure(&self) -> bool {
        matches!(self, StorageError::Io { .. } | StorageError::Corrupt { .. })
    }

    /// Returns whether this error is fatal
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
