//! Index error types
//!
//! Error codes:
//! - FLATDEX_NOT_OPEN (ERROR)
//! - FLATDEX_READ_ONLY (ERROR)
//! - FLATDEX_SIGNATURE_MISMATCH (ERROR)
//! - FLATDEX_KIND_MISMATCH (ERROR)
//! - FLATDEX_INVALID_CONFIG (ERROR)
//! - FLATDEX_STORAGE_IO (severity of the underlying storage error)
//! - FLATDEX_ENCODING_SIZE (FATAL)
//! - FLATDEX_DECODE_FAILED (FATAL)

use thiserror::Error;

use crate::codec::CodecError;
use crate::storage::{Position, Severity, StorageError};
use crate::tree::VariantKind;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors returned by index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index is not open")]
    NotOpen,

    #[error("index is opened read-only")]
    ReadOnly,

    #[error("creation signature mismatch: expected {expected:#x}, found {found:#x}")]
    SignatureMismatch { expected: u64, found: u64 },

    #[error("index file holds a {found}, opened as a {expected}")]
    KindMismatch {
        expected: VariantKind,
        found: VariantKind,
    },

    #[error("invalid index configuration: {0}")]
    InvalidConfig(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("codec declared {declared} bytes but wrote {written}")]
    EncodingSize { declared: usize, written: usize },

    #[error("failed to decode record at position {position}: {source}")]
    Decode {
        position: Position,
        #[source]
        source: CodecError,
    },
}

impl IndexError {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            IndexError::NotOpen => "FLATDEX_NOT_OPEN",
            IndexError::ReadOnly => "FLATDEX_READ_ONLY",
            IndexError::SignatureMismatch { .. } => "FLATDEX_SIGNATURE_MISMATCH",
            IndexError::KindMismatch { .. } => "FLATDEX_KIND_MISMATCH",
            IndexError::InvalidConfig(_) => "FLATDEX_INVALID_CONFIG",
            IndexError::Storage(_) => "FLATDEX_STORAGE_IO",
            IndexError::EncodingSize { .. } => "FLATDEX_ENCODING_SIZE",
            IndexError::Decode { .. } => "FLATDEX_DECODE_FAILED",
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        match self {
            IndexError::Storage(e) => e.severity(),
            IndexError::EncodingSize { .. } | IndexError::Decode { .. } => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub(crate) fn decode(position: Position, source: CodecError) -> Self {
        IndexError::Decode { position, source }
    }
}
