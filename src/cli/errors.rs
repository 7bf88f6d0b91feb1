//! CLI-specific error types

use std::fmt;
use std::io;

use crate::index::IndexError;
use crate::storage::StorageError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Invalid command-line options
    InvalidArgs,
    /// Index or storage failure
    IndexError,
    /// The index and the reference container disagreed
    Divergence,
    /// I/O error (stdout, directories)
    IoError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgs => "FLATDEX_CLI_INVALID_ARGS",
            Self::IndexError => "FLATDEX_CLI_INDEX_ERROR",
            Self::Divergence => "FLATDEX_CLI_DIVERGENCE",
            Self::IoError => "FLATDEX_CLI_IO_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgs, msg)
    }

    /// The index under test gave a different answer than `BTreeMap`
    pub fn divergence(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Divergence, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<IndexError> for CliError {
    fn from(e: IndexError) -> Self {
        Self::new(CliErrorCode::IndexError, format!("{} ({})", e, e.code()))
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        Self::new(CliErrorCode::IndexError, format!("{} ({})", e, e.code()))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
