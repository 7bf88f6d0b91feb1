//! Codec error types
//!
//! Error codes:
//! - FLATDEX_CODEC_END_OF_BUFFER
//! - FLATDEX_CODEC_INVALID_VARINT
//! - FLATDEX_CODEC_LENGTH_OVERFLOW
//! - FLATDEX_CODEC_INVALID_UTF8
//! - FLATDEX_CODEC_INVALID_BOOL
//!
//! A decode failure on a record that the index itself wrote means the flat
//! file is corrupt, so every codec error is FATAL once it reaches the index.

use thiserror::Error;

/// Result type for codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while decoding a record from flat-file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("unexpected end of buffer: needed {needed} bytes, {remaining} remaining")]
    EndOfBuffer { needed: usize, remaining: usize },

    #[error("invalid varint length prefix")]
    InvalidVarint,

    #[error("length prefix {0} does not fit in memory")]
    LengthOverflow(u64),

    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid bool byte: {0:#04x}")]
    InvalidBool(u8),
}

impl CodecError {
    /// Returns the stable string code for this error
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::EndOfBuffer { .. } => "FLATDEX_CODEC_END_OF_BUFFER",
            CodecError::InvalidVarint => "FLATDEX_CODEC_INVALID_VARINT",
            CodecError::LengthOverflow(_) => "FLATDEX_CODEC_LENGTH_OVERFLOW",
            CodecError::InvalidUtf8 => "FLATDEX_CODEC_INVALID_UTF8",
            CodecError::InvalidBool(_) => "FLATDEX_CODEC_INVALID_BOOL",
        }
    }
}
