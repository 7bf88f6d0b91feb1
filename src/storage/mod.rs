//! Flat-file storage for serialized records
//!
//! The flat file is an append-only byte store. Every record is addressed by
//! its [`Position`], the byte offset at which it starts. Records are never
//! rewritten, moved or reclaimed, so a position stays valid, and decodes to
//! the same bytes, for the life of the file.
//!
//! # Design Principles
//!
//! - Append-only (no in-place updates, no compaction)
//! - Memory-mapped reads that borrow the mapping directly
//! - Growth adds mapping segments and never remaps existing ones
//! - One file may back any number of indexes through [`SharedFile`]

mod checksum;
mod errors;
mod flat_file;

pub use checksum::{checksum_parts, verify_parts};
pub use errors::{Severity, StorageError, StorageResult};
pub use flat_file::{
    FlatFile, OpenMode, SharedFile, DEFAULT_FILE_RESERVE, HEADER_LEN, MAP_GRANULARITY,
};

/// Byte offset of a record within the flat file
pub type Position = u64;
