//! Persisted header of a position-tree file
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! +----------------------+
//! | Magic (8)            | "FLATDXIX"
//! | Version (u32)        |
//! | Kind (u8) + pad (3)  |
//! | Node Size (u32)      |
//! | Levels (u32)         |
//! | Signature (u64)      |
//! | Element Count (u64)  |
//! | Leaf Nodes (u64)     |
//! | Branch Nodes (u64)   |
//! | Free List Head (u64) |
//! | Checksum (u32)       | crc32 over the header above and the body
//! | pad (4)              |
//! +----------------------+
//! | Positions (u64 * N)  |
//! +----------------------+
//! ```

use std::fmt;
use std::path::Path;

use bytes::{Buf, BufMut};

use super::stats::TreeStats;
use crate::storage::{StorageError, StorageResult};

pub(crate) const MAGIC: &[u8; 8] = b"FLATDXIX";
pub(crate) const VERSION: u32 = 1;

/// Encoded header length in bytes.
pub const HEADER_SIZE: usize = 72;

/// Offset of the checksum field; the checksum covers everything before it.
pub(crate) const CHECKSUM_OFFSET: usize = 64;

/// Which of the four index shapes a tree file was created for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Set,
    Multiset,
    Map,
    Multimap,
}

impl VariantKind {
    /// Returns whether equal keys are rejected
    pub fn is_unique(self) -> bool {
        matches!(self, VariantKind::Set | VariantKind::Map)
    }

    /// Returns whether records carry a mapped value after the key
    pub fn has_mapped(self) -> bool {
        matches!(self, VariantKind::Map | VariantKind::Multimap)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VariantKind::Set => "set",
            VariantKind::Multiset => "multiset",
            VariantKind::Map => "map",
            VariantKind::Multimap => "multimap",
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            VariantKind::Set => 1,
            VariantKind::Multiset => 2,
            VariantKind::Map => 3,
            VariantKind::Multimap => 4,
        }
    }

    fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(VariantKind::Set),
            2 => Some(VariantKind::Multiset),
            3 => Some(VariantKind::Map),
            4 => Some(VariantKind::Multimap),
            _ => None,
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header of a position-tree file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHeader {
    /// Caller-chosen creation signature, passed through unchanged
    pub signature: u64,
    pub kind: VariantKind,
    pub stats: TreeStats,
}

impl TreeHeader {
    pub fn new(signature: u64, kind: VariantKind, node_size: u32, element_count: u64) -> Self {
        Self {
            signature,
            kind,
            stats: TreeStats::compute(element_count, node_size),
        }
    }

    /// Writes the header without its checksum field.
    pub(crate) fn encode_unchecked(&self, buf: &mut impl BufMut) {
        buf.put_slice(MAGIC);
        buf.put_u32_le(VERSION);
        buf.put_u8(self.kind.to_u8());
        buf.put_bytes(0, 3);
        buf.put_u32_le(self.stats.node_size);
        buf.put_u32_le(self.stats.levels);
        buf.put_u64_le(self.signature);
        buf.put_u64_le(self.stats.element_count);
        buf.put_u64_le(self.stats.leaf_node_count);
        buf.put_u64_le(self.stats.branch_node_count);
        buf.put_u64_le(self.stats.free_node_list_head);
    }

    /// Parses the first `CHECKSUM_OFFSET` bytes of `bytes`.
    pub(crate) fn decode(path: &Path, mut bytes: &[u8]) -> StorageResult<Self> {
        if bytes.len() < CHECKSUM_OFFSET {
            return Err(StorageError::corrupt(path, "truncated index header"));
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(StorageError::corrupt(path, "bad index file magic"));
        }
        bytes.advance(MAGIC.len());

        let version = bytes.get_u32_le();
        if version != VERSION {
            return Err(StorageError::corrupt(
                path,
                format!("unsupported index file version {}", version),
            ));
        }
        let kind_byte = bytes.get_u8();
        let kind = VariantKind::from_u8(kind_byte).ok_or_else(|| {
            StorageError::corrupt(path, format!("unknown variant kind {}", kind_byte))
        })?;
        bytes.advance(3);

        let node_size = bytes.get_u32_le();
        let levels = bytes.get_u32_le();
        let signature = bytes.get_u64_le();
        let element_count = bytes.get_u64_le();
        let leaf_node_count = bytes.get_u64_le();
        let branch_node_count = bytes.get_u64_le();
        let free_node_list_head = bytes.get_u64_le();

        Ok(Self {
            signature,
            kind,
            stats: TreeStats {
                element_count,
                node_size,
                levels,
                leaf_node_count,
                branch_node_count,
                free_node_list_head,
            },
        })
    }
}

impl fmt::Display for TreeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stats)?;
        writeln!(f, "  signature ----------------: {:#018x}", self.signature)?;
        writeln!(f, "  variant kind -------------: {}", self.kind)?;
        writeln!(f, "  unique keys --------------: {}", yes_no(self.kind.is_unique()))?;
        writeln!(f, "  mapped values ------------: {}", yes_no(self.kind.has_mapped()))
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
