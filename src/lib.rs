//! flatdex - ordered secondary indexes over an append-only flat file
//!
//! Records (a key, optionally followed by a mapped value) are appended to a
//! memory-mapped flat file. An index keeps only their positions, ordered by
//! the key stored at each position, so several indexes with different
//! comparators can share one file.
//!
//! - [`codec`]: byte encodings of keys and mapped values
//! - [`storage`]: the segmented, memory-mapped flat file
//! - [`tree`]: the persisted, ordered sequence of positions
//! - [`index`]: set, multiset, map and multimap front ends
//! - [`cli`]: header inspection and the randomized equivalence run

pub mod cli;
pub mod codec;
pub mod index;
pub mod storage;
pub mod tree;

pub use codec::Codec;
pub use index::{
    Cursor, IndexBase, IndexConfig, IndexError, IndexMap, IndexMultimap, IndexMultiset,
    IndexResult, IndexSet, KeyCompare,
};
pub use storage::{FlatFile, OpenMode, Position, SharedFile};
