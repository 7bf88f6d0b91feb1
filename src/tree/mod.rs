//! Ordered position container
//!
//! Stores flat-file positions in the order induced by a caller-supplied
//! probe, and persists them with a header carrying the creation signature,
//! the variant kind and structural statistics.
//!
//! The tree only ever sees positions. Ordering, uniqueness of keys and
//! decoding are the index layer's concern.

mod header;
mod position_tree;
mod stats;

pub use header::{TreeHeader, VariantKind, HEADER_SIZE};
pub use position_tree::{PositionTree, Slot, TreeOptions};
pub use stats::TreeStats;
