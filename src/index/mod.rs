//! Secondary indexes over flat-file records
//!
//! An index stores positions, not keys. Every comparison follows a position
//! into the shared flat file, decodes the key found there and applies the
//! index's key comparator.
//!
//! # Variants
//!
//! | Alias             | Records         | Equal keys               |
//! |-------------------|-----------------|--------------------------|
//! | [`IndexSet`]      | key             | rejected                 |
//! | [`IndexMultiset`] | key             | kept, in insertion order |
//! | [`IndexMap`]      | key, mapped     | rejected                 |
//! | [`IndexMultimap`] | key, mapped     | kept, in insertion order |
//!
//! All four are [`IndexBase`] instantiations.
//!
//! # Invariants
//!
//! - The flat file only grows; erasing an element never touches its record
//! - An insert appends its record even when a unique index rejects the key
//! - Views returned by cursors borrow the index and stay valid while it is
//!   borrowed, even if a sibling index appends to the shared file

mod base;
mod compare;
mod config;
mod cursor;
mod errors;
mod map;
mod set;
mod variant;

pub use base::IndexBase;
pub use compare::{FnCompare, IndirectComparator, KeyCompare, Natural, Reverse};
pub use config::{IndexConfig, MIN_NODE_SIZE};
pub use cursor::{Cursor, Iter};
pub use errors::{IndexError, IndexResult};
pub use map::{IndexMap, IndexMultimap};
pub use set::{IndexMultiset, IndexSet};
pub use variant::{MapKind, Multi, SetKind, Unique, Uniqueness, Variant};
