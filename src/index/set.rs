//! Set and multiset front ends

use super::base::IndexBase;
use super::compare::{KeyCompare, Natural};
use super::errors::IndexResult;
use super::variant::{Multi, SetKind, Unique, Uniqueness};
use crate::codec::Codec;
use crate::storage::Position;
use crate::tree::Slot;

/// Ordered set of keys stored in a flat file
pub type IndexSet<K, C = Natural> = IndexBase<SetKind<K, Unique>, C>;

/// Ordered multiset of keys stored in a flat file
pub type IndexMultiset<K, C = Natural> = IndexBase<SetKind<K, Multi>, C>;

impl<K, C> IndexBase<SetKind<K, Unique>, C>
where
    K: Codec + ?Sized,
    C: KeyCompare<K::Borrowed>,
{
    /// Inserts `key` unless an equal key is present.
    ///
    /// The record is appended to the flat file either way. Returns the slot of
    /// the new or existing element and whether it was inserted.
    pub fn insert(&mut self, key: &K::Borrowed) -> IndexResult<(Slot, bool)> {
        self.insert_record(key, K::encoded_size(key), |buf| K::encode(key, buf))
    }
}

impl<K, C> IndexBase<SetKind<K, Multi>, C>
where
    K: Codec + ?Sized,
    C: KeyCompare<K::Borrowed>,
{
    /// Inserts `key` after any equal keys and returns its slot.
    pub fn insert(&mut self, key: &K::Borrowed) -> IndexResult<Slot> {
        self.insert_record(key, K::encoded_size(key), |buf| K::encode(key, buf))
            .map(|(slot, _)| slot)
    }
}

impl<K, U, C> IndexBase<SetKind<K, U>, C>
where
    K: Codec + ?Sized,
    U: Uniqueness,
{
    /// Appends `key` to the flat file without indexing it.
    ///
    /// Index the record later with `insert_position`, here or in any index
    /// sharing the file.
    pub fn push_back(&mut self, key: &K::Borrowed) -> IndexResult<Position> {
        self.push_record(K::encoded_size(key), |buf| K::encode(key, buf))
    }
}
