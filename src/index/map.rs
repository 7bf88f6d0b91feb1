//! Map and multimap front ends

use super::base::IndexBase;
use super::compare::{KeyCompare, Natural};
use super::errors::IndexResult;
use super::variant::{MapKind, Multi, Unique, Uniqueness};
use crate::codec::Codec;
use crate::storage::Position;
use crate::tree::Slot;

/// Ordered map from keys to mapped values stored in a flat file
pub type IndexMap<K, T, C = Natural> = IndexBase<MapKind<K, T, Unique>, C>;

/// Ordered multimap from keys to mapped values stored in a flat file
pub type IndexMultimap<K, T, C = Natural> = IndexBase<MapKind<K, T, Multi>, C>;

fn record_size<K, T>(key: &K::Borrowed, mapped: &T::Borrowed) -> usize
where
    K: Codec + ?Sized,
    T: Codec + ?Sized,
{
    K::encoded_size(key) + T::encoded_size(mapped)
}

impl<K, T, C> IndexBase<MapKind<K, T, Unique>, C>
where
    K: Codec + ?Sized,
    T: Codec + ?Sized,
    C: KeyCompare<K::Borrowed>,
{
    /// Inserts `key` mapped to `mapped` unless the key is present.
    ///
    /// The record is appended to the flat file either way, and an existing
    /// mapped value is left unchanged.
    pub fn insert(&mut self, key: &K::Borrowed, mapped: &T::Borrowed) -> IndexResult<(Slot, bool)> {
        self.insert_record(key, record_size::<K, T>(key, mapped), |buf| {
            K::encode(key, buf);
            T::encode(mapped, buf);
        })
    }
}

impl<K, T, C> IndexBase<MapKind<K, T, Multi>, C>
where
    K: Codec + ?Sized,
    T: Codec + ?Sized,
    C: KeyCompare<K::Borrowed>,
{
    /// Inserts `key` mapped to `mapped` after any equal keys.
    pub fn insert(&mut self, key: &K::Borrowed, mapped: &T::Borrowed) -> IndexResult<Slot> {
        self.insert_record(key, record_size::<K, T>(key, mapped), |buf| {
            K::encode(key, buf);
            T::encode(mapped, buf);
        })
        .map(|(slot, _)| slot)
    }
}

impl<K, T, U, C> IndexBase<MapKind<K, T, U>, C>
where
    K: Codec + ?Sized,
    T: Codec + ?Sized,
    U: Uniqueness,
{
    /// Appends a key/mapped record to the flat file without indexing it.
    pub fn push_back(&mut self, key: &K::Borrowed, mapped: &T::Borrowed) -> IndexResult<Position> {
        self.push_record(record_size::<K, T>(key, mapped), |buf| {
            K::encode(key, buf);
            T::encode(mapped, buf);
        })
    }

    /// Mapped value of the first element equal to `key`.
    pub fn get<Q: ?Sized>(&self, key: &Q) -> IndexResult<Option<T::View<'_>>>
    where
        C: KeyCompare<K::Borrowed, Q>,
    {
        let cursor = self.find(key)?;
        if cursor.is_end() {
            return Ok(None);
        }
        let (_, mapped) = cursor.value()?;
        Ok(Some(mapped))
    }
}
