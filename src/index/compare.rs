//! Key comparators and the indirect comparator over positions

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;

use super::errors::{IndexError, IndexResult};
use crate::codec::Codec;
use crate::storage::{FlatFile, Position};

/// Orders stored keys of type `K` against search keys of type `Q`.
///
/// `KeyCompare<K>` is the total order of the index itself. An extra
/// `KeyCompare<K, Q>` lets the index be searched by `Q` directly, as long
/// as it agrees with that order: for any search key, the stored keys
/// comparing `Less` sort before those comparing `Equal`, which sort before
/// those comparing `Greater`.
pub trait KeyCompare<K: ?Sized, Q: ?Sized = K> {
    fn compare(&self, key: &K, search: &Q) -> Ordering;
}

/// Orders keys by their `Ord` implementation, searching by any type the
/// key borrows as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Natural;

impl<K, Q> KeyCompare<K, Q> for Natural
where
    K: Borrow<Q> + ?Sized,
    Q: Ord + ?Sized,
{
    fn compare(&self, key: &K, search: &Q) -> Ordering {
        key.borrow().cmp(search)
    }
}

/// Inverts the wrapped comparator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reverse<C>(pub C);

impl<K: ?Sized, Q: ?Sized, C: KeyCompare<K, Q>> KeyCompare<K, Q> for Reverse<C> {
    fn compare(&self, key: &K, search: &Q) -> Ordering {
        self.0.compare(key, search).reverse()
    }
}

/// Adapts a closure into a comparator.
#[derive(Clone, Copy)]
pub struct FnCompare<F>(pub F);

impl<K: ?Sized, Q: ?Sized, F: Fn(&K, &Q) -> Ordering> KeyCompare<K, Q> for FnCompare<F> {
    fn compare(&self, key: &K, search: &Q) -> Ordering {
        (self.0)(key, search)
    }
}

impl<F> fmt::Debug for FnCompare<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCompare")
    }
}

/// Orders positions, and search keys against positions, by decoding the key
/// stored at each position and applying the wrapped comparator.
///
/// Results for a pair of positions are stable: records below the flat file's
/// logical end are never rewritten.
pub struct IndirectComparator<'f, K: Codec + ?Sized, C> {
    comp: &'f C,
    file: &'f FlatFile,
    _key: PhantomData<fn(&K)>,
}

impl<'f, K: Codec + ?Sized, C> IndirectComparator<'f, K, C> {
    pub fn new(comp: &'f C, file: &'f FlatFile) -> Self {
        Self {
            comp,
            file,
            _key: PhantomData,
        }
    }

    /// Decodes the key at the start of the record at `position`.
    pub fn decode_key(&self, position: Position) -> IndexResult<K::View<'f>> {
        let mut bytes = self.file.read(position)?;
        K::decode(&mut bytes).map_err(|e| IndexError::decode(position, e))
    }

    pub fn key_key(&self, lhs: &K::Borrowed, rhs: &K::Borrowed) -> Ordering
    where
        C: KeyCompare<K::Borrowed>,
    {
        self.comp.compare(lhs, rhs)
    }

    pub fn key_position<Q: ?Sized>(&self, lhs: &Q, rhs: Position) -> IndexResult<Ordering>
    where
        C: KeyCompare<K::Borrowed, Q>,
    {
        let rhs = self.decode_key(rhs)?;
        Ok(self.comp.compare(K::as_borrowed(&rhs), lhs).reverse())
    }

    pub fn position_key<Q: ?Sized>(&self, lhs: Position, rhs: &Q) -> IndexResult<Ordering>
    where
        C: KeyCompare<K::Borrowed, Q>,
    {
        let lhs = self.decode_key(lhs)?;
        Ok(self.comp.compare(K::as_borrowed(&lhs), rhs))
    }

    pub fn position_position(&self, lhs: Position, rhs: Position) -> IndexResult<Ordering>
    where
        C: KeyCompare<K::Borrowed>,
    {
        let lhs = self.decode_key(lhs)?;
        let rhs = self.decode_key(rhs)?;
        Ok(self.comp.compare(K::as_borrowed(&lhs), K::as_borrowed(&rhs)))
    }
}
