//! Cursors and iterators over an open index
//!
//! Both decode lazily: nothing is read from the flat file until an element is
//! asked for. Decoded views may borrow the mapped bytes, so they live as long
//! as the borrow of the index they came from.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ptr;

use super::base::Attached;
use super::errors::IndexResult;
use super::variant::Variant;
use crate::codec::Codec;
use crate::storage::Position;
use crate::tree::Slot;

/// Bidirectional cursor over the elements of an index.
///
/// Two cursors are equal when they come from the same open index and sit at
/// the same slot; the decoded values are never compared.
pub struct Cursor<'a, V: Variant> {
    attached: &'a Attached,
    slot: Slot,
    _variant: PhantomData<fn() -> V>,
}

impl<'a, V: Variant> Cursor<'a, V> {
    pub(crate) fn new(attached: &'a Attached, slot: Slot) -> Self {
        Self {
            attached,
            slot,
            _variant: PhantomData,
        }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn is_end(&self) -> bool {
        self.slot >= self.attached.tree().end()
    }

    /// Flat-file position of the current element, `None` at the end.
    pub fn position(&self) -> Option<Position> {
        self.attached.tree().get(self.slot)
    }

    fn current(&self) -> Position {
        match self.position() {
            Some(position) => position,
            None => panic!("dereference of end cursor"),
        }
    }

    /// Decodes the current element.
    ///
    /// # Panics
    ///
    /// Panics at the end cursor.
    pub fn value(&self) -> IndexResult<V::Item<'a>> {
        self.attached.item::<V>(self.current())
    }

    /// Decodes only the key of the current element.
    ///
    /// # Panics
    ///
    /// Panics at the end cursor.
    pub fn key(&self) -> IndexResult<<V::Key as Codec>::View<'a>> {
        self.attached.key::<V::Key>(self.current())
    }

    /// # Panics
    ///
    /// Panics at the end cursor.
    pub fn move_next(&mut self) {
        assert!(!self.is_end(), "advance past end cursor");
        self.slot = Slot(self.slot.0 + 1);
    }

    /// # Panics
    ///
    /// Panics at the first element.
    pub fn move_prev(&mut self) {
        assert!(self.slot.0 > 0, "retreat before first element");
        self.slot = Slot(self.slot.0 - 1);
    }
}

impl<V: Variant> Clone for Cursor<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V: Variant> Copy for Cursor<'_, V> {}

impl<V: Variant> PartialEq for Cursor<'_, V> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.attached, other.attached) && self.slot == other.slot
    }
}

impl<V: Variant> Eq for Cursor<'_, V> {}

impl<V: Variant> fmt::Debug for Cursor<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("slot", &self.slot.0)
            .field("position", &self.position())
            .finish()
    }
}

/// Double-ended iterator over a run of elements.
///
/// Yields `Err` for an element whose record cannot be read, then carries on.
pub struct Iter<'a, V: Variant> {
    attached: &'a Attached,
    front: usize,
    back: usize,
    _variant: PhantomData<fn() -> V>,
}

impl<'a, V: Variant> Iter<'a, V> {
    pub(crate) fn new(attached: &'a Attached, start: Slot, stop: Slot) -> Self {
        Self {
            attached,
            front: start.0,
            back: stop.0,
            _variant: PhantomData,
        }
    }

    fn decode(&self, slot: usize) -> Option<IndexResult<V::Item<'a>>> {
        let attached: &'a Attached = self.attached;
        let position = attached.tree().get(Slot(slot))?;
        Some(attached.item::<V>(position))
    }
}

impl<'a, V: Variant> Iterator for Iter<'a, V> {
    type Item = IndexResult<V::Item<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let slot = self.front;
        self.front += 1;
        self.decode(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back.saturating_sub(self.front);
        (len, Some(len))
    }
}

impl<V: Variant> DoubleEndedIterator for Iter<'_, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.decode(self.back)
    }
}

impl<V: Variant> ExactSizeIterator for Iter<'_, V> {}

impl<V: Variant> FusedIterator for Iter<'_, V> {}
