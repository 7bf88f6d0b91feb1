//! Generic index engine shared by every variant
//!
//! # State machine
//!
//! `Unopened -> Open -> Closed`, and `Closed -> Open` again on a later
//! `open`. Data operations outside Open return [`IndexError::NotOpen`].
//!
//! # Failure
//!
//! An I/O failure or corruption raised by any data operation leaves the
//! index Closed: `is_open()` turns false at once. A position the caller
//! passes in that lies outside the flat file is an ordinary error and the
//! index stays open.
//!
//! An insert appends its record before touching the tree, so a failure after
//! the append leaves at worst an unindexed record in the flat file. When a
//! failed index is closed or dropped its tree is written once more, through
//! the atomic replace, so elements indexed before the failure survive if the
//! index file is still writable.

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{self, AtomicBool};

use tracing::{debug, error, info, warn};

use super::compare::{IndirectComparator, KeyCompare, Natural};
use super::config::IndexConfig;
use super::cursor::{Cursor, Iter};
use super::errors::{IndexError, IndexResult};
use super::variant::Variant;
use crate::codec::Codec;
use crate::storage::{FlatFile, OpenMode, Position, SharedFile, StorageError, HEADER_LEN};
use crate::tree::{PositionTree, Slot, TreeHeader, TreeOptions, TreeStats};

type KeyOf<V> = <<V as Variant>::Key as Codec>::Borrowed;

/// Files and tree of an open index.
#[derive(Debug)]
pub(crate) struct Attached {
    file: SharedFile,
    tree: PositionTree,
    read_only: bool,
    failed: AtomicBool,
}

impl Attached {
    fn is_failed(&self) -> bool {
        self.failed.load(atomic::Ordering::Relaxed)
    }

    /// Marks the index failed if `result` is an I/O failure or corruption.
    fn guard<T>(&self, result: IndexResult<T>) -> IndexResult<T> {
        if let Err(IndexError::Storage(e)) = &result {
            if e.is_file_failure() && !self.failed.swap(true, atomic::Ordering::Relaxed) {
                error!(
                    index = %self.tree.path().display(),
                    code = e.code(),
                    error = %e,
                    "INDEX_FAILED_CLOSED"
                );
            }
        }
        result
    }

    /// Writes the tree of a failed index one last time.
    fn retire(mut self) {
        let count = self.tree.len();
        match self.tree.flush() {
            Ok(()) => warn!(
                index = %self.tree.path().display(),
                count,
                "INDEX_FAILED_TREE_PERSISTED"
            ),
            Err(e) => error!(
                index = %self.tree.path().display(),
                count,
                error = %e,
                "INDEX_UNFLUSHED_DISCARDED"
            ),
        }
    }

    pub(crate) fn tree(&self) -> &PositionTree {
        &self.tree
    }

    fn record(&self, position: Position) -> IndexResult<&[u8]> {
        self.guard(self.file.read(position).map_err(IndexError::from))
    }

    pub(crate) fn item<V: Variant>(&self, position: Position) -> IndexResult<V::Item<'_>> {
        let mut bytes = self.record(position)?;
        V::decode_item(position, &mut bytes)
    }

    pub(crate) fn key<K: Codec + ?Sized>(&self, position: Position) -> IndexResult<K::View<'_>> {
        let mut bytes = self.record(position)?;
        K::decode(&mut bytes).map_err(|e| IndexError::decode(position, e))
    }
}

#[derive(Debug)]
enum State {
    Unopened,
    Open(Attached),
    Closed,
}

/// Ordered index of flat-file records, generic over its variant `V` and key
/// comparator `C`.
///
/// Use the aliases [`IndexSet`](super::IndexSet),
/// [`IndexMultiset`](super::IndexMultiset), [`IndexMap`](super::IndexMap) and
/// [`IndexMultimap`](super::IndexMultimap).
pub struct IndexBase<V: Variant, C = Natural> {
    comp: C,
    state: State,
    _variant: PhantomData<fn() -> V>,
}

impl<V: Variant, C: Default> Default for IndexBase<V, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<V: Variant, C> IndexBase<V, C> {
    /// Creates an unopened index with the default comparator.
    pub fn new() -> Self
    where
        C: Default,
    {
        Self::default()
    }

    /// Creates an unopened index ordered by `comp`.
    pub fn with_comparator(comp: C) -> Self {
        Self {
            comp,
            state: State::Unopened,
            _variant: PhantomData,
        }
    }

    /// Opens the flat file and the index file named by `config`.
    ///
    /// # Errors
    ///
    /// `SignatureMismatch` or `KindMismatch` if an existing index file was
    /// created with another signature or for another variant, `InvalidConfig`
    /// for a bad configuration, and `Storage` for I/O failures.
    ///
    /// # Panics
    ///
    /// Panics if the index is already open.
    pub fn open(&mut self, config: &IndexConfig) -> IndexResult<()> {
        self.assert_not_open();
        config.validate()?;
        let file = FlatFile::open_shared(&config.file_path, config.mode, config.file_reserve)?;
        self.open_with_file(file, config)
    }

    /// Opens the index file named by `config` over an already open flat file.
    ///
    /// `config.file_path` and `config.file_reserve` are ignored.
    pub fn open_with_file(&mut self, file: SharedFile, config: &IndexConfig) -> IndexResult<()> {
        self.assert_not_open();
        config.validate()?;

        let tree = PositionTree::open(
            &config.index_path,
            config.mode,
            TreeOptions {
                signature: config.signature,
                kind: V::KIND,
                node_size: config.node_size,
            },
        )?;
        if tree.signature() != config.signature {
            return Err(IndexError::SignatureMismatch {
                expected: config.signature,
                found: tree.signature(),
            });
        }
        if tree.kind() != V::KIND {
            return Err(IndexError::KindMismatch {
                expected: V::KIND,
                found: tree.kind(),
            });
        }

        let read_only = config.mode.is_read_only() || file.is_read_only();
        info!(
            index = %config.index_path.display(),
            file = %file.path().display(),
            kind = %V::KIND,
            mode = ?config.mode,
            count = tree.len(),
            "INDEX_OPENED"
        );

        self.state = State::Open(Attached {
            file,
            tree,
            read_only,
            failed: AtomicBool::new(false),
        });
        Ok(())
    }

    fn assert_not_open(&self) {
        if let State::Open(attached) = &self.state {
            assert!(attached.is_failed(), "open called on an index that is already open");
        }
    }

    /// Returns whether data operations are currently allowed.
    pub fn is_open(&self) -> bool {
        matches!(&self.state, State::Open(a) if !a.is_failed())
    }

    /// Flushes the index file and moves to Closed. The flat file stays open
    /// for any other index sharing it.
    ///
    /// Closing an index that is not open does nothing.
    pub fn close(&mut self) -> IndexResult<()> {
        let attached = match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(attached) => attached,
            State::Unopened => {
                self.state = State::Unopened;
                return Ok(());
            }
            State::Closed => return Ok(()),
        };
        if attached.is_failed() {
            attached.retire();
            return Ok(());
        }

        let Attached { file, mut tree, .. } = attached;
        tree.flush()?;
        file.flush()?;
        info!(index = %tree.path().display(), count = tree.len(), "INDEX_CLOSED");
        Ok(())
    }

    /// Persists the index file and the flat file. The index stays open.
    pub fn flush(&mut self) -> IndexResult<()> {
        let (_, attached) = self.parts_mut()?;
        let result = attached
            .tree
            .flush()
            .and_then(|()| attached.file.flush())
            .map_err(IndexError::from);
        attached.guard(result)?;
        debug!(index = %attached.tree.path().display(), "INDEX_FLUSHED");
        Ok(())
    }

    /// Removes every element. The flat file is left as it is.
    pub fn clear(&mut self) -> IndexResult<()> {
        let (_, attached) = self.writable_parts()?;
        let result = attached.tree.clear().map_err(IndexError::from);
        attached.guard(result)
    }

    fn attached(&self) -> IndexResult<&Attached> {
        match &self.state {
            State::Open(attached) if !attached.is_failed() => Ok(attached),
            _ => Err(IndexError::NotOpen),
        }
    }

    fn parts_mut(&mut self) -> IndexResult<(&C, &mut Attached)> {
        if matches!(&self.state, State::Open(a) if a.is_failed()) {
            if let State::Open(attached) = std::mem::replace(&mut self.state, State::Closed) {
                attached.retire();
            }
        }
        match &mut self.state {
            State::Open(attached) => Ok((&self.comp, attached)),
            _ => Err(IndexError::NotOpen),
        }
    }

    fn writable_parts(&mut self) -> IndexResult<(&C, &mut Attached)> {
        let (comp, attached) = self.parts_mut()?;
        if attached.read_only {
            return Err(IndexError::ReadOnly);
        }
        Ok((comp, attached))
    }

    fn indirect<'a>(&'a self, attached: &'a Attached) -> IndirectComparator<'a, V::Key, C> {
        IndirectComparator::new(&self.comp, &attached.file)
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn len(&self) -> IndexResult<usize> {
        Ok(self.attached()?.tree.len())
    }

    pub fn is_empty(&self) -> IndexResult<bool> {
        Ok(self.attached()?.tree.is_empty())
    }

    pub fn key_comp(&self) -> &C {
        &self.comp
    }

    pub fn index_path(&self) -> IndexResult<&Path> {
        Ok(self.attached()?.tree.path())
    }

    pub fn file_path(&self) -> IndexResult<&Path> {
        Ok(self.attached()?.file.path())
    }

    pub fn file_size(&self) -> IndexResult<u64> {
        Ok(self.attached()?.file.size())
    }

    pub fn file_reserve(&self) -> IndexResult<u64> {
        Ok(self.attached()?.file.reserve())
    }

    pub fn mode(&self) -> IndexResult<OpenMode> {
        Ok(self.attached()?.tree.mode())
    }

    pub fn is_read_only(&self) -> IndexResult<bool> {
        Ok(self.attached()?.read_only)
    }

    pub fn signature(&self) -> IndexResult<u64> {
        Ok(self.attached()?.tree.signature())
    }

    /// Returns the shared flat-file handle, for opening sibling indexes.
    pub fn file(&self) -> IndexResult<&SharedFile> {
        Ok(&self.attached()?.file)
    }

    pub fn header(&self) -> IndexResult<TreeHeader> {
        Ok(self.attached()?.tree.header())
    }

    pub fn stats(&self) -> IndexResult<TreeStats> {
        Ok(self.attached()?.tree.stats())
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    pub fn begin(&self) -> IndexResult<Cursor<'_, V>> {
        let attached = self.attached()?;
        Ok(Cursor::new(attached, attached.tree.begin()))
    }

    pub fn end(&self) -> IndexResult<Cursor<'_, V>> {
        let attached = self.attached()?;
        Ok(Cursor::new(attached, attached.tree.end()))
    }

    /// Returns a cursor at `slot`, as returned by a mutation.
    ///
    /// # Panics
    ///
    /// Panics if `slot` lies past the end slot.
    pub fn cursor_at(&self, slot: Slot) -> IndexResult<Cursor<'_, V>> {
        let attached = self.attached()?;
        assert!(
            slot <= attached.tree.end(),
            "slot {} is past the end of an index of {} elements",
            slot.index(),
            attached.tree.len()
        );
        Ok(Cursor::new(attached, slot))
    }

    /// Iterates every element in comparator order; `.rev()` walks backwards.
    pub fn iter(&self) -> IndexResult<Iter<'_, V>> {
        let attached = self.attached()?;
        Ok(Iter::new(attached, attached.tree.begin(), attached.tree.end()))
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    fn bound_slot<Q: ?Sized>(&self, attached: &Attached, key: &Q, upper: bool) -> IndexResult<Slot>
    where
        C: KeyCompare<KeyOf<V>, Q>,
    {
        let cmp = self.indirect(attached);
        let probe = |stored| cmp.position_key(stored, key);
        let result = if upper {
            attached.tree.upper_bound(probe)
        } else {
            attached.tree.lower_bound(probe)
        };
        attached.guard(result)
    }

    /// First element not ordered before `key`.
    pub fn lower_bound<Q: ?Sized>(&self, key: &Q) -> IndexResult<Cursor<'_, V>>
    where
        C: KeyCompare<KeyOf<V>, Q>,
    {
        let attached = self.attached()?;
        let slot = self.bound_slot(attached, key, false)?;
        Ok(Cursor::new(attached, slot))
    }

    /// First element ordered after `key`.
    pub fn upper_bound<Q: ?Sized>(&self, key: &Q) -> IndexResult<Cursor<'_, V>>
    where
        C: KeyCompare<KeyOf<V>, Q>,
    {
        let attached = self.attached()?;
        let slot = self.bound_slot(attached, key, true)?;
        Ok(Cursor::new(attached, slot))
    }

    /// First element equal to `key`, or the end cursor.
    pub fn find<Q: ?Sized>(&self, key: &Q) -> IndexResult<Cursor<'_, V>>
    where
        C: KeyCompare<KeyOf<V>, Q>,
    {
        let attached = self.attached()?;
        let cmp = self.indirect(attached);
        let found = attached.guard(attached.tree.find(|stored| cmp.position_key(stored, key)))?;
        Ok(Cursor::new(attached, found.unwrap_or(attached.tree.end())))
    }

    /// `(lower_bound(key), upper_bound(key))`
    pub fn equal_range<Q: ?Sized>(&self, key: &Q) -> IndexResult<(Cursor<'_, V>, Cursor<'_, V>)>
    where
        C: KeyCompare<KeyOf<V>, Q>,
    {
        let attached = self.attached()?;
        let lower = self.bound_slot(attached, key, false)?;
        let upper = self.bound_slot(attached, key, true)?;
        Ok((Cursor::new(attached, lower), Cursor::new(attached, upper)))
    }

    /// Number of elements equal to `key`.
    pub fn count<Q: ?Sized>(&self, key: &Q) -> IndexResult<usize>
    where
        C: KeyCompare<KeyOf<V>, Q>,
    {
        let attached = self.attached()?;
        let lower = self.bound_slot(attached, key, false)?;
        let upper = self.bound_slot(attached, key, true)?;
        Ok(upper.index() - lower.index())
    }

    pub fn contains<Q: ?Sized>(&self, key: &Q) -> IndexResult<bool>
    where
        C: KeyCompare<KeyOf<V>, Q>,
    {
        Ok(!self.find(key)?.is_end())
    }

    /// Iterates the elements whose keys fall within the given bounds.
    pub fn range<Q: ?Sized>(&self, lower: Bound<&Q>, upper: Bound<&Q>) -> IndexResult<Iter<'_, V>>
    where
        C: KeyCompare<KeyOf<V>, Q>,
    {
        let attached = self.attached()?;
        let start = match lower {
            Bound::Included(key) => self.bound_slot(attached, key, false)?,
            Bound::Excluded(key) => self.bound_slot(attached, key, true)?,
            Bound::Unbounded => attached.tree.begin(),
        };
        let stop = match upper {
            Bound::Included(key) => self.bound_slot(attached, key, true)?,
            Bound::Excluded(key) => self.bound_slot(attached, key, false)?,
            Bound::Unbounded => attached.tree.end(),
        };
        Ok(Iter::new(attached, start, stop.max(start)))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Removes the element at `slot` and returns the slot of the next one.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is the end slot.
    pub fn erase(&mut self, slot: Slot) -> IndexResult<Slot> {
        let (_, attached) = self.writable_parts()?;
        let result = attached.tree.erase(slot).map_err(IndexError::from);
        attached.guard(result)
    }

    /// Removes the elements in `[first, last)` and returns the slot that
    /// follows them.
    pub fn erase_range(&mut self, first: Slot, last: Slot) -> IndexResult<Slot> {
        let (_, attached) = self.writable_parts()?;
        let result = attached.tree.erase_range(first, last).map_err(IndexError::from);
        attached.guard(result)
    }

    /// Removes every element equal to `key` and returns how many there were.
    pub fn erase_key<Q: ?Sized>(&mut self, key: &Q) -> IndexResult<usize>
    where
        C: KeyCompare<KeyOf<V>, Q>,
    {
        let (comp, attached) = self.writable_parts()?;
        let result = {
            let Attached { file, tree, .. } = &mut *attached;
            let cmp = IndirectComparator::<V::Key, C>::new(comp, file);
            tree.lower_bound(|p| cmp.position_key(p, key))
                .and_then(|lower| {
                    let upper = tree.upper_bound(|p| cmp.position_key(p, key))?;
                    Ok((lower, upper))
                })
                .and_then(|(lower, upper)| {
                    tree.erase_range(lower, upper)?;
                    Ok(upper.index() - lower.index())
                })
        };
        attached.guard(result)
    }

    /// Indexes a record already present in the flat file, such as one
    /// written by `push_back` or by an index sharing the file.
    ///
    /// Returns the element's slot and whether it was inserted; a unique
    /// variant holding an equal key reports the existing element instead.
    ///
    /// # Errors
    ///
    /// `Storage(PositionOutOfRange)` if `position` does not lie in the flat
    /// file's data region. The index stays open.
    pub fn insert_position(&mut self, position: Position) -> IndexResult<(Slot, bool)>
    where
        C: KeyCompare<KeyOf<V>>,
    {
        let (comp, attached) = self.writable_parts()?;
        let size = attached.file.size();
        if position < HEADER_LEN || position >= size {
            return Err(StorageError::PositionOutOfRange { position, size }.into());
        }
        let result = {
            let Attached { file, tree, .. } = &mut *attached;
            let file: &FlatFile = file;
            IndirectComparator::<V::Key, C>::new(comp, file)
                .decode_key(position)
                .and_then(|key| {
                    place::<V, C>(comp, file, tree, position, <V::Key as Codec>::as_borrowed(&key))
                })
        };
        attached.guard(result)
    }

    /// Appends a record of `len` bytes without indexing it.
    pub(crate) fn push_record<F>(&mut self, len: usize, encode: F) -> IndexResult<Position>
    where
        F: FnOnce(&mut &mut [u8]),
    {
        let (_, attached) = self.writable_parts()?;
        append(attached, len, encode)
    }

    /// Appends a record of `len` bytes whose key is `key`, then indexes it.
    pub(crate) fn insert_record<F>(
        &mut self,
        key: &KeyOf<V>,
        len: usize,
        encode: F,
    ) -> IndexResult<(Slot, bool)>
    where
        C: KeyCompare<KeyOf<V>>,
        F: FnOnce(&mut &mut [u8]),
    {
        let (comp, attached) = self.writable_parts()?;
        let position = append(attached, len, encode)?;
        let result = place::<V, C>(comp, &attached.file, &mut attached.tree, position, key);
        attached.guard(result)
    }
}

/// Writes one record through `encode`, checking it fills exactly `len` bytes.
fn append<F>(attached: &Attached, len: usize, encode: F) -> IndexResult<Position>
where
    F: FnOnce(&mut &mut [u8]),
{
    let result = attached.file.append_with(len, |region| {
        let mut buf: &mut [u8] = region;
        encode(&mut buf);
        if !buf.is_empty() {
            return Err(IndexError::EncodingSize {
                declared: len,
                written: len - buf.len(),
            });
        }
        Ok(())
    });
    attached.guard(result)
}

/// Inserts `position`, whose record holds `key`, honoring the variant's
/// uniqueness.
fn place<V: Variant, C>(
    comp: &C,
    file: &FlatFile,
    tree: &mut PositionTree,
    position: Position,
    key: &KeyOf<V>,
) -> IndexResult<(Slot, bool)>
where
    C: KeyCompare<KeyOf<V>>,
{
    let cmp = IndirectComparator::<V::Key, C>::new(comp, file);
    let probe = |stored: Position| -> IndexResult<Ordering> { cmp.position_key(stored, key) };
    if V::UNIQUE {
        tree.insert_unique(position, probe)
    } else {
        tree.insert_non_unique(position, probe).map(|slot| (slot, true))
    }
}

impl<V: Variant, C> Drop for IndexBase<V, C> {
    fn drop(&mut self) {
        if !matches!(self.state, State::Open(_)) {
            return;
        }
        if let Err(e) = self.close() {
            warn!(error = %e, "INDEX_CLOSE_ON_DROP_FAILED");
        }
    }
}

impl<V: Variant, C: fmt::Debug> fmt::Debug for IndexBase<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Unopened => "unopened",
            State::Open(a) if a.is_failed() => "failed",
            State::Open(_) => "open",
            State::Closed => "closed",
        };
        f.debug_struct("IndexBase")
            .field("kind", &V::KIND)
            .field("comp", &self.comp)
            .field("state", &state)
            .finish()
    }
}
