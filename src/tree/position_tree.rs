//! Ordered container of flat-file positions
//!
//! The tree never looks at record bytes. Every search takes a probe closure
//! that orders a stored position against the caller's target, so one
//! container serves any key type and comparator.
//!
//! # Persistence
//!
//! Positions are held in memory in probe order and written out as a whole on
//! `flush`. The write is atomic:
//! 1. Write header and body to a temp file
//! 2. fsync the temp file
//! 3. Rename over the index file

use std::cmp::Ordering;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};
use tracing::debug;

use super::header::{TreeHeader, VariantKind, CHECKSUM_OFFSET, HEADER_SIZE};
use super::stats::TreeStats;
use crate::storage::{checksum_parts, verify_parts, OpenMode, Position, StorageError, StorageResult};

/// Index of an element within a [`PositionTree`], in tree order.
///
/// `Slot(len)` is the end slot. A slot is invalidated by any mutation of the
/// tree it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(pub(crate) usize);

impl Slot {
    /// Returns the zero-based rank of the element in tree order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Creation parameters used when a tree file does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    pub signature: u64,
    pub kind: VariantKind,
    pub node_size: u32,
}

/// Position container backed by one index file.
#[derive(Debug)]
pub struct PositionTree {
    path: PathBuf,
    temp_path: PathBuf,
    mode: OpenMode,
    signature: u64,
    kind: VariantKind,
    node_size: u32,
    positions: Vec<Position>,
    dirty: bool,
}

impl PositionTree {
    /// Opens the tree file at `path`.
    ///
    /// An existing file keeps its persisted signature, kind and node size;
    /// `options` only applies when the file is created. Callers compare
    /// [`signature`](Self::signature) and [`kind`](Self::kind) themselves.
    pub fn open(
        path: impl AsRef<Path>,
        mode: OpenMode,
        options: TreeOptions,
    ) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let temp_path = temp_path_for(&path);

        let create = match mode {
            OpenMode::ReadOnly => false,
            OpenMode::ReadWrite => !path.exists(),
            OpenMode::Truncate => true,
        };

        let tree = if create {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    StorageError::io(
                        format!("failed to create directory {}", parent.display()),
                        e,
                    )
                })?;
            }
            let mut tree = Self {
                path,
                temp_path,
                mode,
                signature: options.signature,
                kind: options.kind,
                node_size: options.node_size,
                positions: Vec::new(),
                dirty: true,
            };
            tree.flush()?;
            tree
        } else {
            let (header, positions) = load(&path)?;
            Self {
                path,
                temp_path,
                mode,
                signature: header.signature,
                kind: header.kind,
                node_size: header.stats.node_size,
                positions,
                dirty: false,
            }
        };

        debug!(
            path = %tree.path.display(),
            ?mode,
            created = create,
            kind = %tree.kind,
            count = tree.positions.len(),
            "POSITION_TREE_OPENED"
        );
        Ok(tree)
    }

    /// Reads and verifies the header of the tree file at `path` without
    /// keeping the tree.
    pub fn read_header(path: impl AsRef<Path>) -> StorageResult<TreeHeader> {
        load(path.as_ref()).map(|(header, _)| header)
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.mode.is_read_only() {
            return Err(StorageError::ReadOnly {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    /// First slot at or after the first `is_before` transition.
    fn partition<E>(
        &self,
        mut is_before: impl FnMut(Position) -> Result<bool, E>,
    ) -> Result<Slot, E> {
        let (mut lo, mut hi) = (0, self.positions.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if is_before(self.positions[mid])? {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(Slot(lo))
    }

    /// First slot whose position does not order before the target.
    ///
    /// `probe(stored)` returns how `stored` orders against the target.
    pub fn lower_bound<E>(
        &self,
        mut probe: impl FnMut(Position) -> Result<Ordering, E>,
    ) -> Result<Slot, E> {
        self.partition(|p| Ok(probe(p)? == Ordering::Less))
    }

    /// First slot whose position orders after the target.
    pub fn upper_bound<E>(
        &self,
        mut probe: impl FnMut(Position) -> Result<Ordering, E>,
    ) -> Result<Slot, E> {
        self.partition(|p| Ok(probe(p)? != Ordering::Greater))
    }

    /// First slot whose position orders equal to the target.
    pub fn find<E>(
        &self,
        mut probe: impl FnMut(Position) -> Result<Ordering, E>,
    ) -> Result<Option<Slot>, E> {
        let slot = self.lower_bound(&mut probe)?;
        match self.get(slot) {
            Some(pos) if probe(pos)? == Ordering::Equal => Ok(Some(slot)),
            _ => Ok(None),
        }
    }

    /// Inserts `position` unless an equal one exists.
    ///
    /// Returns the slot of the new or existing element and whether it was
    /// inserted.
    pub fn insert_unique<E>(
        &mut self,
        position: Position,
        mut probe: impl FnMut(Position) -> Result<Ordering, E>,
    ) -> Result<(Slot, bool), E>
    where
        E: From<StorageError>,
    {
        self.check_writable()?;
        let slot = self.lower_bound(&mut probe)?;
        if let Some(existing) = self.get(slot) {
            if probe(existing)? == Ordering::Equal {
                return Ok((slot, false));
            }
        }
        self.positions.insert(slot.0, position);
        self.dirty = true;
        Ok((slot, true))
    }

    /// Inserts `position` after every equal element.
    pub fn insert_non_unique<E>(
        &mut self,
        position: Position,
        probe: impl FnMut(Position) -> Result<Ordering, E>,
    ) -> Result<Slot, E>
    where
        E: From<StorageError>,
    {
        self.check_writable()?;
        let slot = self.upper_bound(probe)?;
        self.positions.insert(slot.0, position);
        self.dirty = true;
        Ok(slot)
    }

    /// Removes the element at `slot` and returns the slot of its successor.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is the end slot or beyond it.
    pub fn erase(&mut self, slot: Slot) -> StorageResult<Slot> {
        self.check_writable()?;
        assert!(
            slot.0 < self.positions.len(),
            "erase of slot {} in a tree of {} elements",
            slot.0,
            self.positions.len()
        );
        self.positions.remove(slot.0);
        self.dirty = true;
        Ok(slot)
    }

    /// Removes the elements in `[first, last)` and returns `first`.
    ///
    /// # Panics
    ///
    /// Panics if the range is reversed or extends past the end slot.
    pub fn erase_range(&mut self, first: Slot, last: Slot) -> StorageResult<Slot> {
        self.check_writable()?;
        assert!(
            first <= last && last.0 <= self.positions.len(),
            "erase of invalid slot range {}..{} in a tree of {} elements",
            first.0,
            last.0,
            self.positions.len()
        );
        if first != last {
            self.positions.drain(first.0..last.0);
            self.dirty = true;
        }
        Ok(first)
    }

    /// Removes every position.
    pub fn clear(&mut self) -> StorageResult<()> {
        self.check_writable()?;
        self.positions.clear();
        self.dirty = true;
        Ok(())
    }

    /// Returns the position at `slot`, or `None` for the end slot.
    pub fn get(&self, slot: Slot) -> Option<Position> {
        self.positions.get(slot.0).copied()
    }

    pub fn begin(&self) -> Slot {
        Slot(0)
    }

    pub fn end(&self) -> Slot {
        Slot(self.positions.len())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn signature(&self) -> u64 {
        self.signature
    }

    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    pub fn node_size(&self) -> u32 {
        self.node_size
    }

    /// Returns the header as it would be persisted now.
    pub fn header(&self) -> TreeHeader {
        TreeHeader::new(
            self.signature,
            self.kind,
            self.node_size,
            self.positions.len() as u64,
        )
    }

    pub fn stats(&self) -> TreeStats {
        self.header().stats
    }

    /// Persists pending changes. A read-only or clean tree is left untouched.
    pub fn flush(&mut self) -> StorageResult<()> {
        if !self.dirty || self.mode.is_read_only() {
            return Ok(());
        }
        self.write_atomic()?;
        self.dirty = false;
        debug!(
            path = %self.path.display(),
            count = self.positions.len(),
            "POSITION_TREE_FLUSHED"
        );
        Ok(())
    }

    fn write_atomic(&self) -> StorageResult<()> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE + self.positions.len() * 8);
        self.header().encode_unchecked(&mut bytes);
        let mut body = Vec::with_capacity(self.positions.len() * 8);
        for &pos in &self.positions {
            body.put_u64_le(pos);
        }
        let checksum = checksum_parts(&[&bytes[..CHECKSUM_OFFSET], &body[..]]);
        bytes.put_u32_le(checksum);
        bytes.put_bytes(0, HEADER_SIZE - CHECKSUM_OFFSET - 4);
        bytes.extend_from_slice(&body);

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.temp_path)
            .map_err(|e| {
                StorageError::io(
                    format!("failed to create temp index file {}", self.temp_path.display()),
                    e,
                )
            })?;
        file.write_all(&bytes).map_err(|e| {
            StorageError::io(
                format!("failed to write index file {}", self.temp_path.display()),
                e,
            )
        })?;
        file.sync_all().map_err(|e| {
            StorageError::io(
                format!("failed to fsync index file {}", self.temp_path.display()),
                e,
            )
        })?;
        fs::rename(&self.temp_path, &self.path).map_err(|e| {
            StorageError::io(
                format!("failed to commit index file {}", self.path.display()),
                e,
            )
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn load(path: &Path) -> StorageResult<(TreeHeader, Vec<Position>)> {
    let bytes = fs::read(path).map_err(|e| {
        StorageError::io(format!("failed to read index file {}", path.display()), e)
    })?;
    if bytes.len() < HEADER_SIZE {
        return Err(StorageError::corrupt(
            path,
            format!("file is {} bytes, shorter than its header", bytes.len()),
        ));
    }

    let header = TreeHeader::decode(path, &bytes[..CHECKSUM_OFFSET])?;
    let mut stored = &bytes[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4];
    let checksum = stored.get_u32_le();

    let body = &bytes[HEADER_SIZE..];
    let expected_len = header.stats.element_count.checked_mul(8);
    if expected_len != Some(body.len() as u64) {
        return Err(StorageError::corrupt(
            path,
            format!(
                "body is {} bytes for {} positions",
                body.len(),
                header.stats.element_count
            ),
        ));
    }
    if !verify_parts(&[&bytes[..CHECKSUM_OFFSET], body], checksum) {
        return Err(StorageError::corrupt(path, "index checksum mismatch"));
    }

    let mut cursor = body;
    let mut positions = Vec::with_capacity(body.len() / 8);
    while cursor.has_remaining() {
        positions.push(cursor.get_u64_le());
    }
    Ok((header, positions))
}
