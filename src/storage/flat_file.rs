//! Segmented, memory-mapped append-only flat file
//!
//! On-disk layout:
//!
//! ```text
//! +------------------+
//! | Magic            | (8 bytes: "FLATDEX1")
//! +------------------+
//! | Logical End      | (u64 LE: position of the next append)
//! +------------------+
//! | Record 0         |
//! | Record 1         |
//! | ...              |
//! +------------------+
//! | Zero padding     | (reserved room, or skipped at a segment boundary)
//! +------------------+
//! ```
//!
//! The file length is always a multiple of [`MAP_GRANULARITY`]. The file grows
//! by mapping a new segment after the last one, so bytes that were handed out
//! by [`FlatFile::read`] never move. A record is never split across segments;
//! if it does not fit in the room left in the last segment, the rest of that
//! segment becomes padding.
//!
//! Mutating the file through any other handle (another process, or a second
//! `FlatFile` over the same path) while it is mapped is not supported.

use std::fs::{self, File, OpenOptions as FsOpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use memmap2::{Mmap, MmapMut, MmapOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::errors::{StorageError, StorageResult};
use super::Position;

/// Size of the flat file header; the first record starts here.
pub const HEADER_LEN: u64 = 16;

/// Every mapping segment starts on, and spans a multiple of, this many bytes.
pub const MAP_GRANULARITY: u64 = 64 * 1024;

/// Room reserved per segment when the caller does not say otherwise.
pub const DEFAULT_FILE_RESERVE: u64 = 1024 * 1024;

const MAGIC: &[u8; 8] = b"FLATDEX1";
const END_OFFSET: usize = 8;

/// Reference-counted flat file handle, shared by every index built on it.
pub type SharedFile = Arc<FlatFile>;

/// How index and flat files are opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Open existing files; every mutation fails
    #[default]
    ReadOnly,
    /// Open existing files, creating any that are missing
    ReadWrite,
    /// Create empty files, discarding existing contents
    Truncate,
}

impl OpenMode {
    /// Returns whether mutations are rejected in this mode
    pub fn is_read_only(self) -> bool {
        matches!(self, OpenMode::ReadOnly)
    }
}

#[derive(Debug)]
enum Mapping {
    ReadOnly(Mmap),
    Writable(MmapMut),
}

impl Mapping {
    fn as_ptr(&self) -> *const u8 {
        match self {
            Mapping::ReadOnly(map) => map.as_ptr(),
            Mapping::Writable(map) => map.as_ptr(),
        }
    }

    fn as_mut_ptr(&mut self) -> Option<*mut u8> {
        match self {
            Mapping::ReadOnly(_) => None,
            Mapping::Writable(map) => Some(map.as_mut_ptr()),
        }
    }

    fn flush(&self) -> std::io::Result<()> {
        match self {
            Mapping::ReadOnly(_) => Ok(()),
            Mapping::Writable(map) => map.flush(),
        }
    }
}

#[derive(Debug)]
struct Segment {
    base: u64,
    len: u64,
    map: Mapping,
}

impl Segment {
    fn end(&self) -> u64 {
        self.base + self.len
    }
}

#[derive(Debug)]
struct MapState {
    file: File,
    /// Contiguous, ordered by `base`, never empty.
    segments: Vec<Segment>,
    /// Logical end of the record region.
    end: u64,
}

impl MapState {
    fn capacity(&self) -> u64 {
        self.segments.last().map_or(0, Segment::end)
    }

    fn segment_for(&self, position: Position) -> Option<&Segment> {
        let idx = self.segments.partition_point(|s| s.base <= position);
        idx.checked_sub(1).map(|i| &self.segments[i])
    }
}

/// Append-only record store backed by a memory-mapped file.
///
/// `append` and `read` both take `&self`: the file is designed to be shared
/// through [`SharedFile`]. Slices returned by `read` borrow the mapping and
/// remain valid for as long as the `FlatFile` itself, across later appends.
#[derive(Debug)]
pub struct FlatFile {
    path: PathBuf,
    mode: OpenMode,
    reserve: u64,
    state: Mutex<MapState>,
}

impl FlatFile {
    /// Opens or creates the flat file at `path`.
    ///
    /// `reserve` is the size of each mapping segment, rounded up to
    /// [`MAP_GRANULARITY`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the file cannot be opened, sized or mapped,
    /// and `StorageError::Corrupt` if an existing file has a bad header.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, reserve: u64) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let reserve = round_up(reserve.max(MAP_GRANULARITY));

        let state = match mode {
            OpenMode::ReadOnly => Self::open_read_only(&path)?,
            OpenMode::ReadWrite => Self::open_writable(&path, false, reserve)?,
            OpenMode::Truncate => Self::open_writable(&path, true, reserve)?,
        };

        debug!(
            path = %path.display(),
            ?mode,
            end = state.end,
            capacity = state.capacity(),
            "FLAT_FILE_OPENED"
        );

        Ok(Self {
            path,
            mode,
            reserve,
            state: Mutex::new(state),
        })
    }

    /// Opens the flat file and wraps it in a shareable handle.
    pub fn open_shared(
        path: impl AsRef<Path>,
        mode: OpenMode,
        reserve: u64,
    ) -> StorageResult<SharedFile> {
        Self::open(path, mode, reserve).map(Arc::new)
    }

    fn open_read_only(path: &Path) -> StorageResult<MapState> {
        let file = File::open(path).map_err(|e| {
            StorageError::io(format!("failed to open flat file {}", path.display()), e)
        })?;
        let len = file_len(&file, path)?;
        if len < HEADER_LEN {
            return Err(StorageError::corrupt(
                path,
                format!("file is {} bytes, shorter than its header", len),
            ));
        }

        // SAFETY: the mapping is private to this handle and read-only; the
        // module contract forbids concurrent external modification.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| {
            StorageError::io(format!("failed to map flat file {}", path.display()), e)
        })?;
        let end = parse_header(path, &map[..HEADER_LEN as usize], len)?;

        Ok(MapState {
            file,
            segments: vec![Segment {
                base: 0,
                len,
                map: Mapping::ReadOnly(map),
            }],
            end,
        })
    }

    fn open_writable(path: &Path, truncate: bool, reserve: u64) -> StorageResult<MapState> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::io(
                    format!("failed to create directory {}", parent.display()),
                    e,
                )
            })?;
        }

        let file = FsOpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(path)
            .map_err(|e| {
                StorageError::io(format!("failed to open flat file {}", path.display()), e)
            })?;

        let len = file_len(&file, path)?;
        if len == 0 {
            set_len(&file, path, reserve)?;
            let mut map = map_segment(&file, path, 0, reserve)?;
            map[..END_OFFSET].copy_from_slice(MAGIC);
            map[END_OFFSET..HEADER_LEN as usize].copy_from_slice(&HEADER_LEN.to_le_bytes());
            return Ok(MapState {
                file,
                segments: vec![Segment {
                    base: 0,
                    len: reserve,
                    map: Mapping::Writable(map),
                }],
                end: HEADER_LEN,
            });
        }

        if len < HEADER_LEN {
            return Err(StorageError::corrupt(
                path,
                format!("file is {} bytes, shorter than its header", len),
            ));
        }

        let capacity = round_up(len);
        if capacity != len {
            set_len(&file, path, capacity)?;
        }
        let map = map_segment(&file, path, 0, capacity)?;
        let end = parse_header(path, &map[..HEADER_LEN as usize], capacity)?;

        Ok(MapState {
            file,
            segments: vec![Segment {
                base: 0,
                len: capacity,
                map: Mapping::Writable(map),
            }],
            end,
        })
    }

    fn lock(&self) -> MutexGuard<'_, MapState> {
        // Appends commit `end` only after the record is fully written, so the
        // state is consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `bytes` as one record and returns its position.
    pub fn append(&self, bytes: &[u8]) -> StorageResult<Position> {
        self.append_with(bytes.len(), |region| {
            region.copy_from_slice(bytes);
            Ok::<(), StorageError>(())
        })
    }

    /// Reserves `len` bytes at the end of the file and lets `fill` write them
    /// in place.
    ///
    /// The record is committed only if `fill` succeeds; on error the logical
    /// end is unchanged and the bytes are left as unreachable padding.
    pub fn append_with<E, F>(&self, len: usize, fill: F) -> Result<Position, E>
    where
        E: From<StorageError>,
        F: FnOnce(&mut [u8]) -> Result<(), E>,
    {
        if self.mode.is_read_only() {
            return Err(StorageError::ReadOnly {
                path: self.path.clone(),
            }
            .into());
        }

        let mut state = self.lock();
        let position = self.make_room(&mut state, len as u64)?;

        let (base, ptr) = match state.segments.last_mut() {
            Some(segment) => (segment.base, segment.map.as_mut_ptr()),
            None => return Err(StorageError::corrupt(&self.path, "no mapped segments").into()),
        };
        let ptr = ptr.ok_or_else(|| StorageError::ReadOnly {
            path: self.path.clone(),
        })?;

        // SAFETY: `make_room` guarantees [position, position + len) lies inside
        // the last segment and at or beyond the logical end. `read` never hands
        // out bytes past the logical end, and the lock excludes other writers,
        // so nothing else references this region.
        let region =
            unsafe { std::slice::from_raw_parts_mut(ptr.add((position - base) as usize), len) };
        fill(region)?;

        state.end = position + len as u64;
        Self::store_end(&mut state);
        Ok(position)
    }

    /// Returns a position where `len` bytes fit, mapping a new segment if the
    /// last one is too full.
    fn make_room(&self, state: &mut MapState, len: u64) -> StorageResult<Position> {
        let capacity = state.capacity();
        if state.end + len <= capacity {
            return Ok(state.end);
        }

        let base = capacity;
        let segment_len = round_up(self.reserve.max(len));
        set_len(&state.file, &self.path, base + segment_len)?;
        let map = map_segment(&state.file, &self.path, base, segment_len)?;
        state.segments.push(Segment {
            base,
            len: segment_len,
            map: Mapping::Writable(map),
        });

        debug!(
            path = %self.path.display(),
            base,
            len = segment_len,
            padding = base - state.end,
            "FLAT_FILE_SEGMENT_MAPPED"
        );
        Ok(base)
    }

    fn store_end(state: &mut MapState) {
        let end = state.end;
        if let Some(ptr) = state.segments.first_mut().and_then(|s| s.map.as_mut_ptr()) {
            // SAFETY: the header lies in the first segment, which is at least
            // HEADER_LEN bytes long, and `read` never returns header bytes.
            unsafe {
                ptr.add(END_OFFSET)
                    .cast::<[u8; 8]>()
                    .write_unaligned(end.to_le_bytes());
            }
        }
    }

    /// Returns the bytes from `position` to the end of its segment's data.
    ///
    /// The slice starts at the record and may run past it; codecs know where
    /// their record ends.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::PositionOutOfRange` for positions inside the
    /// header or beyond the logical end.
    pub fn read(&self, position: Position) -> StorageResult<&[u8]> {
        let state = self.lock();
        let out_of_range = || StorageError::PositionOutOfRange {
            position,
            size: state.end,
        };
        if position < HEADER_LEN || position > state.end {
            return Err(out_of_range());
        }
        let segment = state.segment_for(position).ok_or_else(out_of_range)?;

        let stop = segment.end().min(state.end);
        let offset = (position - segment.base) as usize;
        let len = stop.saturating_sub(position) as usize;

        // SAFETY: the segment stays mapped, at a fixed address, until `self` is
        // dropped, which the returned borrow prevents. The bytes lie below the
        // logical end, and records below it are never written again.
        Ok(unsafe { std::slice::from_raw_parts(segment.map.as_ptr().add(offset), len) })
    }

    /// Flushes every writable segment to disk.
    pub fn flush(&self) -> StorageResult<()> {
        let state = self.lock();
        for segment in &state.segments {
            segment.map.flush().map_err(|e| {
                StorageError::io(
                    format!("failed to flush flat file {}", self.path.display()),
                    e,
                )
            })?;
        }
        Ok(())
    }

    /// Returns the path of the flat file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the mode the file was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Returns whether appends are rejected.
    pub fn is_read_only(&self) -> bool {
        self.mode.is_read_only()
    }

    /// Returns the per-segment reservation in bytes.
    pub fn reserve(&self) -> u64 {
        self.reserve
    }

    /// Returns the logical size: header plus every record and padding so far.
    pub fn size(&self) -> u64 {
        self.lock().end
    }

    /// Returns the length of the file on disk.
    pub fn capacity(&self) -> u64 {
        self.lock().capacity()
    }

    /// Returns the number of mapped segments.
    pub fn segment_count(&self) -> usize {
        self.lock().segments.len()
    }
}

impl Drop for FlatFile {
    fn drop(&mut self) {
        if self.mode.is_read_only() {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(path = %self.path.display(), error = %e, "FLAT_FILE_FLUSH_ON_DROP_FAILED");
        }
    }
}

fn round_up(len: u64) -> u64 {
    len.div_ceil(MAP_GRANULARITY) * MAP_GRANULARITY
}

fn file_len(file: &File, path: &Path) -> StorageResult<u64> {
    file.metadata().map(|m| m.len()).map_err(|e| {
        StorageError::io(
            format!("failed to read metadata of {}", path.display()),
            e,
        )
    })
}

fn set_len(file: &File, path: &Path, len: u64) -> StorageResult<()> {
    file.set_len(len).map_err(|e| {
        StorageError::io(
            format!("failed to resize flat file {} to {} bytes", path.display(), len),
            e,
        )
    })
}

fn map_segment(file: &File, path: &Path, base: u64, len: u64) -> StorageResult<MmapMut> {
    let len = usize::try_from(len)
        .map_err(|_| StorageError::corrupt(path, format!("segment of {} bytes", len)))?;
    // SAFETY: `base` is aligned to MAP_GRANULARITY, the file has been sized to
    // cover the segment, and the module contract forbids external writers.
    unsafe { MmapOptions::new().offset(base).len(len).map_mut(file) }.map_err(|e| {
        StorageError::io(
            format!("failed to map flat file {} at {}", path.display(), base),
            e,
        )
    })
}

fn parse_header(path: &Path, header: &[u8], len: u64) -> StorageResult<u64> {
    if &header[..END_OFFSET] != MAGIC {
        return Err(StorageError::corrupt(path, "bad flat file magic"));
    }
    let mut end_bytes = [0u8; 8];
    end_bytes.copy_from_slice(&header[END_OFFSET..HEADER_LEN as usize]);
    let end = u64::from_le_bytes(end_bytes);
    if end < HEADER_LEN || end > len {
        return Err(StorageError::corrupt(
            path,
            format!("logical end {} outside file of {} bytes", end, len),
        ));
    }
    Ok(end)
}
