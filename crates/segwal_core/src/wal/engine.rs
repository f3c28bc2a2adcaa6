//! WAL engine: active segment, sealed segments, batching and sync policy.

use crate::chunk;
use crate::config::WalOptions;
use crate::dir::SegmentDir;
use crate::error::{CoreError, CoreResult};
use crate::position::{ChunkPosition, SegmentId};
use crate::segment::{Segment, SegmentReader};
use crate::wal::WalReader;
use parking_lot::{Mutex, RwLock};
use segwal_storage::FileBackend;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// State touched only by writers. Its mutex is held for the whole of every
/// write operation, which serializes writes, batch commits and rotation.
#[derive(Debug, Default)]
struct WriterState {
    pending: Vec<Vec<u8>>,
    /// Sum of `max_encoded_len` over `pending`.
    pending_size: u64,
    bytes_since_sync: u64,
}

/// The open segments. Write-locked only for the instant of a rotation.
struct SegmentTable {
    active: Arc<Segment>,
    sealed: BTreeMap<SegmentId, Arc<Segment>>,
}

impl SegmentTable {
    fn get(&self, id: SegmentId) -> Option<Arc<Segment>> {
        if self.active.id() == id {
            return Some(Arc::clone(&self.active));
        }
        self.sealed.get(&id).cloned()
    }

    /// All segments with id `<= max`, ascending.
    fn up_to(&self, max: SegmentId) -> Vec<Arc<Segment>> {
        let mut segments: Vec<Arc<Segment>> =
            self.sealed.range(..=max).map(|(_, s)| Arc::clone(s)).collect();
        if self.active.id() <= max {
            segments.push(Arc::clone(&self.active));
        }
        segments
    }
}

/// An append-only, segmented write-ahead log.
///
/// `Wal` is `Send + Sync`. Writes are serialized; reads of sealed segments
/// run concurrently with writes, reads of the active segment wait for an
/// in-flight append to finish.
///
/// # Example
///
/// ```no_run
/// use segwal_core::{Wal, WalOptions};
///
/// let wal = Wal::open(WalOptions::new().dir_path("/tmp/my-wal")).unwrap();
/// let position = wal.write(b"Hello World").unwrap();
/// assert_eq!(wal.read(&position).unwrap(), b"Hello World");
/// wal.close().unwrap();
/// ```
pub struct Wal {
    options: WalOptions,
    dir: SegmentDir,
    writer: Mutex<WriterState>,
    /// `None` once closed.
    segments: RwLock<Option<SegmentTable>>,
}

impl Wal {
    /// Opens the WAL in `options.dir_path`.
    ///
    /// Existing segment files are reopened: the highest id becomes the
    /// active segment, the others are sealed. An incomplete record at the end
    /// of the active segment, left by a crash mid-append, is truncated away
    /// and appends resume after the last complete record. An empty directory
    /// starts with segment 0.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOptions`] for bad options, or an I/O
    /// error.
    pub fn open(options: WalOptions) -> CoreResult<Self> {
        options.validate()?;
        let dir = SegmentDir::open(&options.dir_path, &options.segment_file_ext)?;
        let ids = dir.segment_ids()?;

        let mut sealed = BTreeMap::new();
        let active = match ids.split_last() {
            Some((&active_id, older)) => {
                for &id in older {
                    sealed.insert(id, Arc::new(open_segment(&dir, id, options.segment_size)?));
                }
                let segment = open_segment(&dir, active_id, options.segment_size)?;
                if segment.repair_tail()? > 0 {
                    segment.sync()?;
                }
                segment
            }
            None => {
                let segment = open_segment(&dir, 0, options.segment_size)?;
                dir.sync()?;
                segment
            }
        };

        info!(
            dir = %dir.path().display(),
            segments = sealed.len() + 1,
            active_segment = active.id(),
            "opened WAL"
        );

        Ok(Self {
            options,
            dir,
            writer: Mutex::new(WriterState::default()),
            segments: RwLock::new(Some(SegmentTable {
                active: Arc::new(active),
                sealed,
            })),
        })
    }

    /// Returns the options the WAL was opened with.
    #[must_use]
    pub fn options(&self) -> &WalOptions {
        &self.options
    }

    /// Writes one record and returns its position.
    ///
    /// Rotates to a new segment first if the active one cannot hold the
    /// record, then applies the sync policy.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecordTooLarge`] if the record cannot fit even in
    /// an empty segment, [`CoreError::WalClosed`], or an I/O error. After an
    /// I/O error the durability of this write is unknown.
    pub fn write(&self, data: &[u8]) -> CoreResult<ChunkPosition> {
        let limit = self.options.segment_size;
        if chunk::max_encoded_len(data.len()) > limit {
            return Err(CoreError::RecordTooLarge {
                size: data.len() as u64,
                limit,
            });
        }

        let mut writer = self.writer.lock();
        let mut active = self.active_segment()?;
        let position = match active.write(data) {
            Err(CoreError::SegmentFull { .. }) => {
                active = self.rotate(&mut writer)?;
                active.write(data)?
            }
            result => result?,
        };

        writer.bytes_since_sync += u64::from(position.chunk_size);
        self.apply_sync_policy(&active, &mut writer)?;
        Ok(position)
    }

    /// Buffers a record for the next [`write_all`](Self::write_all).
    ///
    /// Nothing touches the disk and no position exists until the commit.
    pub fn pending_writes(&self, data: impl Into<Vec<u8>>) {
        let data = data.into();
        let mut writer = self.writer.lock();
        writer.pending_size += chunk::max_encoded_len(data.len());
        writer.pending.push(data);
    }

    /// Returns the number of buffered records.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.writer.lock().pending.len()
    }

    /// Discards the buffered records.
    pub fn clear_pending_writes(&self) {
        let mut writer = self.writer.lock();
        writer.pending.clear();
        writer.pending_size = 0;
    }

    /// Commits the buffered records and returns their positions in buffer
    /// order.
    ///
    /// The batch is placed as a whole: if it does not fit in the active
    /// segment the engine rotates first, so it is never split across
    /// segments. It is appended with one write and the sync policy is applied
    /// once. The buffer is emptied whether or not the commit succeeds. An
    /// empty buffer returns an empty list without I/O.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BatchTooLarge`] if the batch cannot fit even in an
    /// empty segment, [`CoreError::WalClosed`], or an I/O error.
    pub fn write_all(&self) -> CoreResult<Vec<ChunkPosition>> {
        let mut writer = self.writer.lock();
        let pending = std::mem::take(&mut writer.pending);
        let pending_size = std::mem::take(&mut writer.pending_size);

        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self.options.segment_size;
        if pending_size > limit {
            return Err(CoreError::BatchTooLarge {
                size: pending_size,
                limit,
            });
        }

        let mut active = self.active_segment()?;
        let positions = match active.write_all(&pending) {
            Err(CoreError::SegmentFull { .. }) => {
                active = self.rotate(&mut writer)?;
                active.write_all(&pending)?
            }
            result => result?,
        };

        writer.bytes_since_sync += positions
            .iter()
            .map(|p| u64::from(p.chunk_size))
            .sum::<u64>();
        self.apply_sync_policy(&active, &mut writer)?;

        debug!(
            records = positions.len(),
            segment_id = active.id(),
            "committed batch"
        );
        Ok(positions)
    }

    /// Reads the record at `position`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::SegmentNotFound`] if no open segment has the id
    /// - [`CoreError::PositionOutOfRange`], [`CoreError::CorruptChunk`] or
    ///   [`CoreError::TruncatedChunk`] from the segment
    /// - [`CoreError::WalClosed`]
    pub fn read(&self, position: &ChunkPosition) -> CoreResult<Vec<u8>> {
        let segment = self.segment(position.segment_id)?;
        segment.read(position.block_number, position.chunk_offset)
    }

    /// Returns a reader over every record in every segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalClosed`].
    pub fn new_reader(&self) -> CoreResult<WalReader> {
        self.new_reader_with_max(SegmentId::MAX)
    }

    /// Returns a reader over the segments with id `<= max_segment_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalClosed`].
    pub fn new_reader_with_max(&self, max_segment_id: SegmentId) -> CoreResult<WalReader> {
        let segments = self.with_table(|table| table.up_to(max_segment_id))?;
        Ok(WalReader::new(
            segments.iter().map(Segment::new_reader).collect(),
        ))
    }

    /// Returns a reader whose first record is the one at `start`, followed
    /// by the rest of the log.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SegmentNotFound`] if `start` names no open
    /// segment, or [`CoreError::WalClosed`].
    pub fn new_reader_with_start(&self, start: &ChunkPosition) -> CoreResult<WalReader> {
        let segments = self.with_table(|table| {
            table.get(start.segment_id).map(|_| table.up_to(SegmentId::MAX))
        })?;
        let segments = segments.ok_or(CoreError::SegmentNotFound {
            segment_id: start.segment_id,
        })?;

        let readers = segments
            .into_iter()
            .filter(|s| s.id() >= start.segment_id)
            .map(|s| {
                if s.id() == start.segment_id {
                    SegmentReader::starting_at(s, start.block_number, start.chunk_offset)
                } else {
                    SegmentReader::new(s)
                }
            })
            .collect();
        Ok(WalReader::new(readers))
    }

    /// Fsyncs the active segment and resets the unsynced byte counter.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalClosed`] or an I/O error, after which the
    /// durability of every unsynced write is unknown.
    pub fn sync(&self) -> CoreResult<()> {
        let mut writer = self.writer.lock();
        self.active_segment()?.sync()?;
        writer.bytes_since_sync = 0;
        Ok(())
    }

    /// Seals the active segment and starts a new one, even if it has room.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalClosed`] or an I/O error.
    pub fn open_new_active_segment(&self) -> CoreResult<()> {
        let mut writer = self.writer.lock();
        self.rotate(&mut writer)?;
        Ok(())
    }

    /// Returns the id of the active segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalClosed`].
    pub fn active_segment_id(&self) -> CoreResult<SegmentId> {
        self.with_table(|table| table.active.id())
    }

    /// Returns the ids of all open segments, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalClosed`].
    pub fn segment_ids(&self) -> CoreResult<Vec<SegmentId>> {
        self.with_table(|table| {
            table
                .sealed
                .keys()
                .copied()
                .chain(std::iter::once(table.active.id()))
                .collect()
        })
    }

    /// Whether the log holds no records: a single segment with nothing
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WalClosed`].
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.with_table(|table| table.sealed.is_empty() && table.active.is_empty())
    }

    /// Syncs the active segment and releases every segment.
    ///
    /// Pending, uncommitted records are discarded. Later calls on this `Wal`
    /// fail with [`CoreError::WalClosed`]; closing twice is a no-op. Readers
    /// created earlier keep their segments open until dropped.
    ///
    /// # Errors
    ///
    /// Returns the error of the final sync.
    pub fn close(&self) -> CoreResult<()> {
        let mut writer = self.writer.lock();
        let Some(table) = self.segments.write().take() else {
            return Ok(());
        };

        writer.pending.clear();
        writer.pending_size = 0;
        table.active.sync()?;
        writer.bytes_since_sync = 0;

        info!(
            dir = %self.dir.path().display(),
            active_segment = table.active.id(),
            "closed WAL"
        );
        Ok(())
    }

    fn with_table<R>(&self, f: impl FnOnce(&SegmentTable) -> R) -> CoreResult<R> {
        let guard = self.segments.read();
        let table = guard.as_ref().ok_or(CoreError::WalClosed)?;
        Ok(f(table))
    }

    fn active_segment(&self) -> CoreResult<Arc<Segment>> {
        self.with_table(|table| Arc::clone(&table.active))
    }

    fn segment(&self, id: SegmentId) -> CoreResult<Arc<Segment>> {
        self.with_table(|table| table.get(id))?
            .ok_or(CoreError::SegmentNotFound { segment_id: id })
    }

    /// Syncs and seals the active segment and installs `id + 1` as active.
    ///
    /// Callers hold the writer lock.
    fn rotate(&self, writer: &mut WriterState) -> CoreResult<Arc<Segment>> {
        let previous = self.active_segment()?;
        previous.sync()?;
        writer.bytes_since_sync = 0;

        let next_id = previous.id().checked_add(1).ok_or_else(|| {
            CoreError::invalid_format(format!("segment id space exhausted after {}", previous.id()))
        })?;
        let segment = Arc::new(open_segment(&self.dir, next_id, self.options.segment_size)?);
        self.dir.sync()?;

        let mut guard = self.segments.write();
        let table = guard.as_mut().ok_or(CoreError::WalClosed)?;
        let sealed = std::mem::replace(&mut table.active, Arc::clone(&segment));
        table.sealed.insert(sealed.id(), sealed);
        drop(guard);

        debug!(
            sealed_segment = previous.id(),
            active_segment = next_id,
            "rotated active segment"
        );
        Ok(segment)
    }

    fn apply_sync_policy(&self, active: &Segment, writer: &mut WriterState) -> CoreResult<()> {
        let threshold = u64::from(self.options.bytes_per_sync);
        let due = threshold > 0 && writer.bytes_since_sync >= threshold;
        if self.options.sync || due {
            active.sync()?;
            writer.bytes_since_sync = 0;
        }
        Ok(())
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to sync WAL on drop");
        }
    }
}

impl std::fmt::Debug for Wal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wal")
            .field("dir", &self.dir.path())
            .field("segment_size", &self.options.segment_size)
            .field("active_segment_id", &self.active_segment_id().ok())
            .finish_non_exhaustive()
    }
}

fn open_segment(dir: &SegmentDir, id: SegmentId, capacity: u64) -> CoreResult<Segment> {
    let backend = FileBackend::open(&dir.segment_path(id))?;
    let segment = Segment::open(id, Box::new(backend), capacity)?;
    debug!(segment_id = id, size = segment.size(), "opened segment");
    Ok(segment)
}
