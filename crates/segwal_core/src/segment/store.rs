//! Segment write cursor, chunk encoding and record reads.

use crate::chunk::{self, ChunkType, Header, BLOCK_SIZE, HEADER_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::position::{ChunkPosition, SegmentId};
use crate::segment::SegmentReader;
use parking_lot::RwLock;
use segwal_storage::StorageBackend;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A block-relative location inside a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct BlockCursor {
    pub(crate) block_number: u32,
    pub(crate) block_offset: u32,
}

impl BlockCursor {
    pub(crate) const fn new(block_number: u32, block_offset: u32) -> Self {
        Self {
            block_number,
            block_offset,
        }
    }

    fn from_size(size: u64) -> Self {
        Self {
            block_number: (size / BLOCK_SIZE as u64) as u32,
            block_offset: (size % BLOCK_SIZE as u64) as u32,
        }
    }

    /// Byte offset from the start of the segment.
    pub(crate) fn size(self) -> u64 {
        u64::from(self.block_number) * BLOCK_SIZE as u64 + u64::from(self.block_offset)
    }

    fn next_block(self) -> Self {
        Self::new(self.block_number + 1, 0)
    }

    /// Moves past `len` bytes of the current block, wrapping to the next
    /// block when it is filled exactly.
    fn advance(&mut self, len: usize) {
        let offset = self.block_offset as usize + len;
        debug_assert!(offset <= BLOCK_SIZE);
        if offset == BLOCK_SIZE {
            *self = self.next_block();
        } else {
            self.block_offset = offset as u32;
        }
    }

    /// The cursor itself, or the next block if too little room is left for
    /// a chunk header.
    pub(crate) fn aligned(self) -> Self {
        if chunk::fits_in_block(self.block_offset as usize) {
            self
        } else {
            self.next_block()
        }
    }

    /// Free payload bytes after a header placed at this cursor.
    fn room(self) -> usize {
        BLOCK_SIZE - self.block_offset as usize - HEADER_SIZE
    }
}

/// What a read at a cursor found.
pub(crate) enum ReadOutcome {
    /// A complete record, and where the next one may start.
    Record {
        data: Vec<u8>,
        position: ChunkPosition,
        next: BlockCursor,
    },
    /// Padding up to the end of the block.
    Padding { next: BlockCursor },
    /// The cursor is at or past the written extent.
    End,
}

struct SegmentInner {
    backend: Box<dyn StorageBackend>,
    cursor: BlockCursor,
    /// The backend holds bytes past `cursor` from an append whose rollback
    /// failed. Cleared once they are truncated away.
    torn: bool,
}

impl SegmentInner {
    /// Truncates bytes left behind by a failed rollback.
    fn settle(&mut self, segment_id: SegmentId) -> CoreResult<()> {
        if self.torn {
            let size = self.cursor.size();
            self.backend.truncate(size)?;
            self.torn = false;
            debug!(segment_id, size, "rolled back torn append");
        }
        Ok(())
    }
}

/// One append-only segment file.
///
/// The backend and write cursor sit behind a lock: appends hold it
/// exclusively, reads share it, so a reader never sees half of a write.
pub struct Segment {
    id: SegmentId,
    capacity: u64,
    inner: RwLock<SegmentInner>,
}

impl Segment {
    /// Opens a segment over `backend`, resuming after any bytes it holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be read.
    pub fn open(id: SegmentId, backend: Box<dyn StorageBackend>, capacity: u64) -> CoreResult<Self> {
        let cursor = BlockCursor::from_size(backend.size()?);
        Ok(Self {
            id,
            capacity,
            inner: RwLock::new(SegmentInner {
                backend,
                cursor,
                torn: false,
            }),
        })
    }

    /// Returns the segment id.
    #[must_use]
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Returns the capacity limit in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the number of bytes written.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.read().cursor.size()
    }

    /// Returns the bytes left before the capacity limit.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.capacity.saturating_sub(self.size())
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Appends one record and returns its position.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SegmentFull`] if the record might not fit before
    /// the capacity limit; nothing is written in that case.
    pub fn write(&self, data: &[u8]) -> CoreResult<ChunkPosition> {
        let mut positions = self.write_all(&[data])?;
        Ok(positions.remove(0))
    }

    /// Appends records as one contiguous write and returns their positions
    /// in order.
    ///
    /// Either every record is appended or, on error, the segment is rolled
    /// back to its previous size. If that rollback fails too, the cursor is
    /// kept and every later write or sync first retries the truncation, so no
    /// write is acknowledged behind torn bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SegmentFull`] before any I/O if the records might
    /// not fit, [`CoreError::RecordTooLarge`] if one record's encoding exceeds
    /// the position token's size field, or the backend's error.
    pub fn write_all<B: AsRef<[u8]>>(&self, records: &[B]) -> CoreResult<Vec<ChunkPosition>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut inner = self.inner.write();
        inner.settle(self.id)?;
        let start = inner.cursor;

        let needed: u64 = records
            .iter()
            .map(|r| chunk::max_encoded_len(r.as_ref().len()))
            .sum();
        let remaining = self.capacity.saturating_sub(start.size());
        if needed > remaining {
            return Err(CoreError::SegmentFull {
                segment_id: self.id,
                needed,
                remaining,
            });
        }

        let mut buf = Vec::with_capacity(needed as usize);
        let mut cursor = start;
        let mut positions = Vec::with_capacity(records.len());
        for record in records {
            positions.push(encode_record(&mut buf, &mut cursor, self.id, record.as_ref())?);
        }

        let segment_size = start.size();
        match inner.backend.append(&buf) {
            Ok(offset) => debug_assert_eq!(offset, segment_size),
            Err(err) => {
                if let Err(rollback) = inner.backend.truncate(segment_size) {
                    inner.torn = true;
                    warn!(
                        segment_id = self.id,
                        size = segment_size,
                        error = %rollback,
                        "failed to roll back partial append"
                    );
                }
                return Err(err.into());
            }
        }

        inner.cursor = cursor;
        Ok(positions)
    }

    /// Reads the record whose first chunk is at `block_number`/`chunk_offset`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::PositionOutOfRange`] if the address is past the written
    ///   extent or outside a block
    /// - [`CoreError::CorruptChunk`] on a checksum mismatch, an invalid chunk
    ///   sequence, or an address pointing at block padding
    /// - [`CoreError::TruncatedChunk`] if a chunk runs past the written extent
    pub fn read(&self, block_number: u32, chunk_offset: u32) -> CoreResult<Vec<u8>> {
        let start = BlockCursor::new(block_number, chunk_offset);
        let size = self.size();
        if chunk_offset as usize >= BLOCK_SIZE || start.size() >= size {
            return Err(CoreError::PositionOutOfRange {
                segment_id: self.id,
                block_number,
                chunk_offset,
                segment_size: size,
            });
        }

        match self.read_at(start)? {
            ReadOutcome::Record { data, .. } => Ok(data),
            ReadOutcome::Padding { .. } => Err(CoreError::corrupt_chunk(
                self.id,
                block_number,
                chunk_offset,
                "position addresses block padding",
            )),
            ReadOutcome::End => Err(CoreError::PositionOutOfRange {
                segment_id: self.id,
                block_number,
                chunk_offset,
                segment_size: size,
            }),
        }
    }

    /// Decodes the record starting at `start`, following `First`/`Middle`
    /// chunks until the terminating `Last`.
    pub(crate) fn read_at(&self, start: BlockCursor) -> CoreResult<ReadOutcome> {
        let inner = self.inner.read();
        self.decode_at(&inner, start)
    }

    fn decode_at(&self, inner: &SegmentInner, start: BlockCursor) -> CoreResult<ReadOutcome> {
        let size = inner.cursor.size();

        if start.size() >= size {
            return Ok(ReadOutcome::End);
        }
        if !chunk::fits_in_block(start.block_offset as usize) {
            return Ok(ReadOutcome::Padding {
                next: start.next_block(),
            });
        }

        let mut data = Vec::new();
        let mut cursor = start;
        let mut first = true;

        loop {
            let at = cursor.size();
            let fault = |fault| {
                CoreError::from_fault(fault, self.id, cursor.block_number, cursor.block_offset)
            };

            let available = (size - at) as usize;
            let header_bytes = inner.backend.read_at(at, HEADER_SIZE.min(available))?;
            let header = match chunk::decode_header(&header_bytes).map_err(fault)? {
                Header::Padding if first => {
                    return Ok(ReadOutcome::Padding {
                        next: start.next_block(),
                    });
                }
                Header::Padding => {
                    return Err(CoreError::corrupt_chunk(
                        self.id,
                        cursor.block_number,
                        cursor.block_offset,
                        "record interrupted by padding",
                    ));
                }
                Header::Chunk(header) => header,
            };

            let chunk_type = header.chunk_type;
            let expected = if first {
                chunk_type.starts_record()
            } else {
                matches!(chunk_type, ChunkType::Middle | ChunkType::Last)
            };
            if !expected {
                return Err(CoreError::corrupt_chunk(
                    self.id,
                    cursor.block_number,
                    cursor.block_offset,
                    format!("unexpected {chunk_type:?} chunk"),
                ));
            }

            let length = header.length as usize;
            if length > cursor.room() {
                return Err(CoreError::corrupt_chunk(
                    self.id,
                    cursor.block_number,
                    cursor.block_offset,
                    format!("chunk length {length} overruns its block"),
                ));
            }

            let payload_len = length.min(available - HEADER_SIZE);
            let payload = inner.backend.read_at(at + HEADER_SIZE as u64, payload_len)?;
            let payload = chunk::verify(&header, &payload).map_err(fault)?;
            data.extend_from_slice(payload);

            cursor.advance(HEADER_SIZE + length);
            if chunk_type.ends_record() {
                break;
            }
            cursor = cursor.aligned();
            if cursor.size() >= size {
                return Err(CoreError::TruncatedChunk {
                    segment_id: self.id,
                    block_number: cursor.block_number,
                    chunk_offset: cursor.block_offset,
                    needed: HEADER_SIZE,
                    available: 0,
                });
            }
            first = false;
        }

        let chunk_size = cursor.size() - start.size();
        let position = ChunkPosition::new(
            self.id,
            start.block_number,
            start.block_offset,
            chunk_size as u32,
        );

        Ok(ReadOutcome::Record {
            data,
            position,
            next: cursor.aligned(),
        })
    }

    /// Cuts an incomplete record off the end of the segment.
    ///
    /// Scans every record from the start. If the last one runs past the end
    /// of the data, the backend is truncated to the end of the last complete
    /// record and appends resume there. A corrupt chunk stops the scan
    /// without truncating anything. Returns the number of bytes dropped.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub fn repair_tail(&self) -> CoreResult<u64> {
        let mut inner = self.inner.write();
        let size = inner.cursor.size();
        let mut cursor = BlockCursor::default();
        let mut valid_end = 0;

        loop {
            match self.decode_at(&inner, cursor) {
                Ok(ReadOutcome::Record { position, next, .. }) => {
                    valid_end = cursor.size() + u64::from(position.chunk_size);
                    cursor = next;
                }
                Ok(ReadOutcome::Padding { next }) => cursor = next,
                Ok(ReadOutcome::End) => return Ok(0),
                Err(CoreError::TruncatedChunk { .. }) => break,
                Err(err) if err.is_corruption() => {
                    warn!(
                        segment_id = self.id,
                        error = %err,
                        "corrupt record found while scanning segment tail"
                    );
                    return Ok(0);
                }
                Err(err) => return Err(err),
            }
        }

        inner.backend.truncate(valid_end)?;
        inner.cursor = BlockCursor::from_size(valid_end);
        inner.torn = false;
        let dropped = size - valid_end;
        warn!(
            segment_id = self.id,
            size,
            truncated_to = valid_end,
            "dropped incomplete record at segment tail"
        );
        Ok(dropped)
    }

    /// Flushes and fsyncs the backend. Blocks until the storage confirms.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, or the error of retrying a failed
    /// rollback.
    pub fn sync(&self) -> CoreResult<()> {
        let mut inner = self.inner.write();
        inner.settle(self.id)?;
        inner.backend.sync()?;
        trace!(segment_id = self.id, size = inner.cursor.size(), "segment synced");
        Ok(())
    }

    /// Raw bytes written so far.
    #[cfg(test)]
    pub(crate) fn image(&self) -> Vec<u8> {
        let inner = self.inner.read();
        inner
            .backend
            .read_at(0, inner.cursor.size() as usize)
            .unwrap()
    }

    /// Returns a reader over this segment's records from the start.
    #[must_use]
    pub fn new_reader(self: &Arc<Self>) -> SegmentReader {
        SegmentReader::new(Arc::clone(self))
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("capacity", &self.capacity)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

/// Encodes `data` at `cursor`, padding first if the block tail is too short,
/// and returns the record's position.
fn encode_record(
    buf: &mut Vec<u8>,
    cursor: &mut BlockCursor,
    segment_id: SegmentId,
    data: &[u8],
) -> CoreResult<ChunkPosition> {
    let aligned = cursor.aligned();
    if aligned != *cursor {
        buf.resize(buf.len() + BLOCK_SIZE - cursor.block_offset as usize, 0);
        *cursor = aligned;
    }

    let start = *cursor;
    let start_len = buf.len();
    let mut rest = data;
    let mut first = true;

    loop {
        let take = rest.len().min(cursor.room());
        let (part, tail) = rest.split_at(take);
        let chunk_type = match (first, tail.is_empty()) {
            (true, true) => ChunkType::Full,
            (true, false) => ChunkType::First,
            (false, false) => ChunkType::Middle,
            (false, true) => ChunkType::Last,
        };

        chunk::encode_chunk_into(buf, chunk_type, part);
        cursor.advance(HEADER_SIZE + take);

        if tail.is_empty() {
            break;
        }
        rest = tail;
        first = false;
    }

    let chunk_size = u32::try_from(buf.len() - start_len).map_err(|_| CoreError::RecordTooLarge {
        size: data.len() as u64,
        limit: u64::from(u32::MAX),
    })?;

    Ok(ChunkPosition::new(
        segment_id,
        start.block_number,
        start.block_offset,
        chunk_size,
    ))
}
