//! Sequential reader over one segment.

use crate::error::CoreResult;
use crate::position::{ChunkPosition, SegmentId};
use crate::segment::{BlockCursor, ReadOutcome, Segment};
use std::sync::Arc;

/// Reads a segment's records in file order, reassembling split records.
///
/// The reader holds the segment by `Arc` and takes only the segment's shared
/// lock for each record, so it never blocks writers for longer than one
/// read. It stops at the written extent observed when each record is read;
/// records appended to an active segment later are picked up by subsequent
/// calls.
///
/// After an error the reader is finished.
///
/// # Example
///
/// ```ignore
/// for result in segment.new_reader() {
///     let (record, position) = result?;
///     // ...
/// }
/// ```
pub struct SegmentReader {
    segment: Arc<Segment>,
    cursor: BlockCursor,
    finished: bool,
}

impl SegmentReader {
    /// Creates a reader starting at the beginning of `segment`.
    #[must_use]
    pub fn new(segment: Arc<Segment>) -> Self {
        Self::starting_at(segment, 0, 0)
    }

    /// Creates a reader whose first record is the one at
    /// `block_number`/`chunk_offset`.
    #[must_use]
    pub fn starting_at(segment: Arc<Segment>, block_number: u32, chunk_offset: u32) -> Self {
        Self {
            segment,
            cursor: BlockCursor::new(block_number, chunk_offset),
            finished: false,
        }
    }

    /// Returns the id of the segment being read.
    #[must_use]
    pub fn segment_id(&self) -> SegmentId {
        self.segment.id()
    }

    /// Returns the position the next record would start at, with a
    /// `chunk_size` of 0.
    #[must_use]
    pub fn current_chunk_position(&self) -> ChunkPosition {
        let cursor = self.cursor.aligned();
        ChunkPosition::new(self.segment.id(), cursor.block_number, cursor.block_offset, 0)
    }

    /// Reads the next record, skipping block padding.
    ///
    /// Returns `Ok(None)` at the end of the written extent.
    ///
    /// # Errors
    ///
    /// Propagates corruption and I/O errors from the segment. After an
    /// error the reader is finished and returns `Ok(None)`.
    pub fn next_record(&mut self) -> CoreResult<Option<(Vec<u8>, ChunkPosition)>> {
        if self.finished {
            return Ok(None);
        }

        let result = self.read_next();
        if result.is_err() {
            self.finished = true;
        }
        result
    }

    fn read_next(&mut self) -> CoreResult<Option<(Vec<u8>, ChunkPosition)>> {
        loop {
            match self.segment.read_at(self.cursor)? {
                ReadOutcome::Record {
                    data,
                    position,
                    next,
                } => {
                    self.cursor = next;
                    return Ok(Some((data, position)));
                }
                ReadOutcome::Padding { next } => self.cursor = next,
                ReadOutcome::End => return Ok(None),
            }
        }
    }
}

impl Iterator for SegmentReader {
    type Item = CoreResult<(Vec<u8>, ChunkPosition)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl std::fmt::Debug for SegmentReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("segment_id", &self.segment.id())
            .field("cursor", &self.cursor)
            .field("finished", &self.finished)
            .finish()
    }
}
