//! Replay across all segments.

use crate::error::CoreResult;
use crate::position::{ChunkPosition, SegmentId};
use crate::segment::SegmentReader;

/// Streams records of several segments in ascending segment id order.
///
/// Built by [`crate::Wal::new_reader`] and friends from a snapshot of the
/// segment table; it holds the segments by `Arc` and takes no engine lock.
/// The last segment is read up to its written extent at the time each record
/// is fetched. Creating a new reader always starts over from the first
/// segment.
///
/// After an error the reader is finished.
pub struct WalReader {
    readers: Vec<SegmentReader>,
    current: usize,
    finished: bool,
}

impl WalReader {
    pub(crate) fn new(readers: Vec<SegmentReader>) -> Self {
        Self {
            readers,
            current: 0,
            finished: false,
        }
    }

    /// Reads the next record.
    ///
    /// Returns `Ok(None)` once the last segment is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates corruption and I/O errors from the segment being read.
    /// After an error the reader is finished and returns `Ok(None)`.
    pub fn next_record(&mut self) -> CoreResult<Option<(Vec<u8>, ChunkPosition)>> {
        if self.finished {
            return Ok(None);
        }

        while let Some(reader) = self.readers.get_mut(self.current) {
            match reader.next_record() {
                Ok(Some(item)) => return Ok(Some(item)),
                Ok(None) => self.current += 1,
                Err(err) => {
                    self.finished = true;
                    return Err(err);
                }
            }
        }

        Ok(None)
    }

    /// Moves on to the next segment, dropping the rest of the current one.
    pub fn skip_current_segment(&mut self) {
        if self.current < self.readers.len() {
            self.current += 1;
        }
    }

    /// Returns the id of the segment being read, or `None` when exhausted.
    #[must_use]
    pub fn current_segment_id(&self) -> Option<SegmentId> {
        self.readers.get(self.current).map(SegmentReader::segment_id)
    }

    /// Returns where the next record would start, or `None` when exhausted.
    #[must_use]
    pub fn current_chunk_position(&self) -> Option<ChunkPosition> {
        self.readers
            .get(self.current)
            .map(SegmentReader::current_chunk_position)
    }
}

impl Iterator for WalReader {
    type Item = CoreResult<(Vec<u8>, ChunkPosition)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl std::fmt::Debug for WalReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalReader")
            .field("segments", &self.readers.len())
            .field("current_segment_id", &self.current_segment_id())
            .field("finished", &self.finished)
            .finish()
    }
}
