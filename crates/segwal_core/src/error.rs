//! Error types for segwal core.

use crate::chunk::ChunkFault;
use crate::position::SegmentId;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in WAL operations.
///
/// After an error from a write the durability of that write is unknown;
/// after an error from a sync the durability of every unsynced write is
/// unknown. Nothing is retried internally.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] segwal_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The bytes at a position do not form a valid chunk sequence.
    #[error("corrupt chunk at segment {segment_id} block {block_number} offset {chunk_offset}: {reason}")]
    CorruptChunk {
        /// Segment being read.
        segment_id: SegmentId,
        /// Block of the offending chunk.
        block_number: u32,
        /// Offset of the offending chunk within its block.
        chunk_offset: u32,
        /// What was wrong.
        reason: String,
    },

    /// A chunk declares more bytes than the segment holds.
    #[error("truncated chunk at segment {segment_id} block {block_number} offset {chunk_offset}: need {needed} bytes, {available} available")]
    TruncatedChunk {
        /// Segment being read.
        segment_id: SegmentId,
        /// Block of the offending chunk.
        block_number: u32,
        /// Offset of the offending chunk within its block.
        chunk_offset: u32,
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },

    /// The position lies beyond the segment's written extent.
    #[error("position segment {segment_id} block {block_number} offset {chunk_offset} is beyond segment size {segment_size}")]
    PositionOutOfRange {
        /// Segment addressed.
        segment_id: SegmentId,
        /// Block addressed.
        block_number: u32,
        /// Offset addressed.
        chunk_offset: u32,
        /// Written size of the segment.
        segment_size: u64,
    },

    /// No segment with this id is open.
    #[error("segment {segment_id} not found")]
    SegmentNotFound {
        /// Segment requested.
        segment_id: SegmentId,
    },

    /// The segment cannot take the write. Consumed by rotation inside
    /// [`crate::Wal`] and never returned from its methods.
    #[error("segment {segment_id} is full: {needed} bytes needed, {remaining} remaining")]
    SegmentFull {
        /// Segment that is full.
        segment_id: SegmentId,
        /// Worst-case bytes the write needs.
        needed: u64,
        /// Bytes left before the capacity limit.
        remaining: u64,
    },

    /// A single record cannot fit in an empty segment.
    #[error("record of {size} bytes cannot fit in a segment of {limit} bytes")]
    RecordTooLarge {
        /// Record length.
        size: u64,
        /// Segment capacity.
        limit: u64,
    },

    /// The pending batch cannot fit in an empty segment.
    #[error("pending batch of {size} encoded bytes cannot fit in a segment of {limit} bytes")]
    BatchTooLarge {
        /// Worst-case encoded size of the batch.
        size: u64,
        /// Segment capacity.
        limit: u64,
    },

    /// Options rejected at open.
    #[error("invalid options: {message}")]
    InvalidOptions {
        /// Description of the problem.
        message: String,
    },

    /// Malformed input that is not a chunk, e.g. a position token.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// The WAL has been closed.
    #[error("WAL is closed")]
    WalClosed,
}

impl CoreError {
    /// Attaches a position to a codec fault.
    pub fn from_fault(
        fault: ChunkFault,
        segment_id: SegmentId,
        block_number: u32,
        chunk_offset: u32,
    ) -> Self {
        match fault {
            ChunkFault::Truncated { needed, available } => Self::TruncatedChunk {
                segment_id,
                block_number,
                chunk_offset,
                needed,
                available,
            },
            ChunkFault::Corrupt(reason) => Self::CorruptChunk {
                segment_id,
                block_number,
                chunk_offset,
                reason,
            },
        }
    }

    /// Creates a corrupt chunk error.
    pub fn corrupt_chunk(
        segment_id: SegmentId,
        block_number: u32,
        chunk_offset: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self::CorruptChunk {
            segment_id,
            block_number,
            chunk_offset,
            reason: reason.into(),
        }
    }

    /// Creates an invalid options error.
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Whether the error means the stored bytes are damaged.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptChunk { .. } | Self::TruncatedChunk { .. })
    }
}
