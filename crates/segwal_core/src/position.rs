//! Position tokens returned by writes and accepted by reads.

use crate::error::{CoreError, CoreResult};
use std::fmt;

/// Identifier of a segment file. Assigned in ascending order starting at 0.
pub type SegmentId = u32;

/// Address of a record inside the log.
///
/// A position is a plain value: it is not checked when built or decoded, only
/// when used to read. `chunk_size` is the number of bytes the record's chunks
/// occupy, counted from the first header to the end of the last payload.
///
/// Positions order by segment, then block, then offset, which is write
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPosition {
    /// Segment holding the record.
    pub segment_id: SegmentId,
    /// Block in which the first chunk starts.
    pub block_number: u32,
    /// Byte offset of the first chunk within that block.
    pub chunk_offset: u32,
    /// Encoded length of all chunks of the record.
    pub chunk_size: u32,
}

impl ChunkPosition {
    /// Length of [`encode`](Self::encode)'s output.
    pub const ENCODED_LEN: usize = 16;

    /// Creates a position.
    #[must_use]
    pub const fn new(
        segment_id: SegmentId,
        block_number: u32,
        chunk_offset: u32,
        chunk_size: u32,
    ) -> Self {
        Self {
            segment_id,
            block_number,
            chunk_offset,
            chunk_size,
        }
    }

    /// Encodes the position as four little-endian `u32`s:
    /// segment id, block number, chunk offset, chunk size.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0u8; Self::ENCODED_LEN];
        buf[0..4].copy_from_slice(&self.segment_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.block_number.to_le_bytes());
        buf[8..12].copy_from_slice(&self.chunk_offset.to_le_bytes());
        buf[12..16].copy_from_slice(&self.chunk_size.to_le_bytes());
        buf
    }

    /// Decodes a position produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if `bytes` is not exactly
    /// [`ENCODED_LEN`](Self::ENCODED_LEN) long.
    pub fn decode(bytes: &[u8]) -> CoreResult<Self> {
        let bytes: &[u8; Self::ENCODED_LEN] = bytes.try_into().map_err(|_| {
            CoreError::invalid_format(format!(
                "position token must be {} bytes, got {}",
                Self::ENCODED_LEN,
                bytes.len()
            ))
        })?;

        let field = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Ok(Self {
            segment_id: field(0),
            block_number: field(4),
            chunk_offset: field(8),
            chunk_size: field(12),
        })
    }
}

impl fmt::Display for ChunkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}+{} ({} bytes)",
            self.segment_id, self.block_number, self.chunk_offset, self.chunk_size
        )
    }
}
