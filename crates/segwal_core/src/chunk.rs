//! Block codec: one checksummed chunk inside a fixed-size block.
//!
//! A segment is a sequence of [`BLOCK_SIZE`] blocks. Each block holds chunks
//! laid out back to back:
//!
//! ```text
//! +-------------+-----------+--------------+-----------------+
//! | length (4)  | type (1)  | crc32 (4)    | payload (length)|
//! +-------------+-----------+--------------+-----------------+
//! ```
//!
//! `length` and `crc32` are little-endian. The checksum covers the type byte
//! followed by the payload. A chunk header never crosses a block boundary:
//! when a block has [`HEADER_SIZE`] bytes or fewer left, the tail is zero
//! filled and the next chunk starts at the following block. An all-zero
//! header (zero length, type 0) is therefore the padding sentinel, and type 0
//! is never assigned to a real chunk.

use thiserror::Error;

/// On-disk format version described by the constants in this module.
pub const FORMAT_VERSION: u16 = 1;

/// Size of one block in bytes.
pub const BLOCK_SIZE: usize = 32 * 1024;

/// Chunk header size: length (4) + type (1) + crc32 (4).
pub const HEADER_SIZE: usize = 9;

/// Position of a chunk within a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkType {
    /// The whole record.
    Full = 1,
    /// First fragment of a record split across blocks.
    First = 2,
    /// Interior fragment.
    Middle = 3,
    /// Final fragment.
    Last = 4,
}

impl ChunkType {
    /// Converts a tag byte to a chunk type.
    #[must_use]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Full),
            2 => Some(Self::First),
            3 => Some(Self::Middle),
            4 => Some(Self::Last),
            _ => None,
        }
    }

    /// Returns the tag byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether a record may begin with this chunk.
    #[must_use]
    pub const fn starts_record(self) -> bool {
        matches!(self, Self::Full | Self::First)
    }

    /// Whether this chunk completes a record.
    #[must_use]
    pub const fn ends_record(self) -> bool {
        matches!(self, Self::Full | Self::Last)
    }
}

/// A decoded chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Payload length in bytes.
    pub length: u32,
    /// Chunk type.
    pub chunk_type: ChunkType,
    /// Stored CRC-32 of type byte and payload.
    pub checksum: u32,
}

/// Result of decoding the header bytes at a chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Header {
    /// A real chunk follows.
    Chunk(ChunkHeader),
    /// Zero padding; the rest of the block carries no chunk.
    Padding,
}

/// Why a chunk failed to decode.
///
/// The codec has no notion of where the bytes came from; segments attach
/// the position when turning this into a [`crate::CoreError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkFault {
    /// Fewer bytes are available than the header declares.
    #[error("need {needed} bytes, {available} available")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },

    /// The bytes do not form a valid chunk.
    #[error("{0}")]
    Corrupt(String),
}

/// Computes the chunk checksum over the type byte and payload.
#[must_use]
pub fn checksum(chunk_type: ChunkType, payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[chunk_type.as_byte()]);
    hasher.update(payload);
    hasher.finalize()
}

/// Appends one encoded chunk (header and payload) to `buf`.
///
/// `payload` must fit in a block, i.e. be at most
/// `BLOCK_SIZE - HEADER_SIZE` bytes.
pub fn encode_chunk_into(buf: &mut Vec<u8>, chunk_type: ChunkType, payload: &[u8]) {
    debug_assert!(payload.len() <= BLOCK_SIZE - HEADER_SIZE);
    let length = payload.len() as u32;
    buf.reserve(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&length.to_le_bytes());
    buf.push(chunk_type.as_byte());
    buf.extend_from_slice(&checksum(chunk_type, payload).to_le_bytes());
    buf.extend_from_slice(payload);
}

/// Encodes one chunk into a fresh buffer.
#[must_use]
pub fn encode_chunk(payload: &[u8], chunk_type: ChunkType) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    encode_chunk_into(&mut buf, chunk_type, payload);
    buf
}

/// Decodes the header at the start of `bytes`.
///
/// # Errors
///
/// Returns [`ChunkFault::Truncated`] if fewer than [`HEADER_SIZE`] bytes are
/// given and [`ChunkFault::Corrupt`] for an unknown type tag.
pub fn decode_header(bytes: &[u8]) -> Result<Header, ChunkFault> {
    if bytes.len() < HEADER_SIZE {
        return Err(ChunkFault::Truncated {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let tag = bytes[4];
    let checksum = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);

    if length == 0 && tag == 0 {
        return Ok(Header::Padding);
    }

    let chunk_type = ChunkType::from_byte(tag)
        .ok_or_else(|| ChunkFault::Corrupt(format!("unknown chunk type {tag}")))?;

    Ok(Header::Chunk(ChunkHeader {
        length,
        chunk_type,
        checksum,
    }))
}

/// Checks `payload` against a decoded header.
///
/// `payload` may be longer than the header declares; only the declared
/// prefix is checked and returned.
///
/// # Errors
///
/// Returns [`ChunkFault::Truncated`] when `payload` is short and
/// [`ChunkFault::Corrupt`] on a checksum mismatch.
pub fn verify<'a>(header: &ChunkHeader, payload: &'a [u8]) -> Result<&'a [u8], ChunkFault> {
    let length = header.length as usize;
    if payload.len() < length {
        return Err(ChunkFault::Truncated {
            needed: length,
            available: payload.len(),
        });
    }

    let payload = &payload[..length];
    let actual = checksum(header.chunk_type, payload);
    if actual != header.checksum {
        return Err(ChunkFault::Corrupt(format!(
            "checksum mismatch: stored {:08x}, computed {actual:08x}",
            header.checksum
        )));
    }

    Ok(payload)
}

/// Decodes and verifies one complete chunk at the start of `bytes`.
///
/// # Errors
///
/// Returns [`ChunkFault::Corrupt`] for padding, an unknown type or a bad
/// checksum and [`ChunkFault::Truncated`] for short input.
pub fn decode_chunk(bytes: &[u8]) -> Result<(ChunkType, &[u8]), ChunkFault> {
    match decode_header(bytes)? {
        Header::Padding => Err(ChunkFault::Corrupt("block padding, not a chunk".into())),
        Header::Chunk(header) => {
            let payload = verify(&header, &bytes[HEADER_SIZE..])?;
            Ok((header.chunk_type, payload))
        }
    }
}

/// Whether a chunk may start at `block_offset`.
///
/// A block tail of [`HEADER_SIZE`] bytes or fewer is padding.
#[must_use]
pub const fn fits_in_block(block_offset: usize) -> bool {
    block_offset < BLOCK_SIZE && BLOCK_SIZE - block_offset > HEADER_SIZE
}

/// Worst-case number of bytes a record of `len` bytes occupies on disk.
///
/// Counts the payload, one header per chunk the record can be split into and
/// one header's worth of padding that may precede the first chunk.
#[must_use]
pub fn max_encoded_len(len: usize) -> u64 {
    let per_block = (BLOCK_SIZE - HEADER_SIZE) as u64;
    let len = len as u64;
    let chunks = len.div_ceil(per_block) + 1;
    len + (chunks + 1) * HEADER_SIZE as u64
}
