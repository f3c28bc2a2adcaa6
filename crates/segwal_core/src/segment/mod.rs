//! Segment files.
//!
//! A segment is one append-only file holding a run of the log as a sequence
//! of [`BLOCK_SIZE`](crate::BLOCK_SIZE) blocks. The WAL writes to exactly one
//! active segment; once a newer one is opened the old segment is sealed and
//! never written again.
//!
//! ## Record layout
//!
//! A record that fits in the rest of the current block is written as one
//! `Full` chunk. Otherwise it becomes a `First` chunk filling the block,
//! `Middle` chunks filling whole blocks, and a `Last` chunk:
//!
//! ```text
//! block n                       block n+1                  block n+2
//! | ... | First ............. | | Middle ............... | | Last ... | pad |
//! ```

mod reader;
mod store;

pub use reader::SegmentReader;
pub use store::Segment;

pub(crate) use store::{BlockCursor, ReadOutcome};
