//! The write-ahead log engine.
//!
//! A [`Wal`] owns one directory of segment files. Records go to the single
//! active segment; when it cannot take a record the engine syncs and seals
//! it and continues in a new segment with the next id. Each write returns a
//! [`ChunkPosition`](crate::ChunkPosition) that reads the record back with
//! no index.
//!
//! ## Batches
//!
//! [`Wal::pending_writes`] buffers records in memory and [`Wal::write_all`]
//! commits them: the whole batch lands contiguously in one segment, with a
//! single append and at most one fsync.
//!
//! ## Replay
//!
//! [`Wal::new_reader`] streams every record of every segment in ascending
//! segment id and file order, holding one record in memory at a time:
//!
//! ```ignore
//! for result in wal.new_reader()? {
//!     let (record, position) = result?;
//!     // rebuild state from record
//! }
//! ```
//!
//! ## Invariants
//!
//! - Segments are **append-only**; sealed segments are never written again
//! - A record, and a committed batch, never straddles two segments
//! - A segment never grows past its configured capacity
//! - Corruption is **always reported**, never skipped

mod engine;
mod iterator;

pub use engine::Wal;
pub use iterator::WalReader;
