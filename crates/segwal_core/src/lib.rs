//! # segwal core
//!
//! An append-only, segmented write-ahead log.
//!
//! Records are arbitrary byte strings. Each write returns a
//! [`ChunkPosition`] that reads the record back later. On disk the log is a
//! directory of fixed-capacity segment files, each divided into 32 KiB
//! blocks; a record is stored as one or more checksummed chunks that never
//! cross a block boundary.
//!
//! This crate provides:
//! - [`Wal`]: open, write, batch, read, sync and close
//! - [`WalReader`]: replay of every record in write order
//! - [`Segment`] and [`SegmentReader`]: a single segment file
//! - the chunk codec in [`chunk`]
//!
//! ## Example
//!
//! ```no_run
//! use segwal_core::{Wal, WalOptions, MB};
//!
//! let wal = Wal::open(WalOptions::new().dir_path("/tmp/wal").segment_size(64 * MB))?;
//!
//! wal.pending_writes(b"first".to_vec());
//! wal.pending_writes(b"second".to_vec());
//! let positions = wal.write_all()?;
//!
//! for entry in wal.new_reader()? {
//!     let (data, position) = entry?;
//!     println!("{position}: {} bytes", data.len());
//! }
//! # assert_eq!(positions.len(), 2);
//! # Ok::<(), segwal_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chunk;
mod config;
mod dir;
mod error;
mod position;
mod segment;
mod wal;

pub use chunk::{max_encoded_len, ChunkFault, ChunkType, BLOCK_SIZE, FORMAT_VERSION, HEADER_SIZE};
pub use config::{WalOptions, B, GB, KB, MB};
pub use dir::{segment_file_name, SegmentDir};
pub use error::{CoreError, CoreResult};
pub use position::{ChunkPosition, SegmentId};
pub use segment::{Segment, SegmentReader};
pub use wal::{Wal, WalReader};
