//! # segwal testkit
//!
//! Test utilities for segwal.
//!
//! This crate provides:
//! - [`TestWal`], a WAL in a temporary directory that can be reopened
//! - crash simulation through [`CrashableBackend`]
//! - helpers that damage segment files on disk
//! - proptest strategies for record payloads
//! - stress drivers with concurrent readers
//!
//! ## Usage
//!
//! ```rust
//! use segwal_testkit::prelude::*;
//!
//! let wal = TestWal::with_segment_size(64 * KB);
//! let position = wal.write(b"hello").unwrap();
//! let wal = wal.reopen();
//! assert_eq!(wal.read(&position).unwrap(), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
    pub use segwal_core::{
        ChunkPosition, CoreError, CoreResult, Wal, WalOptions, BLOCK_SIZE, HEADER_SIZE, KB, MB,
    };
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
