//! # segwal storage
//!
//! Byte-store backends that segwal segments are written to.
//!
//! A backend is an **opaque, append-only byte store**. It does not know about
//! blocks, chunks or position tokens; `segwal_core` owns the segment format
//! and only asks the backend to append, read back, flush, sync and truncate.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - one OS file per segment
//! - [`InMemoryBackend`] - a growable buffer, for tests
//!
//! ## Example
//!
//! ```rust
//! use segwal_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"chunk bytes").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"chunk");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
