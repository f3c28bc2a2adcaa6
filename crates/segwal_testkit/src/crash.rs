//! Crash simulation for segment backends.
//!
//! [`CrashableBackend`] wraps another backend and fails appends or syncs on
//! demand. A crash in the middle of an append writes the leading part of the
//! bytes before failing, which is what a torn write leaves behind.
//!
//! ## Usage
//!
//! ```rust
//! use segwal_core::Segment;
//! use segwal_storage::InMemoryBackend;
//! use segwal_testkit::crash::CrashableBackend;
//!
//! let backend = CrashableBackend::new(Box::new(InMemoryBackend::new()));
//! let control = backend.control();
//! let segment = Segment::open(0, Box::new(backend), 1 << 20).unwrap();
//!
//! control.crash_after(4);
//! assert!(segment.write(b"torn record").is_err());
//! assert_eq!(segment.size(), 0);
//! ```

use segwal_storage::{StorageBackend, StorageError, StorageResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared switches of a [`CrashableBackend`].
///
/// The backend itself is usually boxed into a segment; tests keep this
/// handle to arm it and to inspect what happened.
#[derive(Debug)]
pub struct CrashControl {
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
    fail_on_sync: AtomicBool,
    fail_on_truncate: AtomicBool,
    syncs: AtomicUsize,
}

impl Default for CrashControl {
    fn default() -> Self {
        Self {
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
            fail_on_sync: AtomicBool::new(false),
            fail_on_truncate: AtomicBool::new(false),
            syncs: AtomicUsize::new(0),
        }
    }
}

impl CrashControl {
    /// Fails the append that would take the total past `bytes` more bytes,
    /// after writing the part that still fits.
    pub fn crash_after(&self, bytes: usize) {
        let written = self.bytes_written.load(Ordering::SeqCst);
        self.crash_after_bytes
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Sets whether flush and sync fail.
    pub fn set_fail_on_sync(&self, fail: bool) {
        self.fail_on_sync.store(fail, Ordering::SeqCst);
    }

    /// Sets whether truncate fails, which defeats rollback.
    pub fn set_fail_on_truncate(&self, fail: bool) {
        self.fail_on_truncate.store(fail, Ordering::SeqCst);
    }

    /// Disarms every failure.
    pub fn reset(&self) {
        self.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        self.crashed.store(false, Ordering::SeqCst);
        self.fail_on_sync.store(false, Ordering::SeqCst);
        self.fail_on_truncate.store(false, Ordering::SeqCst);
    }

    /// Returns whether a simulated failure has fired.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Returns the number of successful syncs.
    pub fn sync_count(&self) -> usize {
        self.syncs.load(Ordering::SeqCst)
    }

    fn fail(&self, what: &str) -> StorageError {
        self.crashed.store(true, Ordering::SeqCst);
        StorageError::Io(std::io::Error::other(format!(
            "simulated crash during {what}"
        )))
    }
}

/// A storage backend wrapper that can simulate crashes.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    control: Arc<CrashControl>,
}

impl CrashableBackend {
    /// Creates a new crashable backend wrapping an inner backend.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        Self {
            inner,
            control: Arc::new(CrashControl::default()),
        }
    }

    /// Returns the shared switches.
    pub fn control(&self) -> Arc<CrashControl> {
        Arc::clone(&self.control)
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
        let control = &self.control;
        let current = control.bytes_written.load(Ordering::SeqCst);
        let threshold = control.crash_after_bytes.load(Ordering::SeqCst);

        if current >= threshold {
            return Err(control.fail("write"));
        }

        if current + bytes.len() > threshold {
            let partial_len = threshold - current;
            if partial_len > 0 {
                self.inner.append(&bytes[..partial_len])?;
                control.bytes_written.fetch_add(partial_len, Ordering::SeqCst);
            }
            return Err(control.fail("partial write"));
        }

        let offset = self.inner.append(bytes)?;
        control.bytes_written.fetch_add(bytes.len(), Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.control.fail_on_sync.load(Ordering::SeqCst) {
            return Err(self.control.fail("flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        if self.control.fail_on_truncate.load(Ordering::SeqCst) {
            return Err(self.control.fail("truncate"));
        }
        self.inner.truncate(new_size)
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.control.fail_on_sync.load(Ordering::SeqCst) {
            return Err(self.control.fail("sync"));
        }
        self.inner.sync()?;
        self.control.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
