//! Test fixtures and WAL helpers.
//!
//! [`TestWal`] owns its temporary directory, so segment files live exactly
//! as long as the fixture.

use segwal_core::{segment_file_name, ChunkPosition, CoreResult, SegmentId, Wal, WalOptions};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A WAL in a temporary directory with automatic cleanup.
pub struct TestWal {
    /// The WAL instance.
    pub wal: Wal,
    options: WalOptions,
    // Dropped after `wal`, so the files outlive the handle.
    temp_dir: TempDir,
}

impl TestWal {
    /// Opens a WAL with default options in a fresh directory.
    pub fn new() -> Self {
        Self::with_options(WalOptions::new())
    }

    /// Opens a WAL with the given segment capacity.
    pub fn with_segment_size(segment_size: u64) -> Self {
        Self::with_options(WalOptions::new().segment_size(segment_size))
    }

    /// Opens a WAL with `options`, overriding `dir_path` with a fresh
    /// temporary directory.
    pub fn with_options(options: WalOptions) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let options = options.dir_path(temp_dir.path());
        let wal = Wal::open(options.clone()).expect("Failed to open WAL");
        Self {
            wal,
            options,
            temp_dir,
        }
    }

    /// Closes the WAL and opens it again over the same directory.
    pub fn reopen(self) -> Self {
        self.reopen_with(|options| options)
    }

    /// Closes the WAL and opens it again with adjusted options.
    pub fn reopen_with(self, adjust: impl FnOnce(WalOptions) -> WalOptions) -> Self {
        let Self {
            wal,
            options,
            temp_dir,
        } = self;
        wal.close().expect("Failed to close WAL");
        drop(wal);

        let options = adjust(options).dir_path(temp_dir.path());
        let wal = Wal::open(options.clone()).expect("Failed to reopen WAL");
        Self {
            wal,
            options,
            temp_dir,
        }
    }

    /// Drops the WAL without closing it, as a crashed process would.
    ///
    /// Nothing is lost from the files: every write went through to the OS.
    pub fn crash_and_reopen(self) -> Self {
        let Self {
            wal,
            options,
            temp_dir,
        } = self;
        std::mem::forget(wal);

        let wal = Wal::open(options.clone()).expect("Failed to reopen WAL");
        Self {
            wal,
            options,
            temp_dir,
        }
    }

    /// Returns the options the WAL was opened with.
    pub fn options(&self) -> &WalOptions {
        &self.options
    }

    /// Returns the segment directory.
    pub fn dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the path of segment `id`.
    pub fn segment_path(&self, id: SegmentId) -> PathBuf {
        self.dir()
            .join(segment_file_name(id, &self.options.segment_file_ext))
    }

    /// Returns the on-disk path of the segment holding `position`.
    pub fn path_of(&self, position: &ChunkPosition) -> PathBuf {
        self.segment_path(position.segment_id)
    }
}

impl Default for TestWal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestWal {
    type Target = Wal;

    fn deref(&self) -> &Self::Target {
        &self.wal
    }
}

/// Runs a test with a WAL of the given segment capacity.
///
/// # Example
///
/// ```rust
/// use segwal_testkit::with_temp_wal;
///
/// with_temp_wal(1024 * 1024, |wal| {
///     let position = wal.write(b"data").unwrap();
///     assert_eq!(wal.read(&position).unwrap(), b"data");
/// });
/// ```
pub fn with_temp_wal<F, R>(segment_size: u64, f: F) -> R
where
    F: FnOnce(&Wal) -> R,
{
    let wal = TestWal::with_segment_size(segment_size);
    f(&wal)
}

/// Replays the whole log into a list of payloads.
///
/// # Errors
///
/// Returns the first error the reader yields.
pub fn collect_records(wal: &Wal) -> CoreResult<Vec<Vec<u8>>> {
    wal.new_reader()?
        .map(|entry| entry.map(|(data, _)| data))
        .collect()
}

/// Replays the whole log into `(payload, position)` pairs.
///
/// # Errors
///
/// Returns the first error the reader yields.
pub fn collect_entries(wal: &Wal) -> CoreResult<Vec<(Vec<u8>, ChunkPosition)>> {
    wal.new_reader()?.collect()
}

/// Flips every bit of the byte at `offset` in the file at `path`.
pub fn flip_byte(path: &Path, offset: u64) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .expect("Failed to open segment file");
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset)).expect("Failed to seek");
    file.read_exact(&mut byte).expect("Failed to read byte");
    file.seek(SeekFrom::Start(offset)).expect("Failed to seek");
    file.write_all(&[!byte[0]]).expect("Failed to write byte");
    file.sync_all().expect("Failed to sync");
}

/// Cuts the file at `path` down to `len` bytes.
pub fn truncate_file(path: &Path, len: u64) {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open segment file");
    file.set_len(len).expect("Failed to truncate");
}

/// Returns the length of the file at `path`.
pub fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path)
        .expect("Failed to stat segment file")
        .len()
}
