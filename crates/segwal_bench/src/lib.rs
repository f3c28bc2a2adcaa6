//! Benchmark utilities.

#![warn(missing_docs)]

use rand::Rng;
use segwal_core::{Wal, WalOptions};
use tempfile::TempDir;

/// Generate random payload data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` random payloads of `size` bytes each.
pub fn random_records(count: usize, size: usize) -> Vec<Vec<u8>> {
    (0..count).map(|_| random_data(size)).collect()
}

/// Opens a WAL in a fresh temporary directory.
///
/// The directory is returned alongside and must outlive the WAL.
pub fn temp_wal(segment_size: u64) -> (TempDir, Wal) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let wal = Wal::open(
        WalOptions::new()
            .dir_path(dir.path())
            .segment_size(segment_size),
    )
    .expect("Failed to open WAL");
    (dir, wal)
}
