//! Segment directory management.
//!
//! ```text
//! <dir_path>/
//! ├─ 000000000.SEG     # sealed
//! ├─ 000000001.SEG     # sealed
//! └─ 000000002.SEG     # active (highest id)
//! ```
//!
//! File names are the zero-padded segment id followed by the configured
//! extension. Entries that carry the extension but do not parse as an id are
//! skipped with a warning; other entries are ignored.

use crate::error::{CoreError, CoreResult};
use crate::position::SegmentId;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Returns the file name of segment `id`, e.g. `000000001.SEG`.
#[must_use]
pub fn segment_file_name(id: SegmentId, extension: &str) -> String {
    format!("{id:09}{extension}")
}

/// The directory holding a WAL's segment files.
#[derive(Debug, Clone)]
pub struct SegmentDir {
    path: PathBuf,
    extension: String,
}

impl SegmentDir {
    /// Opens the directory, creating it and its parents if missing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOptions`] if `path` exists but is not a
    /// directory, or an I/O error.
    pub fn open(path: &Path, extension: &str) -> CoreResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_options(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            extension: extension.to_string(),
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of segment `id`.
    #[must_use]
    pub fn segment_path(&self, id: SegmentId) -> PathBuf {
        self.path.join(segment_file_name(id, &self.extension))
    }

    /// Lists the ids of existing segment files in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn segment_ids(&self) -> CoreResult<Vec<SegmentId>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(self.extension.as_str())) else {
                continue;
            };

            match parse_segment_id(stem) {
                Some(id) => ids.push(id),
                None => warn!(
                    file = %entry.path().display(),
                    "skipping file with segment extension but no segment id"
                ),
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }

    /// Fsyncs the directory so created files survive a crash.
    ///
    /// Directory fsync is a Unix notion; on other platforms this is a no-op.
    #[cfg(unix)]
    pub fn sync(&self) -> CoreResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// Fsyncs the directory so created files survive a crash.
    ///
    /// Directory fsync is a Unix notion; on other platforms this is a no-op.
    #[cfg(not(unix))]
    pub fn sync(&self) -> CoreResult<()> {
        Ok(())
    }
}

fn parse_segment_id(stem: &str) -> Option<SegmentId> {
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}
