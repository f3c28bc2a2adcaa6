//! WAL configuration.

use std::path::PathBuf;

/// One byte.
pub const B: u64 = 1;
/// One kibibyte.
pub const KB: u64 = 1024 * B;
/// One mebibyte.
pub const MB: u64 = 1024 * KB;
/// One gibibyte.
pub const GB: u64 = 1024 * MB;

/// Configuration for opening a [`crate::Wal`].
#[derive(Debug, Clone)]
pub struct WalOptions {
    /// Directory holding the segment files. Created on open if missing.
    pub dir_path: PathBuf,

    /// Capacity of one segment file in bytes.
    pub segment_size: u64,

    /// Extension of segment files, including the leading `.`.
    pub segment_file_ext: String,

    /// Whether every write is followed by an fsync.
    ///
    /// Without it, a machine crash may lose recent writes; a process crash
    /// alone does not.
    pub sync: bool,

    /// Number of written bytes after which an fsync is issued when `sync`
    /// is off. 0 disables the threshold.
    pub bytes_per_sync: u32,
}

impl Default for WalOptions {
    fn default() -> Self {
        Self {
            dir_path: std::env::temp_dir(),
            segment_size: GB,
            segment_file_ext: ".SEG".to_string(),
            sync: false,
            bytes_per_sync: 0,
        }
    }
}

impl WalOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the segment directory.
    #[must_use]
    pub fn dir_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir_path = path.into();
        self
    }

    /// Sets the segment capacity.
    #[must_use]
    pub const fn segment_size(mut self, size: u64) -> Self {
        self.segment_size = size;
        self
    }

    /// Sets the segment file extension.
    #[must_use]
    pub fn segment_file_ext(mut self, ext: impl Into<String>) -> Self {
        self.segment_file_ext = ext.into();
        self
    }

    /// Sets whether to fsync after every write.
    #[must_use]
    pub const fn sync(mut self, value: bool) -> Self {
        self.sync = value;
        self
    }

    /// Sets the fsync byte threshold.
    #[must_use]
    pub const fn bytes_per_sync(mut self, bytes: u32) -> Self {
        self.bytes_per_sync = bytes;
        self
    }

    /// Checks the options before anything touches the disk.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::InvalidOptions`] for a zero segment size
    /// or an extension that does not start with `.`.
    pub fn validate(&self) -> crate::CoreResult<()> {
        if self.segment_size == 0 {
            return Err(crate::CoreError::invalid_options(
                "segment size must be greater than zero",
            ));
        }
        if !self.segment_file_ext.starts_with('.') {
            return Err(crate::CoreError::invalid_options(format!(
                "segment file extension must start with '.', got {:?}",
                self.segment_file_ext
            )));
        }
        Ok(())
    }
}
