//! Storage configuration types.

use std::path::PathBuf;

/// Storage service configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Attachment root directory.
    pub root: PathBuf,
    /// Permission bits applied to newly created bucket directories.
    pub dir_mode: u32,
    /// Permission bits applied to published files.
    pub file_mode: u32,
}

impl StorageConfig {
    /// Default bucket directory mode: owner and group may write.
    pub const DEFAULT_DIR_MODE: u32 = 0o770;
    /// Default published file mode.
    pub const DEFAULT_FILE_MODE: u32 = 0o660;

    /// Create a new storage config with default permissions.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dir_mode: Self::DEFAULT_DIR_MODE,
            file_mode: Self::DEFAULT_FILE_MODE,
        }
    }

    /// Set bucket directory permissions.
    #[must_use]
    pub fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Set published file permissions.
    #[must_use]
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }
}
