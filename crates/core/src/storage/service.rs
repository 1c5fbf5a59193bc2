//! Storage service implementation over the local filesystem.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use super::config::StorageConfig;
use super::error::StorageError;

/// Directory holding in-progress uploads, relative to the root.
pub const TEMP_DIR: &str = "temp";

/// Read buffer used while digesting files.
const DIGEST_BUFFER_SIZE: usize = 64 * 1024;

/// Storage service for attachment files.
#[derive(Debug, Clone)]
pub struct StorageService {
    config: StorageConfig,
}

impl StorageService {
    /// Create a new storage service from configuration.
    ///
    /// The attachment root and its temp directory are created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be created.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        if config.root.as_os_str().is_empty() {
            return Err(StorageError::configuration("attachment root is empty"));
        }
        std::fs::create_dir_all(config.root.join(TEMP_DIR))?;
        Ok(Self { config })
    }

    /// Storage key of the temp file for a hash.
    #[must_use]
    pub fn temp_key(hash: &str) -> String {
        format!("{TEMP_DIR}/{hash}")
    }

    /// Resolve a storage key to an absolute path beneath the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty, absolute, or escapes the root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let well_formed = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.config.root.join(relative))
    }

    /// Create the file at `key`, or truncate it to zero length.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub async fn truncate(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        File::create(&path).await?;
        Ok(())
    }

    /// Write `bytes` at `offset` into the file at `key`.
    ///
    /// The file is created if missing and never truncated; bytes beyond the
    /// written range keep their previous content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub async fn write_chunk(&self, key: &str, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;

        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(key, offset, bytes = bytes.len(), "Chunk written");
        Ok(())
    }

    /// Current on-disk size of the file at `key`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    pub async fn size(&self, key: &str) -> Result<u64, StorageError> {
        let path = self.resolve(key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StorageError::from_io(e, key))?;
        Ok(meta.len())
    }

    /// SHA-256 of the full file content, lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn digest(&self, key: &str) -> Result<String, StorageError> {
        let path = self.resolve(key)?;
        let mut file = File::open(&path)
            .await
            .map_err(|e| StorageError::from_io(e, key))?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; DIGEST_BUFFER_SIZE];
        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Create a bucket directory if it does not exist yet.
    ///
    /// Concurrent creators of the same bucket all succeed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let path = self.resolve(bucket)?;
        match fs::create_dir(&path).await {
            Ok(()) => {
                set_mode(&path, self.config.dir_mode).await?;
                debug!(bucket, "Bucket created");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically move the file at `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        fs::rename(&source, &target)
            .await
            .map_err(|e| StorageError::from_io(e, from))
    }

    /// Apply the published file permissions to `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if permissions cannot be changed.
    pub async fn apply_file_mode(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        set_mode(&path, self.config.file_mode).await
    }

    /// Delete the file at `key`. A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a file exists in storage.
    pub async fn exists(&self, key: &str) -> bool {
        match self.resolve(key) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Open the file at `key` for reading.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    pub async fn open(&self, key: &str) -> Result<File, StorageError> {
        let path = self.resolve(key)?;
        File::open(&path)
            .await
            .map_err(|e| StorageError::from_io(e, key))
    }

    /// Read the first `limit` bytes of the file at `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn read_head(&self, key: &str, limit: usize) -> Result<Vec<u8>, StorageError> {
        let file = self.open(key).await?;
        let mut head = Vec::with_capacity(limit);
        file.take(limit as u64).read_to_end(&mut head).await?;
        Ok(head)
    }

    /// Replace the whole content of `key` with `bytes`.
    ///
    /// The content is written to a sibling file and renamed over `key`, so
    /// readers observe either the old or the new content.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or renamed.
    pub async fn replace(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let target = self.resolve(key)?;
        let staging = self.resolve(&format!("{key}.tmp"))?;

        let mut file = File::create(&staging).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        fs::rename(&staging, &target).await?;
        Ok(())
    }

    /// Read the whole file at `key`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read_optional(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Get the attachment root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), StorageError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service() -> (TempDir, StorageService) {
        let dir = TempDir::new().expect("temp dir");
        let service =
            StorageService::from_config(StorageConfig::new(dir.path())).expect("should create service");
        (dir, service)
    }

    #[test]
    fn test_from_config_creates_temp_dir() {
        let (dir, _service) = service();
        assert!(dir.path().join(TEMP_DIR).is_dir());
    }

    #[test]
    fn test_temp_key() {
        assert_eq!(StorageService::temp_key("abc"), "temp/abc");
    }

    #[test]
    fn test_resolve_rejects_escaping_keys() {
        let (_dir, service) = service();
        assert!(service.resolve("temp/abc").is_ok());
        assert!(service.resolve("202601/x.y.txt").is_ok());

        for key in ["", "/etc/passwd", "../outside", "temp/../../x", "./temp/abc"] {
            assert!(
                matches!(service.resolve(key), Err(StorageError::InvalidKey(_))),
                "{key} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_write_chunks_out_of_order() {
        let (_dir, service) = service();
        let key = StorageService::temp_key("h1");

        service.write_chunk(&key, 0, b"hello").await.expect("first chunk");
        service.write_chunk(&key, 8, b"rld").await.expect("last chunk");
        assert_eq!(service.size(&key).await.expect("size"), 11);

        service.write_chunk(&key, 5, b" wo").await.expect("middle chunk");
        let content = std::fs::read(service.resolve(&key).expect("path")).expect("read");
        assert_eq!(content, b"hello world");
    }

    #[tokio::test]
    async fn test_truncate_discards_content() {
        let (_dir, service) = service();
        let key = StorageService::temp_key("h2");

        service.write_chunk(&key, 0, b"0123456789").await.expect("write");
        service.write_chunk(&key, 0, b"ab").await.expect("overwrite");
        assert_eq!(service.size(&key).await.expect("size"), 10);

        service.truncate(&key).await.expect("truncate");
        service.write_chunk(&key, 0, b"ab").await.expect("restart");
        assert_eq!(service.size(&key).await.expect("size"), 2);
    }

    #[tokio::test]
    async fn test_write_at_offset_creates_missing_file() {
        let (_dir, service) = service();
        let key = StorageService::temp_key("h3");

        service.write_chunk(&key, 4, b"tail").await.expect("write");
        assert_eq!(service.size(&key).await.expect("size"), 8);
    }

    #[tokio::test]
    async fn test_size_of_missing_file_is_not_found() {
        let (_dir, service) = service();
        let err = service.size("temp/missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_digest_is_sha256() {
        let (_dir, service) = service();
        let key = StorageService::temp_key("h4");
        service.write_chunk(&key, 0, b"test").await.expect("write");

        assert_eq!(
            service.digest(&key).await.expect("digest"),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }

    #[tokio::test]
    async fn test_ensure_bucket_is_idempotent() {
        let (dir, service) = service();

        let (a, b) = tokio::join!(service.ensure_bucket("202601"), service.ensure_bucket("202601"));
        a.expect("first creator");
        b.expect("second creator");
        service.ensure_bucket("202601").await.expect("again");

        assert!(dir.path().join("202601").is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bucket_and_file_modes() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().expect("temp dir");
        let config = StorageConfig::new(dir.path())
            .with_dir_mode(0o750)
            .with_file_mode(0o640);
        let service = StorageService::from_config(config).expect("service");

        service.ensure_bucket("202602").await.expect("bucket");
        let mode = std::fs::metadata(dir.path().join("202602"))
            .expect("meta")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o750);

        let key = StorageService::temp_key("h5");
        service.write_chunk(&key, 0, b"data").await.expect("write");
        service.rename(&key, "202602/f.bin").await.expect("rename");
        service.apply_file_mode("202602/f.bin").await.expect("chmod");
        let mode = std::fs::metadata(dir.path().join("202602/f.bin"))
            .expect("meta")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[tokio::test]
    async fn test_rename_moves_file() {
        let (_dir, service) = service();
        let key = StorageService::temp_key("h6");
        service.write_chunk(&key, 0, b"data").await.expect("write");
        service.ensure_bucket("202603").await.expect("bucket");

        service.rename(&key, "202603/d.bin").await.expect("rename");
        assert!(!service.exists(&key).await);
        assert!(service.exists("202603/d.bin").await);
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_ok() {
        let (_dir, service) = service();
        service.remove("temp/never-written").await.expect("remove");
    }

    #[tokio::test]
    async fn test_replace_and_read_optional() {
        let (_dir, service) = service();
        let key = "temp/h8.part";

        assert_eq!(service.read_optional(key).await.expect("read"), None);

        service.replace(key, b"first").await.expect("replace");
        service.replace(key, b"2nd").await.expect("replace");
        assert_eq!(service.read_optional(key).await.expect("read"), Some(b"2nd".to_vec()));
        assert!(!service.exists("temp/h8.part.tmp").await);
    }

    #[tokio::test]
    async fn test_read_head_limits_bytes() {
        let (_dir, service) = service();
        let key = StorageService::temp_key("h7");
        service.write_chunk(&key, 0, b"0123456789").await.expect("write");

        assert_eq!(service.read_head(&key, 4).await.expect("head"), b"0123");
        assert_eq!(service.read_head(&key, 64).await.expect("head"), b"0123456789");
    }
}
