//! Upload service: draft registration, chunk receipt and finalization.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::coverage::Coverage;
use super::error::UploadError;
use super::locks::ChunkLocks;
use super::naming::{
    Uniqueifier, bucket_for, candidate_hash, extension_of, published_key, resolve_extension,
};
use super::range::ContentRange;
use super::types::{
    AttachmentRecord, ChunkOutcome, DraftDescriptor, FileType, NewDraft, Publication,
    PublishedFile, RegisteredDraft, UploaderContext,
};
use super::urls::AttachmentUrls;
use crate::clock::{Clock, Entropy, OsEntropy, SystemClock};
use crate::sniff::{self, OCTET_STREAM, SNIFF_LEN};
use crate::storage::StorageService;
use crate::token::TokenCodec;

/// Candidates tried per descriptor before hash allocation gives up.
pub const MAX_HASH_ATTEMPTS: u32 = 32;

/// Repository trait for attachment record persistence.
///
/// This trait is implemented by the db crate to provide actual database operations.
pub trait AttachmentRepository: Send + Sync {
    /// Insert a draft unless its hash is taken.
    ///
    /// Returns `false` when a record with the same hash already exists; the
    /// existing record is left untouched.
    fn insert_draft(
        &self,
        draft: NewDraft,
    ) -> impl std::future::Future<Output = Result<bool, UploadError>> + Send;

    /// Check whether a record with this hash exists.
    fn exists(
        &self,
        hash: &str,
    ) -> impl std::future::Future<Output = Result<bool, UploadError>> + Send;

    /// Find a record by hash.
    fn find_by_hash(
        &self,
        hash: &str,
    ) -> impl std::future::Future<Output = Result<Option<AttachmentRecord>, UploadError>> + Send;

    /// Publish a draft in a single update.
    ///
    /// Returns `false` if no draft with this hash exists.
    fn publish(
        &self,
        hash: &str,
        publication: Publication,
    ) -> impl std::future::Future<Output = Result<bool, UploadError>> + Send;

    /// Delete a record by hash.
    fn delete_by_hash(
        &self,
        hash: &str,
    ) -> impl std::future::Future<Output = Result<bool, UploadError>> + Send;
}

/// Resumable chunked upload service.
pub struct UploadService<R: AttachmentRepository> {
    repo: Arc<R>,
    storage: Arc<StorageService>,
    tokens: Arc<dyn TokenCodec>,
    urls: AttachmentUrls,
    clock: Arc<dyn Clock>,
    entropy: Arc<dyn Entropy>,
    uniqueifier: Uniqueifier,
    locks: ChunkLocks,
}

impl<R: AttachmentRepository> UploadService<R> {
    /// Create a new upload service using the wall clock and OS entropy.
    #[must_use]
    pub fn new(
        repo: Arc<R>,
        storage: Arc<StorageService>,
        tokens: Arc<dyn TokenCodec>,
        urls: AttachmentUrls,
    ) -> Self {
        Self {
            repo,
            storage,
            tokens,
            urls,
            clock: Arc::new(SystemClock),
            entropy: Arc::new(OsEntropy),
            uniqueifier: Uniqueifier::new(),
            locks: ChunkLocks::new(),
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the randomness source.
    #[must_use]
    pub fn with_entropy(mut self, entropy: Arc<dyn Entropy>) -> Self {
        self.entropy = entropy;
        self
    }

    /// The record store.
    #[must_use]
    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// The file store.
    #[must_use]
    pub fn storage(&self) -> &Arc<StorageService> {
        &self.storage
    }

    /// Register a batch of pending uploads.
    ///
    /// Each descriptor gets a freshly allocated hash, a draft record pointing
    /// at `temp/<hash>`, and an opaque token for subsequent chunk requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails, no free hash is found, or
    /// a token cannot be encoded. Drafts registered before the failure remain.
    pub async fn register_drafts(
        &self,
        context: &UploaderContext,
        drafts: Vec<DraftDescriptor>,
    ) -> Result<Vec<RegisteredDraft>, UploadError> {
        let mut registered = Vec::with_capacity(drafts.len());

        for descriptor in drafts {
            let hash = self.allocate(context, &descriptor).await?;
            let token = self.tokens.encode(&hash)?;
            debug!(hash = %hash, name = %descriptor.name, size = descriptor.size, "Draft registered");
            registered.push(RegisteredDraft {
                name: descriptor.name,
                size: descriptor.size,
                token,
            });
        }

        info!(channel = %context.channel, count = registered.len(), "Drafts registered");
        Ok(registered)
    }

    /// Claim a unique hash for one descriptor by probe-then-insert.
    ///
    /// The insert is itself insert-if-absent, so two registrations racing on
    /// the same candidate cannot both succeed.
    async fn allocate(
        &self,
        context: &UploaderContext,
        descriptor: &DraftDescriptor,
    ) -> Result<String, UploadError> {
        for attempt in 1..=MAX_HASH_ATTEMPTS {
            let now = self.clock.now();
            let candidate = candidate_hash(descriptor, now, self.entropy.next_u64());

            if self.repo.exists(&candidate).await? {
                debug!(attempt, "Candidate hash taken");
                continue;
            }

            let draft = NewDraft {
                hash: candidate.clone(),
                channel: context.channel.clone(),
                nickname: context.nickname.clone(),
                ip: context.ip.clone(),
                name: descriptor.name.clone(),
                path: StorageService::temp_key(&candidate),
                size: descriptor.size,
                reg_date: now,
                exp_date: None,
            };
            if self.repo.insert_draft(draft).await? {
                return Ok(candidate);
            }
            debug!(attempt, "Candidate hash claimed concurrently");
        }

        error!(name = %descriptor.name, "Hash allocation exhausted");
        Err(UploadError::HashSpaceExhausted {
            attempts: MAX_HASH_ATTEMPTS,
        })
    }

    /// Accept one chunk of an upload.
    ///
    /// Checks, in order: the token resolves to a draft, the range is
    /// well-formed, its total matches the draft size, and its length matches
    /// the payload. The chunk is then written at its offset. Once every byte
    /// of the upload has been received the file is finalized in the same call.
    ///
    /// Chunks for one hash are serialised; different hashes never contend.
    ///
    /// # Errors
    ///
    /// Returns a rejection (`NotFound`, `InvalidContentRange`,
    /// `InvalidFileSize`, `InvalidChunkSize`, `InvalidUploadedSize`) or an
    /// infrastructure error.
    pub async fn upload_chunk(
        &self,
        token: &str,
        content_range: Option<&str>,
        payload: &[u8],
    ) -> Result<ChunkOutcome, UploadError> {
        let hash = self.tokens.decode(token).map_err(|_| UploadError::NotFound)?;
        let _guard = self.locks.acquire(&hash).await;

        let record = self
            .repo
            .find_by_hash(&hash)
            .await?
            .filter(|r| !r.is_published())
            .ok_or(UploadError::NotFound)?;

        let range: ContentRange = content_range
            .ok_or(UploadError::InvalidContentRange)?
            .parse()?;

        if range.total != record.size {
            warn!(hash = %hash, expected = record.size, declared = range.total, "Chunk total mismatch");
            return Err(UploadError::InvalidFileSize {
                expected: record.size,
                declared: range.total,
            });
        }

        let actual = payload.len() as u64;
        if range.len() != actual {
            warn!(hash = %hash, range = %range, bytes = actual, "Chunk length mismatch");
            return Err(UploadError::InvalidChunkSize {
                expected: range.len(),
                actual,
            });
        }

        let coverage = self.write_chunk(&record, range, payload).await?;

        if coverage.covers(record.size) {
            return self
                .finalize(token, record)
                .await
                .map(ChunkOutcome::Published);
        }

        let uploaded = self.storage.size(&record.path).await?;
        debug!(hash = %hash, range = %range, uploaded, "Chunk accepted");
        Ok(ChunkOutcome::Progress { uploaded })
    }

    /// Write a chunk into the temp file and record it in the ledger.
    async fn write_chunk(
        &self,
        record: &AttachmentRecord,
        range: ContentRange,
        payload: &[u8],
    ) -> Result<Coverage, UploadError> {
        let ledger = ledger_key(&record.path);
        let mut coverage = match self.storage.read_optional(&ledger).await? {
            Some(bytes) => Coverage::from_bytes(&bytes),
            None => Coverage::new(),
        };

        // A head chunk restarts the upload unless it fills the gap in front
        // of ranges that arrived earlier.
        let restart = range.start == 0
            && coverage
                .ranges()
                .first()
                .is_none_or(|(start, _)| *start == 0);
        if restart {
            self.storage.truncate(&record.path).await?;
            coverage = Coverage::new();
        }

        self.storage
            .write_chunk(&record.path, range.start, payload)
            .await?;
        coverage.insert(range.start, range.end);
        self.storage.replace(&ledger, &coverage.to_bytes()).await?;

        Ok(coverage)
    }

    /// Verify, relocate and publish a fully received upload.
    async fn finalize(
        &self,
        token: &str,
        record: AttachmentRecord,
    ) -> Result<PublishedFile, UploadError> {
        let temp = record.path.clone();

        let actual = self.storage.size(&temp).await?;
        if actual != record.size {
            warn!(
                hash = %record.hash,
                expected = record.size,
                actual,
                "Uploaded size mismatch, rolling back"
            );
            self.rollback(&record).await?;
            return Err(UploadError::InvalidUploadedSize {
                expected: record.size,
                actual,
            });
        }

        let digest = self.storage.digest(&temp).await?;
        let bucket = bucket_for(record.reg_date);
        self.storage.ensure_bucket(&bucket).await?;

        let extension = match extension_of(&record.name) {
            Some(ext) => ext,
            None => {
                let head = self.storage.read_head(&temp, SNIFF_LEN).await?;
                resolve_extension(&record.name, &sniff::mime_of(&head))
            }
        };
        let uniqueifier = self.uniqueifier.next(self.clock.now());
        let path = published_key(&bucket, &digest, &uniqueifier, &extension);

        self.storage.rename(&temp, &path).await?;
        self.storage.apply_file_mode(&path).await?;

        let publication = self.inspect(&record.hash, path).await?;
        let path = publication.path.clone();
        if !self.repo.publish(&record.hash, publication).await? {
            error!(hash = %record.hash, path = %path, "Draft vanished before publish");
            return Err(UploadError::repository("draft vanished before publish"));
        }
        self.storage.remove(&ledger_key(&temp)).await?;

        let published = self
            .repo
            .find_by_hash(&record.hash)
            .await?
            .ok_or(UploadError::NotFound)?;

        info!(hash = %record.hash, path = %path, digest = %digest, size = record.size, "Upload published");
        Ok(self.describe(token, &published))
    }

    /// Sniff the relocated file.
    async fn inspect(&self, hash: &str, path: String) -> Result<Publication, UploadError> {
        let head = self.storage.read_head(&path, SNIFF_LEN).await?;
        let mime = sniff::mime_of(&head);
        let mut file_type = sniff::type_of(&mime);

        let (mut width, mut height) = (None, None);
        if file_type == FileType::Image {
            match sniff::dimensions_of(self.storage.resolve(&path)?).await {
                Ok((w, h)) => {
                    width = Some(w);
                    height = Some(h);
                }
                Err(e) => {
                    warn!(hash = %hash, mime = %mime, error = %e, "Image probe failed, storing as file");
                    file_type = FileType::File;
                }
            }
        }

        Ok(Publication {
            path,
            mime,
            file_type,
            width,
            height,
        })
    }

    /// Delete the temp file, its ledger and the draft record.
    async fn rollback(&self, record: &AttachmentRecord) -> Result<(), UploadError> {
        self.storage.remove(&record.path).await?;
        self.storage.remove(&ledger_key(&record.path)).await?;
        self.repo.delete_by_hash(&record.hash).await?;
        info!(hash = %record.hash, "Upload rolled back");
        Ok(())
    }

    /// Client-facing payload for a published record.
    fn describe(&self, token: &str, record: &AttachmentRecord) -> PublishedFile {
        let file_type = record.file_type.unwrap_or(FileType::File);
        let is_image = file_type == FileType::Image;
        let mime = record.mime.as_deref().unwrap_or(OCTET_STREAM);

        PublishedFile {
            name: record.name.clone(),
            size: record.size,
            file_type,
            extension: resolve_extension(&record.name, mime),
            width: record.width.filter(|_| is_image),
            height: record.height.filter(|_| is_image),
            view: is_image.then(|| self.urls.view(token, &record.name)),
            download: self.urls.download(token, &record.name),
        }
    }

    /// Resolve a token to its published record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the token is invalid or the record is missing or
    /// still a draft.
    pub async fn find_published(&self, token: &str) -> Result<AttachmentRecord, UploadError> {
        let hash = self.tokens.decode(token).map_err(|_| UploadError::NotFound)?;
        self.repo
            .find_by_hash(&hash)
            .await?
            .filter(AttachmentRecord::is_published)
            .ok_or(UploadError::NotFound)
    }

    /// Open the stored file of a published record for reading.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file is missing from storage.
    pub async fn open_published(
        &self,
        record: &AttachmentRecord,
    ) -> Result<tokio::fs::File, UploadError> {
        self.storage.open(&record.path).await.map_err(|e| match e {
            crate::storage::StorageError::NotFound { .. } => UploadError::NotFound,
            other => other.into(),
        })
    }
}

/// Storage key of the coverage ledger kept beside a temp file.
fn ledger_key(temp: &str) -> String {
    format!("{temp}.part")
}
