//! In-memory attachment record store.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::error::UploadError;
use super::service::AttachmentRepository;
use super::types::{AttachmentRecord, AttachmentStatus, NewDraft, Publication};

/// Record store backed by a concurrent map.
///
/// Used by tests and single-process deployments without a database.
#[derive(Debug, Default)]
pub struct MemoryAttachmentRepository {
    records: DashMap<String, AttachmentRecord>,
}

impl MemoryAttachmentRepository {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All stored hashes.
    #[must_use]
    pub fn hashes(&self) -> Vec<String> {
        self.records.iter().map(|r| r.key().clone()).collect()
    }
}

impl AttachmentRepository for MemoryAttachmentRepository {
    async fn insert_draft(&self, draft: NewDraft) -> Result<bool, UploadError> {
        match self.records.entry(draft.hash.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(AttachmentRecord::from_draft(draft));
                Ok(true)
            }
        }
    }

    async fn exists(&self, hash: &str) -> Result<bool, UploadError> {
        Ok(self.records.contains_key(hash))
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<AttachmentRecord>, UploadError> {
        Ok(self.records.get(hash).map(|r| r.value().clone()))
    }

    async fn publish(&self, hash: &str, publication: Publication) -> Result<bool, UploadError> {
        let Some(mut record) = self.records.get_mut(hash) else {
            return Ok(false);
        };
        if record.is_published() {
            return Ok(false);
        }
        record.path = publication.path;
        record.mime = Some(publication.mime);
        record.file_type = Some(publication.file_type);
        record.width = publication.width;
        record.height = publication.height;
        record.status = AttachmentStatus::Published;
        Ok(true)
    }

    async fn delete_by_hash(&self, hash: &str) -> Result<bool, UploadError> {
        Ok(self.records.remove(hash).is_some())
    }
}
