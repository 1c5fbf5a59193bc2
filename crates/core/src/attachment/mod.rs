//! Resumable chunked attachment upload.
//!
//! This module provides:
//! - Draft registration with collision-free hash allocation
//! - Chunk receipt at arbitrary offsets with a per-upload coverage ledger
//! - Finalization into content-addressed, month-bucketed storage
//! - Client-facing tokens and links for published files

mod coverage;
mod error;
mod locks;
mod memory;
mod naming;
mod range;
mod service;
mod types;
mod urls;

pub use coverage::Coverage;
pub use error::{INTERNAL_ERROR, UploadError};
pub use locks::{ChunkGuard, ChunkLocks};
pub use memory::MemoryAttachmentRepository;
pub use naming::{
    Uniqueifier, bucket_for, candidate_hash, extension_of, published_key, resolve_extension,
    to_radix32,
};
pub use range::ContentRange;
pub use service::{AttachmentRepository, MAX_HASH_ATTEMPTS, UploadService};
pub use types::{
    AttachmentRecord, AttachmentStatus, ChunkOutcome, DraftDescriptor, FileType, NewDraft,
    Publication, PublishedFile, RegisteredDraft, UploaderContext,
};
pub use urls::AttachmentUrls;
