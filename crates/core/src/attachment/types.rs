//! Attachment types and data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an attachment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStatus {
    /// Registered, bytes still arriving.
    #[default]
    Draft,
    /// Finalized and stored at its content address.
    Published,
}

impl AttachmentStatus {
    /// Convert to database string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            _ => None,
        }
    }
}

/// Coarse content category derived from the sniffed MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Raster image; carries pixel dimensions.
    Image,
    /// Video container.
    Video,
    /// Audio stream.
    Audio,
    /// Anything else.
    File,
}

impl FileType {
    /// Convert to database string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::File => "file",
        }
    }

    /// Parse from database string value.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "file" => Some(Self::File),
            _ => None,
        }
    }
}

/// A pending upload announced by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftDescriptor {
    /// Original filename.
    pub name: String,
    /// Declared total size in bytes.
    pub size: u64,
}

/// Who is uploading, recorded as provenance.
#[derive(Debug, Clone, Default)]
pub struct UploaderContext {
    /// Chat channel the upload belongs to.
    pub channel: String,
    /// Uploader's nickname.
    pub nickname: String,
    /// Uploader's IP address.
    pub ip: String,
}

/// Input for inserting a draft record.
#[derive(Debug, Clone)]
pub struct NewDraft {
    /// Unique attachment hash.
    pub hash: String,
    /// Channel.
    pub channel: String,
    /// Uploader nickname.
    pub nickname: String,
    /// Uploader IP.
    pub ip: String,
    /// Original filename.
    pub name: String,
    /// Storage key of the temp file.
    pub path: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Registration time.
    pub reg_date: DateTime<Utc>,
    /// Expiry, if any.
    pub exp_date: Option<DateTime<Utc>>,
}

/// Fields written when an attachment is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// Content-addressed storage key.
    pub path: String,
    /// Sniffed MIME type.
    pub mime: String,
    /// Coarse category.
    pub file_type: FileType,
    /// Pixel width (images only).
    pub width: Option<u32>,
    /// Pixel height (images only).
    pub height: Option<u32>,
}

/// Attachment domain model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    /// Unique attachment hash.
    pub hash: String,
    /// Channel.
    pub channel: String,
    /// Uploader nickname.
    pub nickname: String,
    /// Uploader IP.
    pub ip: String,
    /// Original filename.
    pub name: String,
    /// Storage key; `temp/<hash>` until published.
    pub path: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Sniffed MIME type, set on publish.
    pub mime: Option<String>,
    /// Coarse category, set on publish.
    pub file_type: Option<FileType>,
    /// Pixel width (images only).
    pub width: Option<u32>,
    /// Pixel height (images only).
    pub height: Option<u32>,
    /// Lifecycle state.
    pub status: AttachmentStatus,
    /// Registration time; selects the storage bucket.
    pub reg_date: DateTime<Utc>,
    /// Expiry, if any.
    pub exp_date: Option<DateTime<Utc>>,
}

impl AttachmentRecord {
    /// Build the draft record a [`NewDraft`] describes.
    #[must_use]
    pub fn from_draft(draft: NewDraft) -> Self {
        Self {
            hash: draft.hash,
            channel: draft.channel,
            nickname: draft.nickname,
            ip: draft.ip,
            name: draft.name,
            path: draft.path,
            size: draft.size,
            mime: None,
            file_type: None,
            width: None,
            height: None,
            status: AttachmentStatus::Draft,
            reg_date: draft.reg_date,
            exp_date: draft.exp_date,
        }
    }

    /// Whether the record has been published.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == AttachmentStatus::Published
    }
}

/// A registered draft as returned to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredDraft {
    /// Original filename.
    pub name: String,
    /// Declared size.
    pub size: u64,
    /// Opaque upload token.
    pub token: String,
}

/// Client-facing description of a published attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedFile {
    /// Original filename.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Coarse category.
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// Lower-case extension, possibly empty.
    pub extension: String,
    /// Pixel width (images only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Pixel height (images only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Inline view link (images only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    /// Download link.
    pub download: String,
}

/// Result of accepting one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// More bytes are expected; `uploaded` is the temp file's current size.
    Progress {
        /// On-disk size of the temp file.
        uploaded: u64,
    },
    /// The upload completed and was published.
    Published(PublishedFile),
}
