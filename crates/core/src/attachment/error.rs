//! Attachment error types.

use thiserror::Error;

use crate::storage::StorageError;
use crate::token::TokenError;

/// Reason code sent for every infrastructure failure.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// Upload operation errors.
///
/// The first five variants are protocol rejections the client can act on;
/// the rest are infrastructure failures fatal to the current request only.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Token undecodable, or no draft behind it.
    #[error("attachment not found")]
    NotFound,

    /// Missing or malformed `Content-Range`.
    #[error("invalid content range")]
    InvalidContentRange,

    /// Declared total differs from the registered size.
    #[error("file size mismatch: registered {expected}, declared {declared}")]
    InvalidFileSize {
        /// Size registered with the draft.
        expected: u64,
        /// Total declared by the chunk.
        declared: u64,
    },

    /// Range length differs from the payload length.
    #[error("chunk size mismatch: range covers {expected} bytes, payload has {actual}")]
    InvalidChunkSize {
        /// Length implied by the range.
        expected: u64,
        /// Payload length.
        actual: u64,
    },

    /// Completed temp file differs from the registered size.
    #[error("uploaded size mismatch: expected {expected}, found {actual}")]
    InvalidUploadedSize {
        /// Size registered with the draft.
        expected: u64,
        /// Size found on disk.
        actual: u64,
    },

    /// No free hash found within the attempt budget.
    #[error("could not allocate a unique hash after {attempts} attempts")]
    HashSpaceExhausted {
        /// Candidates tried.
        attempts: u32,
    },

    /// Token encoding failed.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Repository operation failed.
    #[error("repository error: {0}")]
    Repository(String),
}

impl UploadError {
    /// Create a repository error.
    #[must_use]
    pub fn repository(msg: impl Into<String>) -> Self {
        Self::Repository(msg.into())
    }

    /// Wire reason code reported to the client.
    #[must_use]
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidContentRange => "INVALID_HTTP_CONTENT_RANGE",
            Self::InvalidFileSize { .. } => "INVALID_FILE_SIZE",
            Self::InvalidChunkSize { .. } => "INVALID_CHUNK_SIZE",
            Self::InvalidUploadedSize { .. } => "INVALID_UPLOADED_SIZE",
            Self::HashSpaceExhausted { .. }
            | Self::Token(_)
            | Self::Storage(_)
            | Self::Repository(_) => INTERNAL_ERROR,
        }
    }

    /// Whether this is a protocol rejection rather than an infrastructure failure.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::InvalidContentRange
                | Self::InvalidFileSize { .. }
                | Self::InvalidChunkSize { .. }
                | Self::InvalidUploadedSize { .. }
        )
    }
}
