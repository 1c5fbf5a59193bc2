//! Attachment upload and delivery routes.

use axum::{
    Json, Router,
    body::Body,
    extract::{
        DefaultBodyLimit, Path, State,
        rejection::{BytesRejection, JsonRejection},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::{AppState, extractors::ClientIp, response};
use chatdrop_core::attachment::{
    AttachmentRepository, DraftDescriptor, FileType, RegisteredDraft, UploadError, UploaderContext,
};
use chatdrop_core::sniff::OCTET_STREAM;

/// Longest accepted `channel` or `nickname`, in characters.
pub const MAX_LABEL_CHARS: usize = 255;

/// Creates the attachment routes.
pub fn routes<R: AttachmentRepository + 'static>(max_chunk_bytes: usize) -> Router<AppState<R>> {
    Router::new()
        .route("/attachments/drafts", post(register_drafts::<R>))
        .route(
            "/attachments/{token}",
            post(upload_chunk::<R>)
                .put(upload_chunk::<R>)
                .layer(DefaultBodyLimit::max(max_chunk_bytes)),
        )
        .route("/attachments/view/{token}/{name}", get(view::<R>))
        .route("/attachments/download/{token}/{name}", get(download::<R>))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Uploader identity.
#[derive(Debug, Deserialize)]
pub struct DraftUser {
    /// Display nickname.
    pub nickname: String,
}

/// Request body for registering drafts.
#[derive(Debug, Deserialize)]
pub struct RegisterDraftsRequest {
    /// Channel the files are posted to.
    pub channel: String,
    /// Uploader.
    pub user: DraftUser,
    /// Files about to be uploaded.
    pub drafts: Vec<DraftDescriptor>,
}

impl RegisterDraftsRequest {
    /// Name of the first label longer than [`MAX_LABEL_CHARS`].
    fn oversized_label(&self) -> Option<&'static str> {
        [("channel", &self.channel), ("nickname", &self.user.nickname)]
            .into_iter()
            .find(|(_, value)| value.chars().count() > MAX_LABEL_CHARS)
            .map(|(field, _)| field)
    }
}

/// Response for draft registration.
#[derive(Debug, Serialize)]
pub struct RegisterDraftsResponse {
    /// Always `true`.
    pub success: bool,
    /// Registered drafts with their upload tokens.
    pub drafts: Vec<RegisteredDraft>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/attachments/drafts`
/// Register pending uploads and hand out their tokens.
async fn register_drafts<R: AttachmentRepository + 'static>(
    State(state): State<AppState<R>>,
    ClientIp(ip): ClientIp,
    payload: Result<Json<RegisterDraftsRequest>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => return response::malformed(rejection.status(), &rejection.body_text()),
    };
    if let Some(field) = payload.oversized_label() {
        return response::malformed(
            StatusCode::BAD_REQUEST,
            &format!("{field} exceeds {MAX_LABEL_CHARS} characters"),
        );
    }

    let context = UploaderContext {
        channel: payload.channel,
        nickname: payload.user.nickname,
        ip,
    };

    match state.uploads.register_drafts(&context, payload.drafts).await {
        Ok(drafts) => (
            StatusCode::OK,
            Json(RegisterDraftsResponse {
                success: true,
                drafts,
            }),
        )
            .into_response(),
        Err(e) => response::failure(&e),
    }
}

/// PUT/POST `/attachments/{token}`
/// Accept one chunk described by the `Content-Range` header.
async fn upload_chunk<R: AttachmentRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return response::malformed(rejection.status(), &rejection.body_text()),
    };
    let content_range = headers
        .get(header::CONTENT_RANGE)
        .and_then(|h| h.to_str().ok());

    match state.uploads.upload_chunk(&token, content_range, &body).await {
        Ok(outcome) => response::chunk_accepted(outcome),
        Err(e) => response::failure(&e),
    }
}

/// GET `/attachments/view/{token}/{name}`
/// Serve an image inline.
async fn view<R: AttachmentRepository + 'static>(
    State(state): State<AppState<R>>,
    Path((token, _name)): Path<(String, String)>,
) -> Response {
    deliver(&state, &token, Disposition::Inline).await
}

/// GET `/attachments/download/{token}/{name}`
/// Serve any published file as a download.
async fn download<R: AttachmentRepository + 'static>(
    State(state): State<AppState<R>>,
    Path((token, _name)): Path<(String, String)>,
) -> Response {
    deliver(&state, &token, Disposition::Attachment).await
}

// ============================================================================
// Helper Functions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Inline,
    Attachment,
}

/// Stream a published file.
async fn deliver<R: AttachmentRepository + 'static>(
    state: &AppState<R>,
    token: &str,
    disposition: Disposition,
) -> Response {
    let record = match state.uploads.find_published(token).await {
        Ok(record) => record,
        Err(e) => return response::failure(&e),
    };

    // Only images are viewable inline.
    if disposition == Disposition::Inline && record.file_type != Some(FileType::Image) {
        return response::failure(&UploadError::NotFound);
    }

    let file = match state.uploads.open_published(&record).await {
        Ok(file) => file,
        Err(e) => return response::failure(&e),
    };

    info!(hash = %record.hash, path = %record.path, ?disposition, "Serving attachment");

    let mime = record
        .mime
        .unwrap_or_else(|| OCTET_STREAM.to_string());
    let kind = match disposition {
        Disposition::Inline => "inline",
        Disposition::Attachment => "attachment",
    };
    let content_disposition = format!(
        "{kind}; filename*=UTF-8''{}",
        utf8_percent_encode(&record.name, NON_ALPHANUMERIC)
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_LENGTH, record.size.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response()
}
