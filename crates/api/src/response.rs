//! Response shaping for upload outcomes.
//!
//! Every body carries `success`. Rejections carry their reason code as
//! `message`; infrastructure failures all report `INTERNAL_ERROR`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use chatdrop_core::attachment::{ChunkOutcome, UploadError};
use chatdrop_shared::AppError;

/// HTTP status for an upload error.
#[must_use]
pub fn status_for(err: &UploadError) -> StatusCode {
    match err {
        UploadError::NotFound => StatusCode::NOT_FOUND,
        UploadError::InvalidContentRange
        | UploadError::InvalidFileSize { .. }
        | UploadError::InvalidChunkSize { .. } => StatusCode::BAD_REQUEST,
        UploadError::InvalidUploadedSize { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        other => StatusCode::from_u16(infrastructure(other).status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Classify an infrastructure failure.
#[must_use]
pub fn infrastructure(err: &UploadError) -> AppError {
    match err {
        UploadError::Storage(e) => AppError::Storage(e.to_string()),
        UploadError::Repository(msg) => AppError::Database(msg.clone()),
        other => AppError::Internal(other.to_string()),
    }
}

/// Failure response for an upload error.
#[must_use]
pub fn failure(err: &UploadError) -> Response {
    let message = if err.is_rejection() {
        warn!(reason = err.reason_code(), error = %err, "Upload request rejected");
        err.reason_code()
    } else {
        let app_err = infrastructure(err);
        error!(error = %app_err, "Upload request failed");
        app_err.error_code()
    };

    (
        status_for(err),
        Json(json!({
            "success": false,
            "message": message
        })),
    )
        .into_response()
}

/// Reason code for a body larger than the route accepts.
pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";

/// Reason code for a request body or field the API cannot accept.
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

/// Failure response for a request turned away before it reaches the upload
/// service, keeping the framework's status code.
#[must_use]
pub fn malformed(status: StatusCode, detail: &str) -> Response {
    let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
        PAYLOAD_TOO_LARGE
    } else {
        INVALID_REQUEST
    };
    warn!(%status, reason = message, detail, "Request rejected");

    (
        status,
        Json(json!({
            "success": false,
            "message": message
        })),
    )
        .into_response()
}

/// Success response for an accepted chunk.
#[must_use]
pub fn chunk_accepted(outcome: ChunkOutcome) -> Response {
    let body = match outcome {
        ChunkOutcome::Progress { uploaded } => json!({
            "success": true,
            "uploaded": uploaded
        }),
        ChunkOutcome::Published(file) => json!({
            "success": true,
            "file": file
        }),
    };
    (StatusCode::OK, Json(body)).into_response()
}
