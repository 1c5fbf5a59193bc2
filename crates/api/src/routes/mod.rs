//! API route definitions.

use axum::Router;
use chatdrop_core::attachment::AttachmentRepository;

use crate::AppState;

pub mod attachments;
pub mod health;

/// Creates the API router with all routes.
pub fn api_routes<R: AttachmentRepository + 'static>(max_chunk_bytes: usize) -> Router<AppState<R>> {
    Router::new()
        .merge(health::routes())
        .merge(attachments::routes(max_chunk_bytes))
}
