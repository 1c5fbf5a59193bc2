//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for draft registration, chunk upload and file delivery
//! - Request extractors
//! - Response shaping for upload outcomes

pub mod extractors;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use chatdrop_core::attachment::{AttachmentRepository, UploadService};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Default request body limit of the chunk endpoint.
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 8 * 1024 * 1024;

/// Application state shared across handlers.
pub struct AppState<R: AttachmentRepository> {
    /// Upload service.
    pub uploads: Arc<UploadService<R>>,
    /// Largest accepted chunk body.
    pub max_chunk_bytes: usize,
}

impl<R: AttachmentRepository> AppState<R> {
    /// Create state with the default chunk limit.
    #[must_use]
    pub fn new(uploads: Arc<UploadService<R>>) -> Self {
        Self {
            uploads,
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        }
    }

    /// Override the chunk body limit.
    #[must_use]
    pub fn with_max_chunk_bytes(mut self, max_chunk_bytes: usize) -> Self {
        self.max_chunk_bytes = max_chunk_bytes;
        self
    }
}

// Manual impl: `R` itself need not be `Clone`.
impl<R: AttachmentRepository> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            uploads: Arc::clone(&self.uploads),
            max_chunk_bytes: self.max_chunk_bytes,
        }
    }
}

/// Creates the main application router.
pub fn create_router<R: AttachmentRepository + 'static>(state: AppState<R>) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(state.max_chunk_bytes))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
