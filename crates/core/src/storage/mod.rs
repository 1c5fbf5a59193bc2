//! Attachment storage on the local filesystem.
//!
//! Every path handled here is relative to a single attachment root:
//!
//! ```text
//! <root>/
//! ├── temp/<hash>                        in-progress uploads
//! └── <YYYYMM>/<digest>.<uniq>.<ext>     published attachments
//! ```
//!
//! Chunks are written with positioned writes into the temp file, published
//! files are moved into place with a single `rename`, which is atomic within
//! one filesystem.

mod config;
mod error;
mod service;

pub use config::StorageConfig;
pub use error::StorageError;
pub use service::{StorageService, TEMP_DIR};
