//! Core upload logic for Chatdrop.
//!
//! This crate contains pure upload logic with ZERO web or database dependencies.
//! Record types, protocol checks, naming and file handling live here.
//!
//! # Modules
//!
//! - `attachment` - Draft registration, chunk receipt and finalization
//! - `storage` - Local attachment root: temp files, buckets, atomic moves
//! - `token` - Opaque client tokens for attachment hashes
//! - `sniff` - MIME type, coarse category and image dimensions from file bytes
//! - `clock` - Injected time and randomness sources

pub mod attachment;
pub mod clock;
pub mod sniff;
pub mod storage;
pub mod token;
