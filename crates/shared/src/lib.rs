//! Shared configuration and error types for Chatdrop.
//!
//! This crate provides common types used across all other crates:
//! - Layered application configuration
//! - Application-wide infrastructure error types

pub mod config;
pub mod error;

pub use config::{AppConfig, DatabaseConfig, ServerConfig, StorageSettings, TokenSettings, UrlSettings};
pub use error::AppError;
