//! Application configuration management.

use std::path::PathBuf;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Attachment storage configuration.
    pub storage: StorageSettings,
    /// Token codec configuration.
    pub token: TokenSettings,
    /// Public URL configuration.
    pub urls: UrlSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest chunk body accepted by the upload endpoint.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_chunk_bytes: default_max_chunk_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_chunk_bytes() -> usize {
    8 * 1024 * 1024
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Attachment storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Attachment root; temp files and month buckets live beneath it.
    pub root: PathBuf,
    /// Permission bits for bucket directories.
    #[serde(default = "default_dir_mode")]
    pub dir_mode: u32,
    /// Permission bits for published files.
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,
}

fn default_dir_mode() -> u32 {
    0o770
}

fn default_file_mode() -> u32 {
    0o660
}

/// Token codec configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSettings {
    /// Secret the token key is derived from.
    pub secret: String,
}

/// Public URL configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlSettings {
    /// Externally reachable base of the API, without trailing slash.
    pub public_base_url: String,
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        layered()?.try_deserialize()
    }
}

impl DatabaseConfig {
    /// Loads only the `database` section, for tools that need no other settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the section is missing or invalid.
    pub fn load() -> Result<Self, config::ConfigError> {
        layered()?.get("database")
    }
}

/// `config/default`, then `config/{RUN_MODE}`, then `CHATDROP__*` variables.
fn layered() -> Result<config::Config, config::ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

    config::Config::builder()
        .add_source(config::File::with_name("config/default").required(false))
        .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
        .add_source(
            config::Environment::with_prefix("CHATDROP")
                .separator("__")
                .try_parsing(true),
        )
        .build()
}
