// Configuration management module
// TOML-backed settings for the embedding provider, chunking, and storage

pub mod settings;

pub use settings::{Config, ConfigError, EmbeddingConfig, StorageConfig};

/// Default data directory for the database and config file.
#[inline]
pub fn get_data_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::data_local_dir()
        .map(|dir| dir.join("codevec"))
        .ok_or(ConfigError::DirectoryError)
}
