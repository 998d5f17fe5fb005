use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodevecError>;

#[derive(Error, Debug)]
pub enum CodevecError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Malformed embedding response: {0}")]
    EmbeddingMalformed(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Accelerated vector search unavailable: {0}")]
    AcceleratedPathUnavailable(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod search;
pub mod store;

pub use search::SearchEngine;
