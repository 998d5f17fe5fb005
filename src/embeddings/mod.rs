// Embeddings module
// Chunking, the content-addressed cache, and the embedding provider client

pub mod cache;
pub mod chunking;
pub mod provider;

pub use cache::EmbeddingCache;
pub use chunking::{ChunkingConfig, estimate_token_count, split_into_chunks};
pub use provider::{EmbeddingClient, code_input, cosine_similarity};
