// Storage module
// Record types and the SQLite-backed vector store

pub mod vector_store;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use vector_store::VectorStore;

/// Composite identity of a stored embedding: one chunk of one file in one
/// project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub project_id: String,
    pub file_path: String,
    pub chunk_index: u32,
}

impl RecordKey {
    #[inline]
    pub fn new(project_id: &str, file_path: &str, chunk_index: u32) -> Self {
        Self {
            project_id: project_id.to_string(),
            file_path: file_path.to_string(),
            chunk_index,
        }
    }

    /// Flat string form used as the table's primary key.
    #[inline]
    pub fn storage_key(&self) -> String {
        format!("{}:{}:{}", self.project_id, self.file_path, self.chunk_index)
    }
}

/// A record to be written to the store. A second write with the same key
/// fully replaces the first.
#[derive(Debug, Clone)]
pub struct NewEmbeddingRecord {
    pub key: RecordKey,
    pub embedding: Vec<f32>,
    pub source_code: String,
    pub language: String,
    pub file_type: String,
    pub function_name: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Optional predicates narrowing a nearest-neighbor query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilters {
    pub project_id: Option<String>,
    pub language: Option<String>,
}

/// Chunk payload returned from a query, without the stored vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkPayload {
    pub project_id: String,
    pub file_path: String,
    pub chunk_index: u32,
    pub content: String,
    pub language: String,
    pub file_type: String,
    pub function_name: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub last_modified: i64,
}

/// One ranked query result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub payload: ChunkPayload,
    pub similarity: f32,
}

/// Summary of one project's stored records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectStats {
    pub record_count: i64,
    pub distinct_languages: i64,
    pub total_characters: i64,
    pub last_modified: Option<i64>,
}

/// Store-wide aggregate counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    pub total_records: i64,
    pub file_types: BTreeMap<String, i64>,
    pub languages: BTreeMap<String, i64>,
    pub projects: BTreeMap<String, i64>,
}
