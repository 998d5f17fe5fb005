#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::embeddings::chunking::{ChunkingConfig, split_into_chunks};
use crate::embeddings::provider::{EmbeddingClient, code_input};
use crate::store::{
    IndexStats, NewEmbeddingRecord, ProjectStats, QueryFilters, RecordKey, SearchHit, VectorStore,
};
use crate::{CodevecError, Result};

/// Orchestrates the index and search paths: chunk → embed → store on the way
/// in, embed → rank → filter on the way out.
pub struct SearchEngine {
    embedder: EmbeddingClient,
    store: VectorStore,
    chunking: ChunkingConfig,
}

/// A search request. `limit` must be at least 1 and `threshold` within
/// `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub project_id: Option<String>,
    pub language: Option<String>,
    pub limit: usize,
    pub threshold: f32,
}

impl SearchRequest {
    #[inline]
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            project_id: None,
            language: None,
            limit: 10,
            threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: usize,
}

/// One file submitted for batch indexing.
#[derive(Debug, Clone)]
pub struct FileToIndex {
    pub file_path: String,
    pub content: String,
    pub language: String,
    pub project_id: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Aggregate outcome of a batch index run; individual failures are captured
/// here rather than aborting the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchIndexReport {
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Per-chunk outcome of indexing one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FileIndexOutcome {
    stored: usize,
    failed: usize,
    errors: Vec<String>,
}

impl SearchEngine {
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        let embedder = EmbeddingClient::new(config)?;
        let store = VectorStore::new(config).await?;

        Ok(Self {
            embedder,
            store,
            chunking: config.chunking.clone(),
        })
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn embedder(&self) -> &EmbeddingClient {
        &self.embedder
    }

    /// Index one file: chunk it, embed every chunk, and upsert one record per
    /// successfully embedded chunk.
    ///
    /// Returns `true` only when every chunk was embedded and stored. A `false`
    /// return may leave the file partially indexed; re-indexing the same file
    /// is idempotent by key and converges on full coverage.
    #[inline]
    pub async fn index_file(
        &self,
        file_path: &str,
        content: &str,
        language: &str,
        project_id: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        let outcome = self
            .index_chunks(file_path, content, language, project_id, metadata)
            .await;

        for reason in &outcome.errors {
            error!("Indexing failure: {reason}");
        }

        outcome.failed == 0
    }

    /// Index many files, capturing per-file outcomes.
    #[inline]
    pub async fn batch_index_files(&self, files: &[FileToIndex]) -> BatchIndexReport {
        let mut report = BatchIndexReport::default();

        for file in files {
            let outcome = self
                .index_chunks(
                    &file.file_path,
                    &file.content,
                    &file.language,
                    &file.project_id,
                    file.metadata.clone(),
                )
                .await;

            if outcome.failed == 0 {
                report.successful += 1;
            } else {
                report.failed += 1;
                report.errors.extend(outcome.errors);
            }
        }

        info!(
            "Batch indexing finished: {} succeeded, {} failed",
            report.successful, report.failed
        );
        report
    }

    async fn index_chunks(
        &self,
        file_path: &str,
        content: &str,
        language: &str,
        project_id: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> FileIndexOutcome {
        let chunks = split_into_chunks(content, self.chunking.max_chunk_tokens);
        if chunks.is_empty() {
            debug!("Nothing to index for empty file {file_path}");
            return FileIndexOutcome::default();
        }

        let context = format!("File: {file_path}");
        let inputs: Vec<String> = chunks
            .iter()
            .map(|chunk| code_input(chunk, language, Some(&context)))
            .collect();

        let file_type = metadata
            .get("file_type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(language)
            .to_string();
        let function_name = metadata
            .get("function_name")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);

        let mut outcome = FileIndexOutcome::default();
        let embedded = self.embedder.embed_batch(&inputs).await;

        for (chunk_index, (chunk, embedding)) in chunks.into_iter().zip(embedded).enumerate() {
            let embedding = match embedding {
                Ok(vector) => vector,
                Err(reason) => {
                    outcome.failed += 1;
                    outcome
                        .errors
                        .push(format!("{file_path}[{chunk_index}]: {reason}"));
                    continue;
                }
            };

            let record = NewEmbeddingRecord {
                key: RecordKey::new(project_id, file_path, chunk_index as u32),
                embedding,
                source_code: chunk,
                language: language.to_string(),
                file_type: file_type.clone(),
                function_name: function_name.clone(),
                metadata: metadata.clone(),
            };

            match self.store.upsert(record).await {
                Ok(()) => outcome.stored += 1,
                Err(reason) => {
                    outcome.failed += 1;
                    outcome
                        .errors
                        .push(format!("{file_path}[{chunk_index}]: {reason}"));
                }
            }
        }

        debug!(
            "Indexed {file_path}: {} chunks stored, {} failed",
            outcome.stored, outcome.failed
        );
        outcome
    }

    /// Search stored chunks semantically similar to the query text.
    ///
    /// A failure to embed the query degrades to an empty result set rather
    /// than an error; the provider being down should read as "no results",
    /// not a crashed search path.
    #[inline]
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        if request.limit == 0 {
            return Err(CodevecError::InvalidQuery(
                "limit must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&request.threshold) {
            return Err(CodevecError::InvalidQuery(format!(
                "threshold must be within [0, 1], got {}",
                request.threshold
            )));
        }

        let query_vector = match self.embedder.embed(&request.query).await {
            Ok(vector) => vector,
            Err(reason) => {
                warn!("Query embedding failed, returning empty result set: {reason}");
                return Ok(SearchResponse {
                    results: Vec::new(),
                    total: 0,
                });
            }
        };

        let filters = QueryFilters {
            project_id: request.project_id.clone(),
            language: request.language.clone(),
        };

        let results = self
            .store
            .query(&query_vector, &filters, request.limit, request.threshold)
            .await?;

        Ok(SearchResponse {
            total: results.len(),
            results,
        })
    }

    #[inline]
    pub async fn get_project_stats(&self, project_id: &str) -> Result<ProjectStats> {
        self.store.project_stats(project_id).await
    }

    #[inline]
    pub async fn get_all_stats(&self) -> Result<IndexStats> {
        self.store.all_stats().await
    }

    /// Remove every record belonging to a project. Returns `false` when the
    /// store rejected the deletion.
    #[inline]
    pub async fn delete_project(&self, project_id: &str) -> bool {
        match self.store.delete_project(project_id).await {
            Ok(_) => true,
            Err(reason) => {
                error!("Failed to delete project {project_id}: {reason}");
                false
            }
        }
    }
}
