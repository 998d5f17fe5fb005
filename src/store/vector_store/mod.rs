
use std::cmp::Ordering;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embeddings::cosine_similarity;
use crate::store::{
    ChunkPayload, IndexStats, NewEmbeddingRecord, ProjectStats, QueryFilters, SearchHit,
};
use crate::{CodevecError, Result};

/// sqlite-vec extension name probed at startup.
const VEC_EXTENSION: &str = "vec0";

/// index_metadata key recording the table's vector dimension, fixed at
/// creation.
const DIMENSION_KEY: &str = "vector_dimension";

/// Durable keyed storage of embedding vectors with nearest-neighbor search.
///
/// One of two retrieval strategies is selected when the store is opened, by
/// probing whether the sqlite-vec extension can be loaded, and stays fixed
/// for the store's lifetime.
pub struct VectorStore {
    pool: SqlitePool,
    dimension: usize,
    strategy: Box<dyn NearestNeighborSearch>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("dimension", &self.dimension)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

/// Nearest-neighbor retrieval over the `embeddings` table.
///
/// Implementations must return hits ranked by descending similarity and
/// truncated to `limit`; the threshold is applied by the store afterwards.
#[async_trait]
trait NearestNeighborSearch: Send + Sync {
    async fn query(
        &self,
        pool: &SqlitePool,
        query_vector: &[f32],
        filters: &QueryFilters,
        limit: usize,
    ) -> Result<Vec<SearchHit>>;

    fn name(&self) -> &'static str;
}

/// Delegates distance computation and ranking to sqlite-vec's native
/// `vec_distance_cosine` operator.
struct AcceleratedSearch;

/// Loads every filter-matching record and ranks it in process. Exact, and the
/// permanent fallback when the extension is unavailable.
struct ExhaustiveSearch;

#[derive(Debug, Clone, FromRow)]
struct PayloadRow {
    project_id: String,
    file_path: String,
    chunk_index: i64,
    source_code: String,
    language: String,
    file_type: String,
    function_name: Option<String>,
    metadata: String,
    last_modified: i64,
}

#[derive(Debug, Clone, FromRow)]
struct ScoredRow {
    #[sqlx(flatten)]
    payload: PayloadRow,
    distance: f64,
}

#[derive(Debug, Clone, FromRow)]
struct CandidateRow {
    #[sqlx(flatten)]
    payload: PayloadRow,
    embedding: String,
}

impl PayloadRow {
    fn into_payload(self) -> ChunkPayload {
        let metadata = serde_json::from_str(&self.metadata).unwrap_or_default();
        ChunkPayload {
            project_id: self.project_id,
            file_path: self.file_path,
            chunk_index: u32::try_from(self.chunk_index).unwrap_or(0),
            content: self.source_code,
            language: self.language,
            file_type: self.file_type,
            function_name: self.function_name,
            metadata,
            last_modified: self.last_modified,
        }
    }
}

fn storage_error(error: sqlx::Error) -> CodevecError {
    CodevecError::StorageUnavailable(error.to_string())
}

/// Append WHERE clauses for the optional filters to a query string.
fn push_filter_clauses(sql: &mut String, filters: &QueryFilters) {
    let mut clauses = Vec::new();
    if filters.project_id.is_some() {
        clauses.push("project_id = ?");
    }
    if filters.language.is_some() {
        clauses.push("language = ?");
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
}

#[async_trait]
impl NearestNeighborSearch for AcceleratedSearch {
    async fn query(
        &self,
        pool: &SqlitePool,
        query_vector: &[f32],
        filters: &QueryFilters,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut sql = String::from(
            "SELECT project_id, file_path, chunk_index, source_code, language, file_type, \
             function_name, metadata, last_modified, \
             vec_distance_cosine(embedding, ?) AS distance \
             FROM embeddings",
        );
        push_filter_clauses(&mut sql, filters);
        sql.push_str(" ORDER BY distance ASC LIMIT ?");

        let query_json = serde_json::to_string(query_vector)
            .map_err(|e| CodevecError::StorageUnavailable(e.to_string()))?;

        let mut query = sqlx::query_as::<_, ScoredRow>(&sql).bind(query_json);
        if let Some(project_id) = &filters.project_id {
            query = query.bind(project_id);
        }
        if let Some(language) = &filters.language {
            query = query.bind(language);
        }

        let rows = query
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(pool)
            .await
            .map_err(storage_error)?;

        Ok(rows
            .into_iter()
            .map(|row| SearchHit {
                similarity: 1.0 - row.distance as f32,
                payload: row.payload.into_payload(),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "accelerated"
    }
}

#[async_trait]
impl NearestNeighborSearch for ExhaustiveSearch {
    async fn query(
        &self,
        pool: &SqlitePool,
        query_vector: &[f32],
        filters: &QueryFilters,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let mut sql = String::from(
            "SELECT project_id, file_path, chunk_index, source_code, language, file_type, \
             function_name, metadata, last_modified, embedding \
             FROM embeddings",
        );
        push_filter_clauses(&mut sql, filters);

        let mut query = sqlx::query_as::<_, CandidateRow>(&sql);
        if let Some(project_id) = &filters.project_id {
            query = query.bind(project_id);
        }
        if let Some(language) = &filters.language {
            query = query.bind(language);
        }

        let rows = query.fetch_all(pool).await.map_err(storage_error)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let stored: Vec<f32> = match serde_json::from_str(&row.embedding) {
                Ok(vector) => vector,
                Err(error) => {
                    warn!(
                        "Skipping record {}:{}:{} with undecodable embedding: {error}",
                        row.payload.project_id, row.payload.file_path, row.payload.chunk_index
                    );
                    continue;
                }
            };

            hits.push(SearchHit {
                similarity: cosine_similarity(query_vector, &stored),
                payload: row.payload.into_payload(),
            });
        }

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        hits.truncate(limit);

        Ok(hits)
    }

    fn name(&self) -> &'static str {
        "exhaustive"
    }
}

impl VectorStore {
    /// Open (or create) the store at the configured database path.
    ///
    /// Probes for the sqlite-vec extension exactly once; a failed probe is
    /// logged and permanently selects the exact in-process strategy.
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        let path = config.database_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (pool, strategy): (SqlitePool, Box<dyn NearestNeighborSearch>) =
            match Self::probe_accelerated(&path).await {
                Ok(pool) => {
                    info!("sqlite-vec extension loaded; using accelerated nearest-neighbor search");
                    (pool, Box::new(AcceleratedSearch))
                }
                Err(error) => {
                    warn!(
                        "Accelerated vector search unavailable ({error}); \
                         using exact in-process ranking"
                    );
                    let pool = Self::connect(&path, false).await.map_err(storage_error)?;
                    (pool, Box::new(ExhaustiveSearch))
                }
            };

        let store = Self {
            pool,
            dimension: config.embedding.dimension,
            strategy,
        };

        store.init_schema().await?;
        store.enforce_dimension().await?;

        debug!(
            "Vector store open at {} ({} strategy, dimension {})",
            path.display(),
            store.strategy.name(),
            store.dimension
        );

        Ok(store)
    }

    async fn connect(path: &Path, with_vec: bool) -> std::result::Result<SqlitePool, sqlx::Error> {
        let mut options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        if with_vec {
            options = options.extension(VEC_EXTENSION);
        }

        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
    }

    async fn probe_accelerated(path: &Path) -> Result<SqlitePool> {
        let pool = Self::connect(path, true)
            .await
            .map_err(|e| CodevecError::AcceleratedPathUnavailable(e.to_string()))?;

        match sqlx::query_scalar::<_, String>("SELECT vec_version()")
            .fetch_one(&pool)
            .await
        {
            Ok(version) => {
                debug!("sqlite-vec version {version}");
                Ok(pool)
            }
            Err(error) => {
                pool.close().await;
                Err(CodevecError::AcceleratedPathUnavailable(error.to_string()))
            }
        }
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS embeddings (
                key TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                embedding TEXT NOT NULL,
                source_code TEXT NOT NULL,
                language TEXT NOT NULL,
                file_type TEXT NOT NULL,
                function_name TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                last_modified INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_embeddings_project_id ON embeddings(project_id)",
            "CREATE INDEX IF NOT EXISTS idx_embeddings_language ON embeddings(language)",
            "CREATE INDEX IF NOT EXISTS idx_embeddings_file_type ON embeddings(file_type)",
            "CREATE INDEX IF NOT EXISTS idx_embeddings_last_modified ON embeddings(last_modified)",
            "CREATE TABLE IF NOT EXISTS index_metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(storage_error)?;
        }

        Ok(())
    }

    /// The table's vector dimension is fixed when the store is first created;
    /// reopening with a different configured dimension is a configuration
    /// error, never silently truncated or padded.
    async fn enforce_dimension(&self) -> Result<()> {
        match self.get_metadata(DIMENSION_KEY).await? {
            Some(value) => {
                let stored: usize = value.parse().map_err(|_| {
                    CodevecError::StorageUnavailable(format!(
                        "corrupt dimension marker in index_metadata: {value:?}"
                    ))
                })?;
                if stored != self.dimension {
                    return Err(CodevecError::Config(format!(
                        "store was created for {stored}-dimension vectors, \
                         but the configured dimension is {}",
                        self.dimension
                    )));
                }
                Ok(())
            }
            None => {
                self.set_metadata(DIMENSION_KEY, &self.dimension.to_string())
                    .await
            }
        }
    }

    async fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM index_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)
    }

    async fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO index_metadata (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(value)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    #[inline]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Whether the native sqlite-vec path was selected at open time.
    #[inline]
    pub fn is_accelerated(&self) -> bool {
        self.strategy.name() == "accelerated"
    }

    /// Insert or fully replace the record stored under its key.
    #[inline]
    pub async fn upsert(&self, record: NewEmbeddingRecord) -> Result<()> {
        if record.embedding.len() != self.dimension {
            return Err(CodevecError::DimensionMismatch {
                expected: self.dimension,
                actual: record.embedding.len(),
            });
        }

        let embedding_json = serde_json::to_string(&record.embedding)
            .map_err(|e| CodevecError::StorageUnavailable(e.to_string()))?;
        let metadata_json = serde_json::to_string(&record.metadata)
            .map_err(|e| CodevecError::StorageUnavailable(e.to_string()))?;

        sqlx::query(
            "INSERT OR REPLACE INTO embeddings \
             (key, project_id, file_path, chunk_index, embedding, source_code, \
              language, file_type, function_name, metadata, last_modified) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.key.storage_key())
        .bind(&record.key.project_id)
        .bind(&record.key.file_path)
        .bind(i64::from(record.key.chunk_index))
        .bind(embedding_json)
        .bind(&record.source_code)
        .bind(&record.language)
        .bind(&record.file_type)
        .bind(record.function_name.as_deref())
        .bind(metadata_json)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(())
    }

    /// Rank stored records against `query_vector`, keeping the top `limit`
    /// with similarity at or above `threshold`.
    #[inline]
    pub async fn query(
        &self,
        query_vector: &[f32],
        filters: &QueryFilters,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        let mut hits = self
            .strategy
            .query(&self.pool, query_vector, filters, limit)
            .await?;

        hits.retain(|hit| hit.similarity >= threshold);
        Ok(hits)
    }

    /// Summarize one project's stored records.
    #[inline]
    pub async fn project_stats(&self, project_id: &str) -> Result<ProjectStats> {
        let row: (i64, i64, i64, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(DISTINCT language), \
             COALESCE(SUM(LENGTH(source_code)), 0), MAX(last_modified) \
             FROM embeddings WHERE project_id = ?",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        Ok(ProjectStats {
            record_count: row.0,
            distinct_languages: row.1,
            total_characters: row.2,
            last_modified: row.3,
        })
    }

    /// Store-wide record counts grouped by file type, language, and project.
    #[inline]
    pub async fn all_stats(&self) -> Result<IndexStats> {
        let total_records = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM embeddings")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)?;

        let mut stats = IndexStats {
            total_records,
            ..IndexStats::default()
        };

        for (column, target) in [
            ("file_type", &mut stats.file_types),
            ("language", &mut stats.languages),
            ("project_id", &mut stats.projects),
        ] {
            let sql = format!("SELECT {column}, COUNT(*) FROM embeddings GROUP BY {column}");
            let rows: Vec<(String, i64)> = sqlx::query_as(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(storage_error)?;
            target.extend(rows);
        }

        Ok(stats)
    }

    /// Remove every record belonging to a project. Returns the number of
    /// deleted records.
    #[inline]
    pub async fn delete_project(&self, project_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM embeddings WHERE project_id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        info!(
            "Deleted {} records for project {project_id}",
            result.rows_affected()
        );
        Ok(result.rows_affected())
    }
}
