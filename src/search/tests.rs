use super::*;
use crate::config::EmbeddingConfig;
use serde_json::json;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DIMENSION: usize = 4;

async fn create_test_engine(server: &MockServer) -> (TempDir, SearchEngine) {
    let temp_dir = TempDir::new().expect("temp dir creates");
    let uri = Url::parse(&server.uri()).expect("mock server URI parses");

    let config = Config {
        embedding: EmbeddingConfig {
            host: uri.host_str().expect("mock server has a host").to_string(),
            port: uri.port().expect("mock server has a port"),
            dimension: DIMENSION,
            batch_size: 2,
            ..EmbeddingConfig::default()
        },
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };

    let engine = SearchEngine::new(&config).await.expect("engine builds");
    (temp_dir, engine)
}

fn embedding_body(vector: &[f32]) -> serde_json::Value {
    json!({ "data": [{ "embedding": vector }] })
}

async fn mount_embedding(server: &MockServer, needle: &str, vector: &[f32]) {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_string_contains(needle))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(vector)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn invalid_limit_is_rejected() {
    let server = MockServer::start().await;
    let (_dir, engine) = create_test_engine(&server).await;

    let request = SearchRequest {
        limit: 0,
        ..SearchRequest::new("anything")
    };
    let error = engine.search(&request).await.expect_err("search must fail");

    assert!(matches!(error, CodevecError::InvalidQuery(_)));
}

#[tokio::test]
async fn out_of_range_threshold_is_rejected() {
    let server = MockServer::start().await;
    let (_dir, engine) = create_test_engine(&server).await;

    for threshold in [-0.1, 1.5] {
        let request = SearchRequest {
            threshold,
            ..SearchRequest::new("anything")
        };
        let error = engine.search(&request).await.expect_err("search must fail");
        assert!(matches!(error, CodevecError::InvalidQuery(_)));
    }
}

#[tokio::test]
async fn embedding_failure_degrades_to_empty_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (_dir, engine) = create_test_engine(&server).await;

    let response = engine
        .search(&SearchRequest::new("select from users"))
        .await
        .expect("search degrades instead of failing");

    assert_eq!(response.total, 0);
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn index_then_search_returns_the_chunk() {
    let server = MockServer::start().await;
    mount_embedding(&server, "def f(): pass", &[1.0, 0.0, 0.0, 0.0]).await;
    mount_embedding(&server, "function definition", &[0.9, 0.1, 0.0, 0.0]).await;

    let (_dir, engine) = create_test_engine(&server).await;

    let indexed = engine
        .index_file("a.py", "def f(): pass", "python", "p1", serde_json::Map::new())
        .await;
    assert!(indexed);

    let request = SearchRequest {
        project_id: Some("p1".to_string()),
        limit: 5,
        threshold: 0.0,
        ..SearchRequest::new("function definition")
    };
    let response = engine.search(&request).await.expect("search succeeds");

    assert_eq!(response.total, response.results.len());
    assert_eq!(response.results.len(), 1);

    let hit = &response.results[0];
    assert_eq!(hit.payload.file_path, "a.py");
    assert_eq!(hit.payload.content, "def f(): pass");
    assert_eq!(hit.payload.language, "python");
    assert!((-1.0..=1.0).contains(&hit.similarity));
}

#[tokio::test]
async fn index_file_reports_failure_when_embedding_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (_dir, engine) = create_test_engine(&server).await;

    let indexed = engine
        .index_file("a.py", "def f(): pass", "python", "p1", serde_json::Map::new())
        .await;

    assert!(!indexed);
    let stats = engine.get_project_stats("p1").await.expect("stats load");
    assert_eq!(stats.record_count, 0);
}

#[tokio::test]
async fn empty_file_indexes_vacuously() {
    let server = MockServer::start().await;
    let (_dir, engine) = create_test_engine(&server).await;

    let indexed = engine
        .index_file("empty.py", "", "python", "p1", serde_json::Map::new())
        .await;

    assert!(indexed);
}

#[tokio::test]
async fn batch_index_captures_per_file_outcomes() {
    let server = MockServer::start().await;
    mount_embedding(&server, "good_one", &[1.0, 0.0, 0.0, 0.0]).await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_string_contains("bad_one"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_embedding(&server, "good_two", &[0.0, 1.0, 0.0, 0.0]).await;

    let (_dir, engine) = create_test_engine(&server).await;

    let files = vec![
        FileToIndex {
            file_path: "one.rs".to_string(),
            content: "fn good_one() {}".to_string(),
            language: "rust".to_string(),
            project_id: "p1".to_string(),
            metadata: serde_json::Map::new(),
        },
        FileToIndex {
            file_path: "two.rs".to_string(),
            content: "fn bad_one() {}".to_string(),
            language: "rust".to_string(),
            project_id: "p1".to_string(),
            metadata: serde_json::Map::new(),
        },
        FileToIndex {
            file_path: "three.rs".to_string(),
            content: "fn good_two() {}".to_string(),
            language: "rust".to_string(),
            project_id: "p1".to_string(),
            metadata: serde_json::Map::new(),
        },
    ];

    let report = engine.batch_index_files(&files).await;

    assert_eq!(report.successful, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("two.rs[0]"));
}

#[tokio::test]
async fn metadata_supplies_file_type_and_function_name() {
    let server = MockServer::start().await;
    mount_embedding(&server, "class Parser", &[0.5, 0.5, 0.0, 0.0]).await;
    mount_embedding(&server, "parser class", &[0.5, 0.5, 0.0, 0.0]).await;

    let (_dir, engine) = create_test_engine(&server).await;

    let mut metadata = serde_json::Map::new();
    metadata.insert("file_type".to_string(), json!("source"));
    metadata.insert("function_name".to_string(), json!("Parser"));

    let indexed = engine
        .index_file("parser.py", "class Parser: ...", "python", "p1", metadata)
        .await;
    assert!(indexed);

    let request = SearchRequest {
        threshold: 0.0,
        ..SearchRequest::new("parser class")
    };
    let response = engine.search(&request).await.expect("search succeeds");

    let hit = &response.results[0];
    assert_eq!(hit.payload.file_type, "source");
    assert_eq!(hit.payload.function_name.as_deref(), Some("Parser"));

    let stats = engine.get_all_stats().await.expect("stats load");
    assert_eq!(stats.file_types.get("source"), Some(&1));
}

#[tokio::test]
async fn delete_project_empties_its_stats() {
    let server = MockServer::start().await;
    mount_embedding(&server, "def f(): pass", &[1.0, 0.0, 0.0, 0.0]).await;

    let (_dir, engine) = create_test_engine(&server).await;

    let indexed = engine
        .index_file("a.py", "def f(): pass", "python", "p1", serde_json::Map::new())
        .await;
    assert!(indexed);

    assert!(engine.delete_project("p1").await);

    let stats = engine.get_project_stats("p1").await.expect("stats load");
    assert_eq!(stats.record_count, 0);
}
