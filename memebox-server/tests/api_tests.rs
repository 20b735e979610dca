//! Integration tests for memebox-server HTTP endpoints
//!
//! Tests cover:
//! - Status and health endpoints
//! - Catalog listing with lazy description generation
//! - Search (Korean and case-insensitive terms, missing query)
//! - Storage failure reporting

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use memebox_common::config::EnrichmentConfig;
use memebox_common::Catalog;
use memebox_server::collaborators::{CollaboratorError, DescriptionGenerator};
use memebox_server::service::CatalogService;
use memebox_server::store::JsonCatalogStore;
use memebox_server::{build_router, AppState};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

const CAT_QUERY: &str = "%EA%B3%A0%EC%96%91%EC%9D%B4"; // 고양이
const PIKACHU_QUERY: &str = "%ED%94%BC%EC%B9%B4%EC%B8%84"; // 피카츄

/// Generator stub: fails for one optional title, counts calls
struct TestGenerator {
    calls: AtomicUsize,
    fail_title: Option<&'static str>,
    delay: Duration,
    available: bool,
}

impl TestGenerator {
    fn new(fail_title: Option<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail_title,
            delay: Duration::ZERO,
            available: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DescriptionGenerator for TestGenerator {
    fn name(&self) -> &'static str {
        "Test"
    }

    async fn generate(&self, _image_url: &str, title: &str) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_title == Some(title) {
            return Err(CollaboratorError::GenerationFailed("upstream 503".to_string()));
        }
        Ok(format!("AI: {}", title))
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Test helper: catalog path inside a fresh temp dir
fn catalog_path(dir: &TempDir) -> PathBuf {
    dir.path().join("data").join("memes.json")
}

/// Test helper: app over a JSON store at `path`
fn setup_app(path: PathBuf, generator: Arc<TestGenerator>) -> axum::Router {
    let store = Arc::new(JsonCatalogStore::new(path));
    let config = EnrichmentConfig {
        retry_base_ms: 0,
        retry_max_ms: 0,
        ..Default::default()
    };
    let service = CatalogService::new(store, generator, config);
    build_router(AppState::new(service))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn meme_ids(body: &Value) -> Vec<String> {
    body["memes"]
        .as_array()
        .expect("memes array")
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Status / Health
// =============================================================================

#[tokio::test]
async fn test_status_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(catalog_path(&dir), TestGenerator::new(None));

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "Server is running");
    assert!(body["timestamp"].is_string());

    // No catalog interaction
    assert!(!catalog_path(&dir).exists());
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(catalog_path(&dir), TestGenerator::new(None));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "memebox-server");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_number());
    assert_eq!(body["descriptions_enabled"], true);
    assert!(body.get("last_error").is_none());

    // Health never loads or seeds the catalog
    assert!(!catalog_path(&dir).exists());
}

#[tokio::test]
async fn test_health_reports_disabled_descriptions() {
    let dir = TempDir::new().unwrap();
    let generator = Arc::new(TestGenerator {
        calls: AtomicUsize::new(0),
        fail_title: None,
        delay: Duration::ZERO,
        available: false,
    });
    let app = setup_app(catalog_path(&dir), generator.clone());

    let health = extract_json(app.clone().oneshot(get("/health")).await.unwrap().into_body()).await;
    assert_eq!(health["descriptions_enabled"], false);

    // Listing still works, just without new descriptions
    let response = app.oneshot(get("/api/memes")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert!(body["memes"][0].get("ai_description").is_none());
    assert_eq!(generator.calls(), 0);
}

// =============================================================================
// Listing
// =============================================================================

#[tokio::test]
async fn test_list_seeds_and_enriches_catalog() {
    let dir = TempDir::new().unwrap();
    let generator = TestGenerator::new(None);
    let app = setup_app(catalog_path(&dir), generator.clone());

    let response = app.oneshot(get("/api/memes")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(meme_ids(&body), vec!["meme001", "meme002"]);
    assert_eq!(body["memes"][0]["ai_description"], "AI: 화난 고양이");
    assert_eq!(body["memes"][1]["ai_description"], "AI: 놀란 피카츄");
    assert_eq!(body["memes"][0]["imageUrl"], "https://i.imgur.com/hM1LFE5.jpg");
    assert_eq!(body["memes"][0]["uploadDate"], "2024-03-20T12:00:00Z");
    assert_eq!(generator.calls(), 2);

    let persisted = Catalog::parse(&std::fs::read_to_string(catalog_path(&dir)).unwrap()).unwrap();
    assert!(persisted.memes.iter().all(|m| m.ai_description.is_some()));
}

#[tokio::test]
async fn test_repeated_list_does_not_regenerate() {
    let dir = TempDir::new().unwrap();
    let generator = TestGenerator::new(None);
    let app = setup_app(catalog_path(&dir), generator.clone());

    app.clone().oneshot(get("/api/memes")).await.unwrap();
    let response = app.oneshot(get("/api/memes")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn test_list_returns_partial_data_on_generator_failure() {
    let dir = TempDir::new().unwrap();
    let generator = TestGenerator::new(Some("화난 고양이"));
    let app = setup_app(catalog_path(&dir), generator);

    let response = app.oneshot(get("/api/memes")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    // Absent, not null
    assert!(body["memes"][0].get("ai_description").is_none());
    assert_eq!(body["memes"][1]["ai_description"], "AI: 놀란 피카츄");

    let raw = std::fs::read_to_string(catalog_path(&dir)).unwrap();
    let persisted = Catalog::parse(&raw).unwrap();
    assert!(persisted.get("meme001").unwrap().ai_description.is_none());
    assert!(persisted.get("meme002").unwrap().ai_description.is_some());
}

#[tokio::test]
async fn test_enrichment_save_keeps_authored_upload_dates() {
    let dir = TempDir::new().unwrap();
    let path = catalog_path(&dir);
    let mut seed = Catalog::seed();
    seed.memes[0].upload_date = "2024-03-20T21:00:00+09:00".to_string();
    seed.memes[1].upload_date = "2024-03-20".to_string();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, seed.serialize().unwrap()).unwrap();

    let app = setup_app(path.clone(), TestGenerator::new(None));

    let response = app.oneshot(get("/api/memes")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["memes"][0]["uploadDate"], "2024-03-20T21:00:00+09:00");
    assert_eq!(body["memes"][1]["uploadDate"], "2024-03-20");

    let persisted = Catalog::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(persisted.memes[0].upload_date, "2024-03-20T21:00:00+09:00");
    assert_eq!(persisted.memes[1].upload_date, "2024-03-20");
    assert!(persisted.memes.iter().all(|m| m.ai_description.is_some()));
}

#[tokio::test]
async fn test_concurrent_lists_generate_once_per_record() {
    let dir = TempDir::new().unwrap();
    let generator = Arc::new(TestGenerator {
        calls: AtomicUsize::new(0),
        fail_title: None,
        delay: Duration::from_millis(50),
        available: true,
    });
    let app = setup_app(catalog_path(&dir), generator.clone());

    let (a, b) = tokio::join!(
        app.clone().oneshot(get("/api/memes")),
        app.oneshot(get("/api/memes"))
    );
    let a = extract_json(a.unwrap().into_body()).await;
    let b = extract_json(b.unwrap().into_body()).await;

    assert_eq!(generator.calls(), 2);
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_corrupt_catalog_returns_server_error() {
    let dir = TempDir::new().unwrap();
    let path = catalog_path(&dir);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{\"memes\": [").unwrap();

    let app = setup_app(path, TestGenerator::new(None));

    let response = app.clone().oneshot(get("/api/memes")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "STORAGE_UNAVAILABLE");

    let health = extract_json(app.oneshot(get("/health")).await.unwrap().into_body()).await;
    assert!(health["last_error"]
        .as_str()
        .unwrap()
        .contains("Storage unavailable"));
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test]
async fn test_search_korean_terms() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(catalog_path(&dir), TestGenerator::new(None));

    let response = app
        .clone()
        .oneshot(get(&format!("/api/memes/search?q={}", CAT_QUERY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(meme_ids(&body), vec!["meme001"]);

    let response = app
        .oneshot(get(&format!("/api/memes/search?q={}", PIKACHU_QUERY)))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(meme_ids(&body), vec!["meme002"]);
}

#[tokio::test]
async fn test_search_is_case_insensitive_and_does_not_enrich() {
    let dir = TempDir::new().unwrap();
    let generator = TestGenerator::new(None);
    let app = setup_app(catalog_path(&dir), generator.clone());

    let response = app
        .oneshot(get("/api/memes/search?q=SURPRISED"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(meme_ids(&body), vec!["meme002"]);
    assert!(body["memes"][0].get("ai_description").is_none());

    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_search_without_match_is_empty() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(catalog_path(&dir), TestGenerator::new(None));

    let response = app.oneshot(get("/api/memes/search?q=doge")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert!(body["memes"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_search_missing_query_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = setup_app(catalog_path(&dir), TestGenerator::new(None));

    for uri in ["/api/memes/search", "/api/memes/search?q="] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);

        let body = extract_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    // Rejected before the catalog is touched
    assert!(!catalog_path(&dir).exists());
}
