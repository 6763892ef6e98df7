//! HTTP tests for the resource, chat, upload and health routes.
//!
//! Every router is backed by the in-memory repository, so status mapping and
//! response shapes are checked without a database.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::Router;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use nomadhub_core::repository::PersistenceError;
use nomadhub_core::resource::Resource;
use nomadhub_core::schema::Validate;
use nomadhub_runtime::{ActionService, QueryService};
use nomadhub_testing::fixtures::{Hub, Region, Review, HUB_ID, REGION_ID};
use nomadhub_testing::{InMemoryRepository, RecordingRevalidationBus};
use nomadhub_web::handlers::{
    chat_router, health_router, resource_router, revalidation_router, upload_router, LocalObjectStorage,
    ResourceState, RevalidationState, UploadPolicy, UploadState,
};
use nomadhub_web::{correlation_id_layer, Sessions, TrustedHeaderResolver, CORRELATION_ID_HEADER};
use serde_json::{json, Value};
use std::sync::Arc;

// ============================================================================
// Test Fixtures
// ============================================================================

const USER: HeaderName = HeaderName::from_static("x-user-id");

fn as_user(id: &'static str) -> HeaderValue {
    HeaderValue::from_static(id)
}

fn correlation_header() -> HeaderName {
    HeaderName::from_bytes(CORRELATION_ID_HEADER.as_bytes()).expect("valid header name")
}

fn sessions() -> Sessions {
    Arc::new(TrustedHeaderResolver::new())
}

struct Harness<R: Resource> {
    repo: Arc<InMemoryRepository<R>>,
    bus: Arc<RecordingRevalidationBus>,
    state: ResourceState<R>,
}

fn harness<R: Resource + Validate>(repo: InMemoryRepository<R>) -> Harness<R> {
    let repo = Arc::new(repo);
    let bus = Arc::new(RecordingRevalidationBus::new());
    let state = ResourceState {
        queries: QueryService::new(repo.clone()),
        actions: ActionService::new(repo.clone(), bus.clone()),
        sessions: sessions(),
    };
    Harness { repo, bus, state }
}

fn reviews() -> Harness<Review> {
    harness(
        InMemoryRepository::with_rows(vec![
            Review::new("r-1", HUB_ID, 5).by("alice"),
            Review::new("r-2", HUB_ID, 3).by("alice"),
            Review::new("r-3", HUB_ID, 1).by("bob"),
        ])
        .with_parents(vec![Hub::new(HUB_ID, "Medellin", REGION_ID)]),
    )
}

fn server(router: Router) -> TestServer {
    TestServer::new(router.layer(correlation_id_layer())).expect("test server")
}

// ============================================================================
// Resource routes
// ============================================================================

#[tokio::test]
async fn test_list_is_scoped_to_caller() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server.get("/api/reviews").add_header(USER, as_user("alice")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["reviews"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_list_without_rows_is_empty_array() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server.get("/api/reviews").add_header(USER, as_user("carol")).await;

    response.assert_status_ok();
    response.assert_json(&json!({ "reviews": [] }));
}

#[tokio::test]
async fn test_missing_session_is_401() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server.get("/api/reviews").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    response.assert_json(&json!({ "error": "Unauthorized" }));
    assert_eq!(h.repo.list_count(), 0);
}

#[tokio::test]
async fn test_get_by_id_wraps_under_singular() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server.get("/api/reviews/r-1").add_header(USER, as_user("alice")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["review"]["id"], "r-1");
    assert_eq!(body["review"]["rating"], 5);
}

#[tokio::test]
async fn test_other_users_row_is_404() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server.get("/api/reviews/r-3").add_header(USER, as_user("alice")).await;

    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({ "error": "Review not found" }));
}

#[tokio::test]
async fn test_sentinel_id_is_404_without_store_access() {
    let h = reviews();
    h.repo.fail_with(PersistenceError::Database("must not be called".into()));
    let server = server(resource_router(h.state));

    let response = server
        .get("/api/reviews/optimistic")
        .add_header(USER, as_user("alice"))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_returns_201_and_revalidates() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server
        .post("/api/reviews")
        .add_header(USER, as_user("alice"))
        .json(&json!({ "hub_id": HUB_ID, "rating": 4, "user_id": "mallory" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["review"]["user_id"], "alice");
    assert_eq!(body["review"]["rating"], 4);
    assert_eq!(h.repo.insert_count(), 1);
    assert_eq!(h.bus.paths(), vec!["/reviews".to_string()]);
}

#[tokio::test]
async fn test_invalid_payload_is_400_without_writes() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server
        .post("/api/reviews")
        .add_header(USER, as_user("alice"))
        .json(&json!({ "hub_id": HUB_ID, "rating": 9 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].is_string());
    assert_eq!(h.repo.mutation_count(), 0);
    assert!(h.bus.paths().is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server
        .post("/api/reviews")
        .add_header(USER, as_user("alice"))
        .text("{ rating: ")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "Invalid JSON body" }));
}

#[tokio::test]
async fn test_update_takes_id_from_path() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server
        .put("/api/reviews/r-2")
        .add_header(USER, as_user("alice"))
        .json(&json!({ "id": "r-1", "hub_id": HUB_ID, "rating": 1, "comment": "Noisy" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["review"]["id"], "r-2");
    assert_eq!(body["review"]["comment"], "Noisy");
    let untouched = h.repo.rows().into_iter().find(|r| r.id == "r-1").unwrap();
    assert_eq!(untouched.rating, 5);
}

#[tokio::test]
async fn test_update_of_other_users_row_is_404() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server
        .put("/api/reviews/r-3")
        .add_header(USER, as_user("alice"))
        .json(&json!({ "hub_id": HUB_ID, "rating": 2 }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(h.repo.rows().into_iter().find(|r| r.id == "r-3").unwrap().rating, 1);
}

#[tokio::test]
async fn test_delete_returns_deleted_row() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server.delete("/api/reviews/r-1").add_header(USER, as_user("alice")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["review"]["id"], "r-1");
    assert_eq!(h.repo.rows().len(), 2);
}

#[tokio::test]
async fn test_store_failure_is_500_with_message() {
    let h = reviews();
    h.repo.fail_with(PersistenceError::Database("duplicate key value".into()));
    let server = server(resource_router(h.state));

    let response = server
        .post("/api/reviews")
        .add_header(USER, as_user("alice"))
        .json(&json!({ "hub_id": HUB_ID, "rating": 2 }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    response.assert_json(&json!({ "error": "duplicate key value" }));
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let h = reviews();
    let server = server(resource_router(h.state));

    let response = server
        .get("/api/reviews")
        .add_header(USER, as_user("alice"))
        .add_header(correlation_header(), HeaderValue::from_static("trace-9"))
        .await;

    assert_eq!(response.header(correlation_header()), "trace-9");
}

// ============================================================================
// Chat routes
// ============================================================================

#[tokio::test]
async fn test_chat_is_returned_as_bare_fields() {
    let h = harness(InMemoryRepository::with_rows(vec![Region::new(REGION_ID, "Andes")]));
    let server = server(chat_router(h.state));

    let response = server
        .get(&format!("/api/regions/{REGION_ID}"))
        .add_header(USER, as_user("alice"))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({ "id": REGION_ID, "name": "Andes" }));
}

#[tokio::test]
async fn test_missing_chat_is_404() {
    let h = harness(InMemoryRepository::<Region>::new());
    let server = server(chat_router(h.state));

    let response = server.get("/api/regions/nope").add_header(USER, as_user("alice")).await;

    response.assert_status(StatusCode::NOT_FOUND);
    response.assert_json(&json!({ "error": "Region not found" }));
}

// ============================================================================
// Uploads
// ============================================================================

fn upload_server(dir: &tempfile::TempDir, max_bytes: usize) -> TestServer {
    server(upload_router(UploadState {
        storage: Arc::new(LocalObjectStorage::new(dir.path())),
        policy: UploadPolicy::new(max_bytes),
        sessions: sessions(),
    }))
}

#[tokio::test]
async fn test_upload_stores_file_under_user() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = upload_server(&dir, 1024);
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"%PDF-1.7".to_vec())
            .file_name("visa scan.pdf")
            .mime_type("application/pdf"),
    );

    let response = server
        .post("/api/files/upload")
        .add_header(USER, as_user("alice"))
        .multipart(form)
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let path = body["path"].as_str().unwrap();
    assert!(path.starts_with("alice/"));
    assert!(path.ends_with("-visa_scan.pdf"));
    assert_eq!(body["size"], 8);
    assert!(dir.path().join(path).exists());
}

#[tokio::test]
async fn test_upload_without_file_is_400() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = upload_server(&dir, 1024);
    let form = MultipartForm::new().add_text("note", "hello");

    let response = server
        .post("/api/files/upload")
        .add_header(USER, as_user("alice"))
        .multipart(form)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "No file uploaded" }));
}

#[tokio::test]
async fn test_upload_with_disallowed_type_is_400() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = upload_server(&dir, 1024);
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"<script>".to_vec())
            .file_name("x.html")
            .mime_type("text/html"),
    );

    let response = server
        .post("/api/files/upload")
        .add_header(USER, as_user("alice"))
        .multipart(form)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_json(&json!({ "error": "Unsupported file type: text/html" }));
}

#[tokio::test]
async fn test_upload_requires_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let server = upload_server(&dir, 1024);
    let form = MultipartForm::new().add_part("file", Part::bytes(b"x".to_vec()).mime_type("image/png"));

    let response = server.post("/api/files/upload").multipart(form).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Revalidations and health
// ============================================================================

#[tokio::test]
async fn test_revalidation_stream_requires_session() {
    let server = server(revalidation_router(RevalidationState {
        bus: Arc::new(RecordingRevalidationBus::new()),
        sessions: sessions(),
    }));

    let response = server.get("/api/revalidations").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_liveness_and_readiness_without_probes() {
    let server = server(health_router(Vec::new()));

    let live = server.get("/health").await;
    live.assert_status_ok();
    let body: Value = live.json();
    assert_eq!(body["status"], "ok");

    let ready = server.get("/ready").await;
    ready.assert_status_ok();
    let body: Value = ready.json();
    assert_eq!(body["status"], "Healthy");
}
