//! Integration tests for the QR generation API
//!
//! These tests verify the entire application stack including:
//! - HTTP routing and authentication
//! - The generation pipelines (static, dynamic, bulk)
//! - Database operations and usage accounting
//! - Artifact writes on a temporary filesystem

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};
use tower::ServiceExt;

// Import from the main crate
use qrgen::config::AppConfig;
use qrgen::database::{self, init_db, insert_api_key, AppState};
use qrgen::model::ApiKeyRecord;
use qrgen::route::create_app;
use qrgen::storage::ArtifactStore;

const BASE_URL: &str = "http://localhost:8080";

/// Helper to create a test application with temporary database and data dir
///
/// The state is returned alongside the router so tests can seed API keys
/// and inspect records directly.
fn setup_test_app() -> (axum::Router, AppState, NamedTempFile, TempDir) {
    let temp_db = NamedTempFile::new().expect("Failed to create temp file");
    let data_dir = TempDir::new().expect("Failed to create temp data dir");

    let db_path = temp_db.path().to_str().unwrap();
    let db = init_db(db_path).expect("Failed to initialize test database");

    let config = AppConfig {
        port: 8080,
        database_url: db_path.to_string(),
        api_base_url: BASE_URL.to_string(),
        data_dir: data_dir.path().to_path_buf(),
    };

    let state = AppState {
        db: Arc::new(db),
        config: Arc::new(config),
        store: ArtifactStore::new(data_dir.path()),
        http: reqwest::Client::new(),
    };

    let app = create_app(state.clone());

    (app, state, temp_db, data_dir)
}

fn seed_key(state: &AppState) -> ApiKeyRecord {
    insert_api_key(&state.db, "test-key").expect("Failed to seed API key")
}

/// Helper function to parse response body as JSON
async fn response_json(body: Body) -> Value {
    let bytes = body
        .collect()
        .await
        .expect("Failed to read response body")
        .to_bytes();

    serde_json::from_slice(&bytes).expect("Failed to parse JSON")
}

fn api_request(method: &str, uri: &str, key: &str, payload: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-API-Key", key);
    match payload {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_static_generate_success() {
    let (app, state, _temp_db, data_dir) = setup_test_app();
    let key = seed_key(&state);

    let response = app
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/generate",
            &key.key,
            Some(json!({ "data": "hello" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response.into_body()).await;
    assert_eq!(body["success"], true);

    let qr = &body["data"]["qrCode"];
    let hash = qr["metadata"]["generatedHash"].as_str().unwrap();
    assert_eq!(hash.len(), 32);
    assert_eq!(qr["metadata"]["size"], 256);
    assert_eq!(qr["metadata"]["format"], "png");
    assert_eq!(qr["metadata"]["formatSubstituted"], false);

    // The artifact sits at the hash-derived path under the principal's dir
    let artifact = data_dir
        .path()
        .join(format!("static/qrcode/{}/static/{}.png", key.id, hash));
    assert!(artifact.exists());

    // Counters: first use sets total/daily/monthly to 1
    let updated = database::find_api_key(&state.db, &key.key).unwrap().unwrap();
    assert_eq!(updated.usage_count, 1);
    assert_eq!(updated.daily_usage_count, 1);
    assert_eq!(updated.monthly_usage_count, 1);
    assert!(updated.last_used_at.is_some());
}

#[tokio::test]
async fn test_static_generate_missing_data() {
    let (app, state, _temp_db, _data_dir) = setup_test_app();
    let key = seed_key(&state);

    let response = app
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/generate",
            &key.key,
            Some(json!({ "size": 256 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response.into_body()).await;
    assert_eq!(body["success"], false);

    // Validation fires before any side effect
    let untouched = database::find_api_key(&state.db, &key.key).unwrap().unwrap();
    assert_eq!(untouched.usage_count, 0);
}

#[tokio::test]
async fn test_static_generate_is_idempotent_by_path() {
    let (app, state, _temp_db, _data_dir) = setup_test_app();
    let key = seed_key(&state);

    let payload = json!({ "data": "same payload", "size": 128 });

    let first = app
        .clone()
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/generate",
            &key.key,
            Some(payload.clone()),
        ))
        .await
        .unwrap();
    let second = app
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/generate",
            &key.key,
            Some(payload),
        ))
        .await
        .unwrap();

    let first_body = response_json(first.into_body()).await;
    let second_body = response_json(second.into_body()).await;

    assert_eq!(
        first_body["data"]["qrCode"]["filePath"],
        second_body["data"]["qrCode"]["filePath"]
    );

    // Both generations are accounted even though the path is shared
    let updated = database::find_api_key(&state.db, &key.key).unwrap().unwrap();
    assert_eq!(updated.usage_count, 2);
}

#[tokio::test]
async fn test_static_generate_svg() {
    let (app, state, _temp_db, data_dir) = setup_test_app();
    let key = seed_key(&state);

    let response = app
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/generate",
            &key.key,
            Some(json!({ "data": "vector please", "format": "svg" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response.into_body()).await;
    let file_path = body["data"]["qrCode"]["filePath"].as_str().unwrap();
    assert!(file_path.ends_with(".svg"));

    let on_disk = data_dir
        .path()
        .join(file_path.trim_start_matches("/data/"));
    let contents = std::fs::read_to_string(on_disk).unwrap();
    assert!(contents.starts_with("<?xml"));
}

#[tokio::test]
async fn test_dynamic_create_success() {
    let (app, state, _temp_db, data_dir) = setup_test_app();
    let key = seed_key(&state);

    let response = app
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/dynamic/create",
            &key.key,
            Some(json!({ "targetUrl": "https://example.com" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response.into_body()).await;
    let qr = &body["data"]["qrCode"];

    let short_id = qr["shortId"].as_str().unwrap();
    assert_eq!(short_id.len(), 10);
    assert_eq!(
        qr["originalDataEncoded"],
        format!("{}/r/{}", BASE_URL, short_id)
    );
    assert_eq!(qr["analytics"]["totalScans"], 0);
    assert_eq!(qr["apiKey"]["usage"]["total"], 1);

    // The rendered image encodes the redirect URL, stored under dynamic/
    let artifact = data_dir
        .path()
        .join(format!("static/qrcode/{}/dynamic/{}.png", key.id, short_id));
    assert!(artifact.exists());

    let record = database::find_dynamic_code(&state.db, short_id)
        .unwrap()
        .unwrap();
    assert_eq!(record.target_url, "https://example.com");
    assert_eq!(
        record.original_data_encoded,
        format!("{}/r/{}", BASE_URL, short_id)
    );
}

#[tokio::test]
async fn test_dynamic_create_invalid_target_url() {
    let (app, state, _temp_db, _data_dir) = setup_test_app();
    let key = seed_key(&state);

    let response = app
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/dynamic/create",
            &key.key,
            Some(json!({ "targetUrl": "not a url" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_redirect_records_scan_and_redirects() {
    let (app, state, _temp_db, _data_dir) = setup_test_app();
    let key = seed_key(&state);

    let created = app
        .clone()
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/dynamic/create",
            &key.key,
            Some(json!({ "targetUrl": "https://example.com" })),
        ))
        .await
        .unwrap();
    let body = response_json(created.into_body()).await;
    let short_id = body["data"]["qrCode"]["shortId"].as_str().unwrap().to_string();

    // The redirect is public: no API key on this request
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/r/{}", short_id))
                .header("user-agent", "integration-test")
                .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://example.com"
    );

    let (total, last_scanned) = database::scan_stats(&state.db, &short_id).unwrap();
    assert_eq!(total, 1);
    assert!(last_scanned.is_some());
}

#[tokio::test]
async fn test_redirect_unknown_short_id() {
    let (app, _state, _temp_db, _data_dir) = setup_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/r/doesnotexis")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_repoints_without_rerender() {
    let (app, state, _temp_db, data_dir) = setup_test_app();
    let key = seed_key(&state);

    let created = app
        .clone()
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/dynamic/create",
            &key.key,
            Some(json!({ "targetUrl": "https://example.com/old" })),
        ))
        .await
        .unwrap();
    let body = response_json(created.into_body()).await;
    let short_id = body["data"]["qrCode"]["shortId"].as_str().unwrap().to_string();

    let original_encoded = database::find_dynamic_code(&state.db, &short_id)
        .unwrap()
        .unwrap()
        .original_data_encoded;
    let artifact = data_dir
        .path()
        .join(format!("static/qrcode/{}/dynamic/{}.png", key.id, short_id));
    let original_bytes = std::fs::read(&artifact).unwrap();

    let response = app
        .clone()
        .oneshot(api_request(
            "PUT",
            &format!("/api/v1/qr/dynamic/{}/update", short_id),
            &key.key,
            Some(json!({ "newTargetUrl": "https://example.com/new" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    // Only the stored target changed; the encoded URL and the artifact
    // bytes are untouched
    let record = database::find_dynamic_code(&state.db, &short_id)
        .unwrap()
        .unwrap();
    assert_eq!(record.target_url, "https://example.com/new");
    assert_eq!(record.original_data_encoded, original_encoded);
    assert_eq!(std::fs::read(&artifact).unwrap(), original_bytes);

    // The redirect now follows the new target
    let redirect = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/r/{}", short_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        redirect.headers().get("location").unwrap(),
        "https://example.com/new"
    );
}

#[tokio::test]
async fn test_analytics_reflects_scans_and_updates() {
    let (app, state, _temp_db, _data_dir) = setup_test_app();
    let key = seed_key(&state);

    let created = app
        .clone()
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/dynamic/create",
            &key.key,
            Some(json!({ "targetUrl": "https://example.com/analytics" })),
        ))
        .await
        .unwrap();
    let body = response_json(created.into_body()).await;
    let short_id = body["data"]["qrCode"]["shortId"].as_str().unwrap().to_string();

    // Two scans through the public redirect
    for _ in 0..2 {
        app.clone()
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri(format!("/r/{}", short_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
    }

    // Repoint the target; the scan count must be unaffected
    app.clone()
        .oneshot(api_request(
            "PUT",
            &format!("/api/v1/qr/dynamic/{}/update", short_id),
            &key.key,
            Some(json!({ "newTargetUrl": "https://example.com/after" })),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(api_request(
            "GET",
            &format!("/api/v1/qr/dynamic/{}/analytics", short_id),
            &key.key,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response.into_body()).await;
    let analytics = &body["data"]["analytics"];
    assert_eq!(analytics["totalScans"], 2);
    assert_eq!(analytics["targetUrl"], "https://example.com/after");
    assert!(analytics["lastScanned"].is_string());
}

#[tokio::test]
async fn test_foreign_codes_look_nonexistent() {
    let (app, state, _temp_db, _data_dir) = setup_test_app();
    let owner = seed_key(&state);
    let stranger = insert_api_key(&state.db, "other-key").unwrap();

    let created = app
        .clone()
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/dynamic/create",
            &owner.key,
            Some(json!({ "targetUrl": "https://example.com/private" })),
        ))
        .await
        .unwrap();
    let body = response_json(created.into_body()).await;
    let short_id = body["data"]["qrCode"]["shortId"].as_str().unwrap().to_string();

    // Another principal gets 404, not 403, for both analytics and update
    let analytics = app
        .clone()
        .oneshot(api_request(
            "GET",
            &format!("/api/v1/qr/dynamic/{}/analytics", short_id),
            &stranger.key,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(analytics.status(), StatusCode::NOT_FOUND);

    let update = app
        .clone()
        .oneshot(api_request(
            "PUT",
            &format!("/api/v1/qr/dynamic/{}/update", short_id),
            &stranger.key,
            Some(json!({ "newTargetUrl": "https://evil.example.com" })),
        ))
        .await
        .unwrap();
    assert_eq!(update.status(), StatusCode::NOT_FOUND);

    // The owner's target is untouched by the rejected update
    let record = database::find_dynamic_code(&state.db, &short_id)
        .unwrap()
        .unwrap();
    assert_eq!(record.target_url, "https://example.com/private");

    // But the public redirect works for anyone
    let redirect = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/r/{}", short_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(redirect.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_bulk_skips_malformed_jobs() {
    let (app, state, _temp_db, _data_dir) = setup_test_app();
    let key = seed_key(&state);

    let payload = json!({
        "jobs": [
            { "data": "first" },
            { "size": 128 },
            { "data": "third", "format": "svg" }
        ]
    });

    let response = app
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/bulk/generate",
            &key.key,
            Some(payload),
        ))
        .await
        .unwrap();

    // Partial success still reports success
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response.into_body()).await;
    assert_eq!(body["success"], true);

    let bulk = &body["data"]["bulkRequest"];
    assert_eq!(bulk["totalGenerated"], 2);
    assert_eq!(bulk["qrCodes"].as_array().unwrap().len(), 2);
    assert!(bulk["bulkRequestId"].as_str().unwrap().len() == 8);

    // All artifacts share the batch directory
    let first_path = bulk["qrCodes"][0]["filePath"].as_str().unwrap();
    let bulk_id = bulk["bulkRequestId"].as_str().unwrap();
    assert!(first_path.contains(&format!("/bulk/{}/", bulk_id)));

    // Usage was accounted once for the whole batch, malformed job included
    let updated = database::find_api_key(&state.db, &key.key).unwrap().unwrap();
    assert_eq!(updated.usage_count, 3);
    assert_eq!(updated.daily_usage_count, 3);
}

#[tokio::test]
async fn test_bulk_rejects_empty_job_list() {
    let (app, state, _temp_db, _data_dir) = setup_test_app();
    let key = seed_key(&state);

    let response = app
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/bulk/generate",
            &key.key,
            Some(json!({ "jobs": [] })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_qr_code_by_short_id_and_hash() {
    let (app, state, _temp_db, _data_dir) = setup_test_app();
    let key = seed_key(&state);

    // Dynamic lookup by short id
    let created = app
        .clone()
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/dynamic/create",
            &key.key,
            Some(json!({ "targetUrl": "https://example.com/fetch" })),
        ))
        .await
        .unwrap();
    let body = response_json(created.into_body()).await;
    let short_id = body["data"]["qrCode"]["shortId"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(api_request(
            "GET",
            &format!("/api/v1/qr/{}", short_id),
            &key.key,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["data"]["type"], "dynamic");
    assert_eq!(body["data"]["qrCode"]["targetUrl"], "https://example.com/fetch");

    // Static lookup by content hash
    let generated = app
        .clone()
        .oneshot(api_request(
            "POST",
            "/api/v1/qr/generate",
            &key.key,
            Some(json!({ "data": "fetch me" })),
        ))
        .await
        .unwrap();
    let body = response_json(generated.into_body()).await;
    let hash = body["data"]["qrCode"]["metadata"]["generatedHash"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(api_request(
            "GET",
            &format!("/api/v1/qr/{}", hash),
            &key.key,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response.into_body()).await;
    assert_eq!(body["data"]["type"], "static");

    // Unknown id
    let response = app
        .oneshot(api_request("GET", "/api/v1/qr/nosuchthing", &key.key, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
