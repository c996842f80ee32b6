//! HTTP endpoint tests driven through the router with in-memory storage.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use etalon_api::{build_router, AppState, ServerConfig};
use etalon_db::test_fixtures::reference_sample;
use etalon_db::{InMemoryAnalysisQueue, InMemoryReferenceStore};
use etalon_engine::{AnalysisQueue, EngineConfig, Pipeline, ReferenceStore, RuleBasedNormalizer};

const TEXT: &str = "Кошка сидит на окне. Собака спит у двери.";

struct TestApp {
    router: axum::Router,
    store: Arc<InMemoryReferenceStore>,
    queue: Arc<InMemoryAnalysisQueue>,
}

fn setup_app() -> TestApp {
    let store = Arc::new(InMemoryReferenceStore::new());
    let queue = Arc::new(InMemoryAnalysisQueue::new());
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(RuleBasedNormalizer::new()),
        store.clone(),
        EngineConfig::default(),
    ));
    let router = build_router(
        AppState::new(pipeline, queue.clone()),
        &ServerConfig::default(),
    );
    TestApp {
        router,
        store,
        queue,
    }
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

#[tokio::test]
async fn test_health_reports_corpus_size() {
    let app = setup_app();
    app.store
        .upsert_all(&[reference_sample(Uuid::new_v4(), 0, &[&["кошка"]], 1.0)])
        .await
        .unwrap();

    let response = app.router.oneshot(request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["corpus_size"], 1);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_analyze_flags_copied_text() {
    let app = setup_app();
    let copy = Uuid::new_v4();

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/v1/analyze",
            json!([
                {"text": TEXT, "label": "1"},
                {"id": copy, "text": TEXT, "label": "?"}
            ]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let flagged = body["report"]["flagged"].as_array().unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0]["textId"], copy.to_string());
    assert_eq!(flagged[0]["weight"], 1.0);
    assert_eq!(body["report"]["fragmentCount"], 2);
    assert_eq!(body["report"]["texts"][0]["text"], TEXT);
    let fragments = body["fragments"].as_array().unwrap();
    assert_eq!(fragments.len(), 2);
    assert!(fragments.iter().all(|f| f["textId"].is_string()));

    assert_eq!(app.store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_analyze_accepts_themed_batch() {
    let app = setup_app();

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/v1/analyze",
            json!({"theme": "animals", "items": [{"text": TEXT, "label": 0}]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.get_theme("animals").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_analyze_rejects_invalid_label() {
    let app = setup_app();

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/v1/analyze",
            json!([{"text": TEXT, "label": "maybe"}]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert!(body["error"].is_string());
    assert_eq!(app.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_analyze_rejects_empty_text() {
    let app = setup_app();

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/v1/analyze",
            json!([{"text": TEXT, "label": "1"}, {"text": "   ", "label": "?"}]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("Empty text"));
    assert_eq!(app.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_analyze_rejects_empty_batch() {
    let app = setup_app();

    let response = app
        .router
        .oneshot(json_request("POST", "/api/v1/analyze", json!([])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_and_poll_analysis() {
    let app = setup_app();

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/analyses",
            json!([{"text": TEXT, "label": "?"}]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "pending");
    let id: Uuid = body["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(app.queue.pending_count().await.unwrap(), 1);

    let response = app
        .router
        .oneshot(request("GET", &format!("/api/v1/analyses/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["id"], id.to_string());
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn test_unknown_analysis_is_404() {
    let app = setup_app();

    let response = app
        .router
        .oneshot(request(
            "GET",
            &format!("/api/v1/analyses/{}", Uuid::new_v4()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_corpus_import_export_and_clear() {
    let app = setup_app();
    let mut themed = reference_sample(Uuid::new_v4(), 0, &[&["кошка", "окно"]], 1.0);
    themed.theme = Some("animals".to_string());
    let plain = reference_sample(Uuid::new_v4(), 0, &[&["река"]], 0.0);

    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/corpus",
            serde_json::to_value(vec![themed.clone(), plain]).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["received"], 2);
    assert_eq!(body["changed"], 2);

    let response = app
        .router
        .clone()
        .oneshot(request("GET", "/api/v1/corpus?theme=animals"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let samples = body.as_array().unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0]["id"], themed.id.to_string());

    let response = app
        .router
        .clone()
        .oneshot(request("GET", "/api/v1/corpus/stats"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["count"], 2);

    let response = app
        .router
        .oneshot(request("DELETE", "/api/v1/corpus"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(app.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_corpus_import_rejects_negative_part() {
    let app = setup_app();
    let mut sample = reference_sample(Uuid::new_v4(), 0, &[&["кошка"]], 1.0);
    sample.part = -1;

    let response = app
        .router
        .oneshot(json_request(
            "POST",
            "/api/v1/corpus",
            serde_json::to_value(vec![sample]).unwrap(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.store.count().await.unwrap(), 0);
}
