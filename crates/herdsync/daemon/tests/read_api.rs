//! Read API served in-process.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use herdsync_daemon::api::create_router;
use herdsync_daemon::api::rest::state::AppState;
use herdsync_daemon::config::PipelineConfig;
use herdsync_daemon::SyncOrchestrator;
use herdsync_model::testing::constant_artifact;
use herdsync_model::Predictor;
use herdsync_notify::NotificationDispatcher;
use herdsync_store::{Fault, InMemoryTwinStore, StoreError};
use herdsync_types::{TwinAttributes, TwinId};
use serde_json::{json, Value};
use tokio::sync::watch;
use tower::ServiceExt;

fn cow() -> TwinAttributes {
    TwinAttributes::new()
        .with("breed", "Normal Breed")
        .with("rumination_time", 290.0)
        .with("avg_lameness", 2.5)
        .with("estrus_sign", "none")
        .with("ax", 0.0)
        .with("ay", 0.0)
        .with("az", 9.8)
        .with("gx", 0.0)
        .with("gy", 0.0)
        .with("gz", 0.0)
        .with("step_count", 3000)
}

async fn app() -> (Router, Arc<InMemoryTwinStore>, Arc<SyncOrchestrator>) {
    let store = Arc::new(InMemoryTwinStore::new());
    store.insert("co-01", cow()).await;

    let config = PipelineConfig {
        lease_timeout_ms: 50,
        ..PipelineConfig::default()
    };
    let predictor = Arc::new(
        Predictor::from_artifact(constant_artifact("lameness"), &config.required_features).unwrap(),
    );
    let orchestrator = Arc::new(
        SyncOrchestrator::new(
            config,
            store.clone(),
            predictor,
            NotificationDispatcher::new("normal"),
        )
        .unwrap(),
    );
    let (_tx, cancel) = watch::channel(false);
    let router = create_router(AppState::new(orchestrator.clone(), cancel), true);
    (router, store, orchestrator)
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn health_is_always_healthy() {
    let (app, _, _) = app().await;
    let (status, body) = send(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn get_cow_wraps_the_twin() {
    let (app, _, _) = app().await;
    let (status, body) = send(&app, "GET", "/cow/co-01").await;

    assert_eq!(status, StatusCode::OK);
    let cows = body["cows"].as_array().unwrap();
    assert_eq!(cows.len(), 1);
    assert_eq!(cows[0]["$dtId"], "co-01");
    assert_eq!(cows[0]["breed"], "Normal Breed");
}

#[tokio::test]
async fn get_cow_returns_store_metadata() {
    let (app, store, _) = app().await;
    store
        .seed(vec![json!({
            "$dtId": "co-05",
            "$metadata": {"$model": "dtmi:farm:Cow;1", "breed": {"lastUpdateTime": "2024-03-01T00:00:00Z"}},
            "breed": "Cross Breed"
        })])
        .await
        .unwrap();

    let (status, body) = send(&app, "GET", "/cow/co-05").await;

    assert_eq!(status, StatusCode::OK);
    let twin = &body["cows"][0];
    assert_eq!(twin["$metadata"]["$model"], "dtmi:farm:Cow;1");
    assert_eq!(twin["$metadata"]["breed"]["lastUpdateTime"], "2024-03-01T00:00:00Z");
    assert_eq!(twin["breed"], "Cross Breed");
}

#[tokio::test]
async fn get_cow_maps_store_failures() {
    let (app, store, _) = app().await;

    let (status, body) = send(&app, "GET", "/cow/co-404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Cow not found");

    store.push_get_fault(Fault::Fail(StoreError::Rejected("boom".to_string())));
    let (status, _) = send(&app, "GET", "/cow/co-01").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    store.push_get_fault(Fault::Fail(StoreError::Transient("reset".to_string())));
    let (status, body) = send(&app, "GET", "/cow/co-01").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "STORE_UNAVAILABLE");
}

#[tokio::test]
async fn sync_endpoint_runs_the_pipeline() {
    let (app, store, _) = app().await;

    let (status, report) = send(&app, "POST", "/cow/co-01/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["outcome"]["status"], "done");
    assert_eq!(report["label"], "lameness");
    assert_eq!(report["ops"][0]["op"], "add");
    assert_eq!(
        store
            .attributes(&TwinId::new("co-01"))
            .await
            .unwrap()
            .get("predictionLabel"),
        Some(&json!("lameness"))
    );

    let (_, status_body) = send(&app, "GET", "/status").await;
    assert_eq!(status_body["runs"]["done"], 1);
    assert_eq!(status_body["model_version"], "test-constant-lameness");
}

#[tokio::test]
async fn sync_endpoint_reports_busy_twin() {
    let (app, _, orchestrator) = app().await;
    let _held = orchestrator
        .leases()
        .acquire(&TwinId::new("co-01"), Duration::from_secs(1))
        .await
        .unwrap();

    let (status, body) = send(&app, "POST", "/cow/co-01/sync").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}
