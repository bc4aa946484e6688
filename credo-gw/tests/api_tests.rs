//! HTTP API integration tests
//!
//! Exercises the router end to end against an in-memory database: the
//! internal initiation path, the callback receivers (auth, validation,
//! lattice guard, idempotent replay), and the read surfaces.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use credo_common::config::GatewayConfig;
use credo_common::events::EventBus;
use credo_gw::db::reports;
use credo_gw::models::ReportStatus;
use credo_gw::{build_router, AppState};

async fn test_state_with(config: GatewayConfig) -> AppState {
    let db_pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    credo_gw::db::init_tables(&db_pool).await.unwrap();
    let event_bus = EventBus::new(100);
    AppState::new(db_pool, event_bus, config)
}

async fn test_state() -> AppState {
    test_state_with(GatewayConfig::default()).await
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Seed one external report directly through the store and return its id
async fn seed_report(state: &AppState) -> String {
    let report = credo_gw::models::Report::new_external(
        "ID-77".to_string(),
        Some("user-1".to_string()),
        credo_gw::models::Jurisdiction::US,
    );
    reports::save_initiated(&state.db, &report).await.unwrap();
    report.report_id
}

// ---- Internal initiation -------------------------------------------------

#[tokio::test]
async fn internal_initiation_returns_summary_and_letters() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json(
            "/api/credit/initiate",
            json!({
                "identifier": "123-45-6789",
                "userInformation": "Two accounts look wrong",
                "jurisdiction": "US",
                "processingChannel": "internal"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    assert!(body["summary"]["summary"].as_str().unwrap().len() > 0);
    // The simulated generator identifies two inaccuracies, one letter each
    assert_eq!(body["disputeLetters"]["disputeLetters"].as_array().unwrap().len(), 2);
    assert!(body["error"].is_null());
    assert_eq!(body["processingChannel"], "internal");
    assert_eq!(body["jurisdiction"], "US");
    assert!(body["reportId"].is_null());
}

#[tokio::test]
async fn initiation_rejects_empty_identifier() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json(
            "/api/credit/initiate",
            json!({ "identifier": "  ", "processingChannel": "internal" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["details"]["identifier"].is_string());
}

#[tokio::test]
async fn initiation_rejects_unknown_jurisdiction() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json(
            "/api/credit/initiate",
            json!({ "identifier": "123", "jurisdiction": "DE" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn initiation_rejects_malformed_json() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/credit/initiate")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---- External initiation -------------------------------------------------

#[tokio::test]
async fn external_initiation_persists_report_and_acknowledges() {
    let state = test_state().await;
    let app = build_router(state.clone());

    let response = app
        .oneshot(post_json(
            "/api/credit/initiate",
            json!({
                "identifier": "NI-AB123456C",
                "jurisdiction": "UK",
                "processingChannel": "external",
                "userId": "user-42"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;

    let report_id = body["reportId"].as_str().unwrap().to_string();
    assert_eq!(body["processingChannel"], "external");
    assert!(body["summary"].is_null());

    let report = reports::get_report(&state.db, &report_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.status, ReportStatus::ProcessingExternalInitiated);
    assert_eq!(report.user_id.as_deref(), Some("user-42"));
}

#[tokio::test]
async fn external_initiation_with_unavailable_store_is_fatal() {
    let state = test_state().await;
    // Closed pool: the persist step must fail before anything is scheduled
    state.db.close().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json(
            "/api/credit/initiate",
            json!({
                "identifier": "123-45-6789",
                "processingChannel": "external"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert!(body["reportId"].is_null());
}

// ---- Analysis-complete callback ------------------------------------------

#[tokio::test]
async fn analysis_complete_applies_status_and_letters() {
    let state = test_state().await;
    let report_id = seed_report(&state).await;
    let app = build_router(state.clone());

    let payload = json!({
        "reportId": report_id,
        "userId": "user-1",
        "status": "SUCCESS",
        "summary": "Two disputable items found",
        "disputeLetters": [
            { "letterId": "l-1", "content": "Letter one" },
            { "letterId": "l-2", "content": "Letter two" },
            { "letterId": "l-3", "content": "Letter three" }
        ]
    });

    let response = app
        .clone()
        .oneshot(post_json("/api/ai/callbacks/analysis-complete", payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/reports/{}", report_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "SUCCESS_EXTERNAL_ANALYSIS_COMPLETE");
    assert_eq!(body["analysisSummary"], "Two disputable items found");
    assert_eq!(body["disputeLetters"].as_array().unwrap().len(), 3);

    // Replaying the same callback converges on the same state
    let response = app
        .clone()
        .oneshot(post_json("/api/ai/callbacks/analysis-complete", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/api/reports/{}", report_id)))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["disputeLetters"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn analysis_complete_failure_records_error() {
    let state = test_state().await;
    let report_id = seed_report(&state).await;
    let app = build_router(state.clone());

    let response = app
        .oneshot(post_json(
            "/api/ai/callbacks/analysis-complete",
            json!({
                "reportId": report_id,
                "status": "FAILURE",
                "error": "Model backend unavailable"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = reports::get_report(&state.db, &report_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.status, ReportStatus::FailureExternalAnalysisFailed);
    assert_eq!(report.analysis_error.as_deref(), Some("Model backend unavailable"));
}

#[tokio::test]
async fn analysis_complete_unknown_report_is_404() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json(
            "/api/ai/callbacks/analysis-complete",
            json!({ "reportId": "no-such-report", "status": "SUCCESS" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analysis_complete_rejects_missing_status() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json(
            "/api/ai/callbacks/analysis-complete",
            json!({ "reportId": "r-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// ---- Lattice guard across callbacks --------------------------------------

#[tokio::test]
async fn stale_ingestion_callback_cannot_regress_completed_analysis() {
    let state = test_state().await;
    let report_id = seed_report(&state).await;
    let app = build_router(state.clone());

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/ai/callbacks/analysis-complete",
            json!({ "reportId": report_id, "status": "SUCCESS", "summary": "done" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The ingestion callback arrives late; acknowledged, not applied
    let response = app
        .oneshot(post_json(
            "/api/ai/callbacks/report-processed",
            json!({ "reportId": report_id, "status": "SUCCESS", "message": "late ingestion" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = reports::get_report(&state.db, &report_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.status, ReportStatus::SuccessExternalAnalysisComplete);
    assert!(report.ingestion_message.is_none());
}

#[tokio::test]
async fn report_processed_rejects_malformed_structured_data_url() {
    let state = test_state().await;
    let report_id = seed_report(&state).await;
    let app = build_router(state.clone());

    let response = app
        .oneshot(post_json(
            "/api/ai/callbacks/report-processed",
            json!({
                "reportId": report_id,
                "status": "SUCCESS",
                "structuredDataUrl": "not a url at all"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"]["details"]["structuredDataUrl"].is_string());

    // Rejected before any store access: the report is untouched
    let report = reports::get_report(&state.db, &report_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.status, ReportStatus::ProcessingExternalInitiated);
    assert!(report.structured_data_url.is_none());
}

#[tokio::test]
async fn report_processed_merges_ingestion_fields() {
    let state = test_state().await;
    let report_id = seed_report(&state).await;
    let app = build_router(state.clone());

    let response = app
        .oneshot(post_json(
            "/api/ai/callbacks/report-processed",
            json!({
                "reportId": report_id,
                "status": "PARTIAL",
                "message": "3 of 4 tradelines parsed",
                "structuredDataUrl": "https://example.com/structured.json"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = reports::get_report(&state.db, &report_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.status, ReportStatus::PartialExternalIngestion);
    assert_eq!(report.ingestion_message.as_deref(), Some("3 of 4 tradelines parsed"));
    assert_eq!(
        report.structured_data_url.as_deref(),
        Some("https://example.com/structured.json")
    );
}

// ---- Dispute-status-update callback --------------------------------------

#[tokio::test]
async fn dispute_status_update_applies_to_existing_letter() {
    let state = test_state().await;
    let report_id = seed_report(&state).await;
    let app = build_router(state.clone());

    app.clone()
        .oneshot(post_json(
            "/api/ai/callbacks/analysis-complete",
            json!({
                "reportId": report_id,
                "status": "SUCCESS",
                "disputeLetters": [{ "letterId": "l-9", "content": "Letter" }]
            }),
        ))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/ai/callbacks/dispute-status-update",
            json!({
                "disputeId": "l-9",
                "reportId": report_id,
                "userId": "user-1",
                "newStatus": "Acknowledged",
                "details": "Bureau confirmed receipt",
                "externalReferenceId": "bureau-12"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/api/disputes/l-9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "Acknowledged");
    assert_eq!(body["details"], "Bureau confirmed receipt");
    assert_eq!(body["externalReferenceId"], "bureau-12");
}

#[tokio::test]
async fn dispute_status_update_for_unknown_letter_is_acknowledged() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json(
            "/api/ai/callbacks/dispute-status-update",
            json!({
                "disputeId": "ghost",
                "reportId": "r-1",
                "userId": "user-1",
                "newStatus": "Sent"
            }),
        ))
        .await
        .unwrap();
    // Lenient by design: logged and acknowledged, nothing created
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn dispute_status_update_rejects_blank_fields() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app
        .oneshot(post_json(
            "/api/ai/callbacks/dispute-status-update",
            json!({
                "disputeId": "l-1",
                "reportId": "r-1",
                "userId": "user-1",
                "newStatus": ""
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---- Callback authentication ---------------------------------------------

#[tokio::test]
async fn callbacks_require_token_when_configured() {
    let config = GatewayConfig {
        callback_token: Some("s3cret".to_string()),
        ..Default::default()
    };
    let state = test_state_with(config).await;
    let report_id = seed_report(&state).await;
    let app = build_router(state);

    let payload = json!({ "reportId": report_id, "status": "SUCCESS" });

    // Missing token
    let response = app
        .clone()
        .oneshot(post_json("/api/ai/callbacks/analysis-complete", payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong token
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ai/callbacks/analysis-complete")
                .header("content-type", "application/json")
                .header("X-Callback-Token", "wrong")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Correct token
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/ai/callbacks/analysis-complete")
                .header("content-type", "application/json")
                .header("X-Callback-Token", "s3cret")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn token_check_does_not_gate_other_routes() {
    let config = GatewayConfig {
        callback_token: Some("s3cret".to_string()),
        ..Default::default()
    };
    let state = test_state_with(config).await;
    let app = build_router(state);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ---- Read surfaces -------------------------------------------------------

#[tokio::test]
async fn get_report_unknown_id_is_404() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app.oneshot(get("/api/reports/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn get_dispute_unknown_id_is_404() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app.oneshot(get("/api/disputes/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_ok_with_version() {
    let state = test_state().await;
    let app = build_router(state);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "credo-gw");
    assert!(body["version"].is_string());
}
