//! In-process API tests for the transformation gateway.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestConfig, TestFixture};
use morphflux_core::testing::MockProcessor;
use morphflux_core::TransformationType;

const WAIT: Duration = Duration::from_secs(30);

fn slow_style_transfer() -> TestConfig {
    TestConfig::default().with_processor(Arc::new(
        MockProcessor::new(TransformationType::StyleTransfer)
            .with_delay(Duration::from_millis(500)),
    ))
}

// =============================================================================
// Health, config, metrics
// =============================================================================

#[tokio::test]
async fn test_health_reports_processor_snapshot() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["accepting"], true);
    assert_eq!(response.body["models"]["background_removal"], "ready");
    assert_eq!(response.body["models"]["object_removal"], "ready");
    assert!(response.body["version"].is_string());
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["models"]["device"], "cpu");
    assert_eq!(response.body["orchestrator"]["max_concurrent_jobs"], 2);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.get("/api/v1/health").await;

    let (status, body) = fixture.get_text("/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("morphflux_http_requests_total"));
    assert!(body.contains("morphflux_processors_by_status"));
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_process_returns_accepted_and_completes() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/transformations/process",
            json!({
                "transformation_id": "j1",
                "transformation_type": "background_removal",
                "input_image_path": "valid.png",
                "parameters": {}
            }),
        )
        .await;

    assert_status!(response, StatusCode::ACCEPTED);
    assert_eq!(response.body["transformation_id"], "j1");
    assert_eq!(response.body["status"], "processing");

    let job = fixture.wait_for_terminal("j1", WAIT).await;
    assert_eq!(job["status"], "completed");
    assert_eq!(job["type"], "background_removal");
    assert!(job["processing_time_ms"].as_u64().is_some());
    assert!(job["error_message"].is_null());

    let result = fixture.get("/api/v1/transformations/j1/result").await;
    assert_status!(result, StatusCode::OK);
    assert_eq!(result.body["status"], "completed");
    assert!(result.body["output_ref"]
        .as_str()
        .unwrap()
        .ends_with("j1_bg_removed.png"));
}

#[tokio::test]
async fn test_process_generates_id_when_absent() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/transformations/process",
            json!({
                "transformation_type": "style_transfer",
                "input_ref": "valid.png"
            }),
        )
        .await;

    assert_status!(response, StatusCode::ACCEPTED);
    let id = response.body["transformation_id"].as_str().unwrap();
    assert_eq!(id.len(), 36);
}

#[tokio::test]
async fn test_unsupported_type_is_bad_request() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/transformations/process",
            json!({
                "transformation_id": "j2",
                "transformation_type": "unsupported_type",
                "input_image_path": "valid.png"
            }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["error"],
        "Invalid transformation type: unsupported_type"
    );

    let status = fixture.get("/api/v1/transformations/j2/status").await;
    assert_status!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_input_is_bad_request() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/transformations/process",
            json!({
                "transformation_type": "style_transfer",
                "input_image_path": "missing.png"
            }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Input image not found: missing.png");
}

#[tokio::test]
async fn test_path_like_id_is_bad_request() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/transformations/process",
            json!({
                "transformation_id": "../escaped",
                "transformation_type": "style_transfer",
                "input_image_path": "valid.png"
            }),
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid transformation id"));
    assert!(!fixture.temp_dir.path().join("escaped_styled.png").exists());

    let list = fixture.get("/api/v1/transformations").await;
    assert_eq!(list.body["total"], 0);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_raw("/api/v1/transformations/process", "{not json")
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_submission_conflicts() {
    let fixture = TestFixture::with_config(slow_style_transfer()).await;
    let body = json!({
        "transformation_id": "j4",
        "transformation_type": "style_transfer",
        "input_image_path": "valid.png"
    });

    let first = fixture
        .post("/api/v1/transformations/process", body.clone())
        .await;
    let second = fixture.post("/api/v1/transformations/process", body).await;

    assert_status!(first, StatusCode::ACCEPTED);
    assert_status!(second, StatusCode::CONFLICT);
    assert_eq!(
        second.body["error"],
        "Transformation already submitted: j4"
    );

    let job = fixture.wait_for_terminal("j4", WAIT).await;
    assert_eq!(job["status"], "completed");

    let list = fixture.get("/api/v1/transformations").await;
    assert_eq!(list.body["total"], 1);
}

#[tokio::test]
async fn test_submission_after_shutdown_is_unavailable() {
    let fixture = TestFixture::new().await;
    fixture.orchestrator.shutdown(Duration::ZERO).await;

    let response = fixture
        .post(
            "/api/v1/transformations/process",
            json!({
                "transformation_type": "style_transfer",
                "input_image_path": "valid.png"
            }),
        )
        .await;

    assert_status!(response, StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_no_face_fails_job() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/transformations/process",
            json!({
                "transformation_id": "j3",
                "transformation_type": "age_progression",
                "input_image_path": "no_faces.png"
            }),
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);

    let job = fixture.wait_for_terminal("j3", WAIT).await;
    assert_eq!(job["status"], "failed");
    assert_eq!(job["failure_kind"], "processing_failed");
    assert!(job["error_message"]
        .as_str()
        .unwrap()
        .contains("No faces detected"));
    assert!(job["output_ref"].is_null());

    let result = fixture.get("/api/v1/transformations/j3/result").await;
    assert_status!(result, StatusCode::OK);
    assert_eq!(result.body["status"], "failed");
    assert_eq!(result.body["message"], "Transformation not completed yet");
}

#[tokio::test]
async fn test_disabled_processor_fails_job() {
    let fixture = TestFixture::with_config(
        TestConfig::default().with_disabled(TransformationType::FaceEnhancement),
    )
    .await;

    fixture
        .post(
            "/api/v1/transformations/process",
            json!({
                "transformation_id": "nr",
                "transformation_type": "face_enhancement",
                "input_image_path": "face.png"
            }),
        )
        .await;

    let job = fixture.wait_for_terminal("nr", WAIT).await;
    assert_eq!(job["status"], "failed");
    assert_eq!(job["failure_kind"], "processor_not_ready");
}

// =============================================================================
// Queries
// =============================================================================

#[tokio::test]
async fn test_unknown_transformation_not_found() {
    let fixture = TestFixture::new().await;

    let status = fixture.get("/api/v1/transformations/nope/status").await;
    assert_status!(status, StatusCode::NOT_FOUND);
    assert_eq!(status.body["error"], "Transformation not found: nope");

    let result = fixture.get("/api/v1/transformations/nope/result").await;
    assert_status!(result, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_result_not_ready_while_processing() {
    let fixture = TestFixture::with_config(slow_style_transfer()).await;

    fixture
        .post(
            "/api/v1/transformations/process",
            json!({
                "transformation_id": "slow",
                "transformation_type": "style_transfer",
                "input_image_path": "valid.png"
            }),
        )
        .await;

    let result = fixture.get("/api/v1/transformations/slow/result").await;
    assert_status!(result, StatusCode::OK);
    assert_eq!(result.body["status"], "processing");
    assert!(result.body["output_ref"].is_null());

    fixture.wait_for_terminal("slow", WAIT).await;
}

#[tokio::test]
async fn test_list_filters_by_status_and_type() {
    let fixture = TestFixture::new().await;

    for (id, transformation_type, input) in [
        ("a", "style_transfer", "valid.png"),
        ("b", "age_progression", "no_faces.png"),
        ("c", "style_transfer", "valid.png"),
    ] {
        fixture
            .post(
                "/api/v1/transformations/process",
                json!({
                    "transformation_id": id,
                    "transformation_type": transformation_type,
                    "input_image_path": input
                }),
            )
            .await;
    }
    for id in ["a", "b", "c"] {
        fixture.wait_for_terminal(id, WAIT).await;
    }

    let all = fixture.get("/api/v1/transformations").await;
    assert_status!(all, StatusCode::OK);
    assert_eq!(all.body["total"], 3);
    assert_eq!(all.body["limit"], 100);

    let failed = fixture
        .get("/api/v1/transformations?status=failed")
        .await;
    assert_eq!(failed.body["total"], 1);
    assert_eq!(failed.body["transformations"][0]["transformation_id"], "b");

    let styled = fixture
        .get("/api/v1/transformations?type=style_transfer&limit=1")
        .await;
    assert_eq!(styled.body["total"], 2);
    assert_eq!(styled.body["transformations"].as_array().unwrap().len(), 1);

    let clamped = fixture.get("/api/v1/transformations?limit=5000").await;
    assert_eq!(clamped.body["limit"], 1000);
}

#[tokio::test]
async fn test_list_rejects_unknown_filters() {
    let fixture = TestFixture::new().await;

    let bad_status = fixture.get("/api/v1/transformations?status=done").await;
    assert_status!(bad_status, StatusCode::BAD_REQUEST);

    let bad_type = fixture.get("/api/v1/transformations?type=cartoon").await;
    assert_status!(bad_type, StatusCode::BAD_REQUEST);
    assert_eq!(bad_type.body["error"], "Invalid transformation type: cartoon");
}

// =============================================================================
// Models
// =============================================================================

#[tokio::test]
async fn test_models_endpoints() {
    let fixture = TestFixture::with_config(
        TestConfig::default().with_disabled(TransformationType::ObjectRemoval),
    )
    .await;

    let list = fixture.get("/api/v1/models").await;
    assert_status!(list, StatusCode::OK);
    assert_eq!(list.body["total"], 6);
    assert_eq!(list.body["ready"], 5);
    assert_eq!(list.body["device"], "cpu");

    let model = fixture.get("/api/v1/models/style_transfer").await;
    assert_status!(model, StatusCode::OK);
    assert_eq!(model.body["name"], "style_transfer");
    assert_eq!(model.body["status"], "ready");

    let disabled = fixture.get("/api/v1/models/object_removal/status").await;
    assert_status!(disabled, StatusCode::OK);
    assert_eq!(disabled.body["status"], "unregistered");
    assert_eq!(disabled.body["ready"], false);

    let unknown = fixture.get("/api/v1/models/cartoon").await;
    assert_status!(unknown, StatusCode::NOT_FOUND);
    assert_eq!(unknown.body["error"], "Model not found: cartoon");
}
