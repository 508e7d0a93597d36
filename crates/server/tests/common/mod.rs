//! Common test utilities for in-process API testing.
//!
//! This module provides a test fixture that builds the full router over a
//! temporary database, fixture images and (optionally) mock processors,
//! without binding a socket.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use morphflux_core::{
    Config, DatabaseConfig, FsImageStore, ImageStore, JobStore, ModelManager, ModelsConfig,
    OrchestratorConfig, Processor, ProcessorRegistry, SqliteJobStore, StorageConfig,
    TransformationOrchestrator, TransformationType,
};

/// Re-export fixtures for test convenience
pub use morphflux_core::testing::fixtures;

/// Test fixture for API testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_submit() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/transformations/process", json!({
///         "transformation_type": "style_transfer",
///         "input_image_path": "valid.png"
///     })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub orchestrator: Arc<TransformationOrchestrator>,
    /// Temporary directory holding the database, inputs and outputs
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture with the built-in processors.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let input_dir = temp_dir.path().join("inputs");
        let output_dir = temp_dir.path().join("outputs");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");
        fixtures::write_valid_png(&input_dir.join("valid.png"));
        fixtures::write_no_faces_png(&input_dir.join("no_faces.png"));
        fixtures::write_face_png(&input_dir.join("face.png"));

        let config = Config {
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            storage: StorageConfig {
                input_dir: Some(input_dir.clone()),
                output_dir: output_dir.clone(),
            },
            models: ModelsConfig {
                disabled: test_config
                    .disabled
                    .iter()
                    .map(|t| t.as_str().to_string())
                    .collect(),
                ..Default::default()
            },
            orchestrator: OrchestratorConfig::default()
                .with_max_concurrent_jobs(test_config.max_concurrent_jobs),
            ..Default::default()
        };

        let store: Arc<dyn JobStore> =
            Arc::new(SqliteJobStore::new(&db_path).expect("Failed to create job store"));
        let image_store: Arc<dyn ImageStore> = Arc::new(
            FsImageStore::new(Some(input_dir), output_dir).expect("Failed to create image store"),
        );

        let mut registry = ProcessorRegistry::with_defaults(&test_config.disabled);
        for (name, processor) in test_config.extra_processors {
            registry
                .register(name, processor)
                .expect("Failed to register processor");
        }

        let models = Arc::new(ModelManager::new(
            registry,
            Arc::clone(&image_store),
            &config.models,
        ));
        models.initialize().await;

        let orchestrator = Arc::new(TransformationOrchestrator::new(
            config.orchestrator.clone(),
            store,
            models,
            image_store,
        ));

        let state = Arc::new(morphflux_server::state::AppState::new(
            config,
            Arc::clone(&orchestrator),
        ));
        let router = morphflux_server::api::create_router(state);

        Self {
            router,
            orchestrator,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Fetch a raw text body (for the metrics endpoint).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder().uri(path).body(Body::empty()).unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Poll the status endpoint until the transformation is terminal.
    pub async fn wait_for_terminal(&self, id: &str, timeout: Duration) -> Value {
        let start = std::time::Instant::now();
        while start.elapsed() < timeout {
            let response = self
                .get(&format!("/api/v1/transformations/{}/status", id))
                .await;
            let status = response.body["status"].as_str().unwrap_or_default();
            if status == "completed" || status == "failed" {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("transformation {} did not finish within {:?}", id, timeout);
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Configuration for test fixture.
pub struct TestConfig {
    /// Built-in processors left unregistered
    pub disabled: Vec<TransformationType>,
    /// Additional processors registered under the given names
    pub extra_processors: Vec<(String, Arc<dyn Processor>)>,
    pub max_concurrent_jobs: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            extra_processors: Vec::new(),
            max_concurrent_jobs: 2,
        }
    }
}

impl TestConfig {
    /// Replace a built-in processor with a custom one.
    pub fn with_processor(mut self, processor: Arc<dyn Processor>) -> Self {
        let transformation_type = processor.transformation_type();
        self.disabled.push(transformation_type);
        self.extra_processors
            .push((transformation_type.as_str().to_string(), processor));
        self
    }

    pub fn with_disabled(mut self, transformation_type: TransformationType) -> Self {
        self.disabled.push(transformation_type);
        self
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
