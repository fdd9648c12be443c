//! Shared helpers for camel-api integration tests
//!
//! Builds a router over a throwaway database with a deterministic model and a
//! scripted text generator, plus request/multipart builders.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use camel_api::facts::{FactLookup, GenerationError, GenerationRequest, TextGenerator};
use camel_api::model::{BreedModel, ModelError, ModelInput, ModelOutput};
use camel_api::{build_router, AppState};
use camel_common::auth::TokenKeys;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::Array3;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

pub const TEST_SECRET: &[u8] = b"integration-test-secret-0123456789";
pub const BOUNDARY: &str = "camel-test-boundary";

/// Model that always returns the same probabilities
pub struct FixedModel {
    pub probabilities: Vec<f64>,
}

impl BreedModel for FixedModel {
    fn describe(&self) -> String {
        "fixed-test-model".to_string()
    }

    fn predict(&self, input: &ModelInput) -> Result<ModelOutput, ModelError> {
        assert_eq!(input.image.shape(), &[1, 3, 224, 224]);
        assert_eq!(input.traits.shape(), &[1, 4]);

        let mut cam = Array3::<f32>::zeros((3, 7, 7));
        for c in 0..3 {
            cam[[c, c + 2, c + 2]] = 1.0;
        }
        Ok(ModelOutput {
            probabilities: self.probabilities.clone(),
            class_activations: cam,
        })
    }
}

/// Text generator that returns one canned reply (or failure) for every call
pub struct CannedGenerator {
    pub reply: Result<String, String>,
}

#[async_trait]
impl TextGenerator for CannedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        self.reply
            .clone()
            .map_err(GenerationError::Network)
    }
}

pub fn ten_facts_json() -> String {
    let facts: Vec<String> = (1..=10).map(|i| format!("Camel fact number {}", i)).collect();
    json!({ "facts": facts }).to_string()
}

/// Test application over a temporary database
pub struct TestApp {
    pub _dir: TempDir,
    pub pool: SqlitePool,
    pub tokens: TokenKeys,
    pub app: Router,
}

pub struct TestAppBuilder {
    probabilities: Option<Vec<f64>>,
    facts: FactLookup,
    frontend_url: Option<String>,
    max_upload_bytes: Option<usize>,
}

impl TestAppBuilder {
    pub fn new() -> Self {
        Self {
            probabilities: Some(vec![0.92, 0.05, 0.03]),
            facts: FactLookup::disabled(),
            frontend_url: None,
            max_upload_bytes: None,
        }
    }

    pub fn probabilities(mut self, probabilities: Vec<f64>) -> Self {
        self.probabilities = Some(probabilities);
        self
    }

    pub fn without_model(mut self) -> Self {
        self.probabilities = None;
        self
    }

    pub fn facts_reply(mut self, reply: Result<String, String>) -> Self {
        self.facts = FactLookup::new(Arc::new(CannedGenerator { reply }));
        self
    }

    pub fn frontend_url(mut self, url: &str) -> Self {
        self.frontend_url = Some(url.to_string());
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = Some(bytes);
        self
    }

    pub async fn build(self) -> TestApp {
        let dir = TempDir::new().unwrap();
        let pool = camel_common::db::init_database(&dir.path().join("test.db"))
            .await
            .unwrap();
        let tokens = TokenKeys::new(TEST_SECRET, 30);

        let mut state = AppState::new(pool.clone(), tokens.clone())
            .with_facts(self.facts)
            .with_frontend_url(self.frontend_url);
        if let Some(probabilities) = self.probabilities {
            state = state.with_model(Arc::new(FixedModel { probabilities }));
        }
        if let Some(bytes) = self.max_upload_bytes {
            state = state.with_max_upload_bytes(bytes);
        }

        TestApp {
            _dir: dir,
            pool,
            tokens,
            app: build_router(state),
        }
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    /// Sign up and log in, returning the bearer token
    pub async fn register(&self, username: &str) -> String {
        let (status, _) = self
            .send(json_request(
                "POST",
                "/api/auth/signup",
                json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "desert-caravan",
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/auth/login",
                json!({ "username": username, "password": "desert-caravan" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn prediction_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM predictions")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Solid-color PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([194, 154, 108]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Multipart form builder
pub struct Form {
    body: Vec<u8>,
}

impl Form {
    pub fn new() -> Self {
        Self { body: Vec::new() }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"upload\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// The standard trait inputs used across scenarios
    pub fn with_traits(self) -> Self {
        self.text("head_size", "3.5")
            .text("leg_condition", "4.0")
            .text("coat_quality", "3.8")
            .text("overall_fitness", "4.2")
    }

    pub fn into_request(mut self, uri: &str, token: Option<&str>) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let mut builder = Request::builder().method("POST").uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}
