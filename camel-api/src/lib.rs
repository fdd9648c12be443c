//! camel-api library - Camel Classifier HTTP service
//!
//! Accounts, breed classification with explanation overlays, prediction
//! history and generated breed facts.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    Router,
};
use camel_common::auth::TokenKeys;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod db;
pub mod error;
pub mod explain;
pub mod facts;
pub mod model;
pub mod models;
pub mod pagination;
pub mod pipeline;

use facts::FactLookup;
use model::BreedModel;

/// Local development frontend, always allowed
pub const DEV_FRONTEND_ORIGIN: &str = "http://localhost:3000";

/// Upload limit used when state is built without one
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Bearer token signing/verification keys
    pub tokens: TokenKeys,
    /// Loaded once at startup; `None` when loading failed
    pub model: Option<Arc<dyn BreedModel>>,
    pub facts: FactLookup,
    /// Deployed frontend origin allowed by CORS
    pub frontend_url: Option<String>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Create new application state with no model and facts disabled
    pub fn new(db: SqlitePool, tokens: TokenKeys) -> Self {
        Self {
            db,
            tokens,
            model: None,
            facts: FactLookup::disabled(),
            frontend_url: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn BreedModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_facts(mut self, facts: FactLookup) -> Self {
        self.facts = facts;
        self
    }

    pub fn with_frontend_url(mut self, frontend_url: Option<String>) -> Self {
        self.frontend_url = frontend_url;
        self
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

/// CORS origin check
///
/// Allows the local dev frontend, the configured frontend, and any
/// `https://<name>.vercel.app` preview deployment.
pub fn is_allowed_origin(origin: &str, frontend_url: Option<&str>) -> bool {
    if origin == DEV_FRONTEND_ORIGIN {
        return true;
    }
    if let Some(frontend) = frontend_url {
        if origin == frontend.trim_end_matches('/') {
            return true;
        }
    }
    match origin
        .strip_prefix("https://")
        .and_then(|host| host.strip_suffix(".vercel.app"))
    {
        Some(name) => !name.is_empty() && !name.contains('/') && !name.contains(':'),
        None => false,
    }
}

fn cors_layer(frontend_url: Option<String>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| is_allowed_origin(o, frontend_url.as_deref()))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

/// Build application router
///
/// `/`, `/health`, signup and login are public; everything else requires a
/// bearer token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (require authentication)
    let protected = Router::new()
        .route("/api/auth/me", get(api::me))
        .route(
            "/api/predict/classify",
            post(api::classify).layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
        .route("/api/predict/history", get(api::history))
        .route(
            "/api/predict/:id",
            get(api::get_prediction).delete(api::delete_prediction),
        )
        .route("/api/features/facts", post(api::get_facts))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/auth/signup", post(api::signup))
        .route("/api/auth/login", post(api::login))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(cors_layer(state.frontend_url.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
