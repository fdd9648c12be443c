//! camel-api - Camel Classifier HTTP service
//!
//! Startup: resolve configuration, open the database, load the signing
//! secret and the classification model, then serve until Ctrl+C / SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use camel_common::auth::{load_signing_secret, TokenKeys};
use camel_common::config::{load_toml_config, ConfigOverrides, ServiceConfig};
use camel_common::db::init_database;
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use camel_api::facts::{FactLookup, GeminiClient};
use camel_api::{build_router, model, AppState};

/// Command-line arguments for camel-api
#[derive(Parser, Debug)]
#[command(name = "camel-api")]
#[command(about = "Camel Classifier API service")]
#[command(version)]
struct Args {
    /// Path to config.toml (default: <config dir>/camel-classifier/config.toml)
    #[arg(long, env = "CAMEL_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database and default model
    #[arg(long, env = "CAMEL_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "CAMEL_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Trained model artifact (ONNX)
    #[arg(long, env = "CAMEL_MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// Gemini API key; fact lookup is disabled without one
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    #[arg(long, env = "GEMINI_MODEL")]
    gemini_model: Option<String>,

    /// Token signing secret (generated and stored in the database if unset)
    #[arg(long, env = "CAMEL_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    #[arg(long, env = "CAMEL_TOKEN_TTL_MINUTES")]
    token_ttl_minutes: Option<i64>,

    /// Deployed frontend origin allowed by CORS
    #[arg(long, env = "FRONTEND_URL")]
    frontend_url: Option<String>,

    #[arg(long, env = "CAMEL_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,

    /// Default log filter (RUST_LOG takes precedence)
    #[arg(long, env = "CAMEL_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            data_folder: self.data_folder.clone(),
            host: self.host.clone(),
            port: self.port,
            model_path: self.model_path.clone(),
            gemini_api_key: self.gemini_api_key.clone(),
            gemini_model: self.gemini_model.clone(),
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_minutes: self.token_ttl_minutes,
            frontend_url: self.frontend_url.clone(),
            max_upload_bytes: self.max_upload_bytes,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (file_config, config_source) =
        load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let config = ServiceConfig::resolve(args.overrides(), file_config)
        .context("Invalid configuration")?;

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Camel Classifier API (camel-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_source {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }
    info!("Data folder: {}", config.data_folder.display());

    let pool = match init_database(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Database ready: {}", config.database_path.display());
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let secret = match &config.jwt_secret {
        Some(secret) => {
            info!("Using configured token signing secret");
            secret.clone()
        }
        None => {
            let secret = load_signing_secret(&pool)
                .await
                .context("Failed to load token signing secret")?;
            info!("✓ Loaded token signing secret from database");
            secret
        }
    };
    let tokens = TokenKeys::new(secret.as_bytes(), config.token_ttl_minutes);

    let mut state = AppState::new(pool, tokens)
        .with_frontend_url(config.frontend_url.clone())
        .with_max_upload_bytes(config.max_upload_bytes);

    match model::load_model(&config.model_path) {
        Ok(loaded) => {
            info!("✓ Classification model loaded: {}", loaded.describe());
            state = state.with_model(loaded);
        }
        Err(e) => {
            // Accounts and history stay usable; classify reports 500
            error!("Classification model unavailable: {}", e);
        }
    }

    match &config.gemini_api_key {
        Some(key) => match GeminiClient::new(key.clone(), config.gemini_model.clone()) {
            Ok(client) => {
                info!("✓ Fact lookup enabled (model {})", client.model());
                state = state.with_facts(FactLookup::new(Arc::new(client)));
            }
            Err(e) => warn!("Fact lookup disabled, client init failed: {}", e),
        },
        None => warn!("GEMINI_API_KEY not set, fact lookup disabled"),
    }

    let app = build_router(state);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("camel-api listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
