pub mod config;
pub mod errors;
pub mod grading;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod worker;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
};
use tower_http::{
    services::ServeDir,
    limit::RequestBodyLimitLayer,
};
use tower_sessions::{MemoryStore as SessionMemoryStore, SessionManagerLayer};
use tower_sessions::cookie::SameSite;
use crate::config::{Config, StorageBackend};
use crate::grading::{GeminiClient, Grader, TesseractCli};
use crate::services::{MemoryStore, RedisService, SharedStore};

/// Opens the store selected in config.
pub fn connect_store(config: &Config) -> Result<SharedStore, redis::RedisError> {
    match config.storage.backend {
        StorageBackend::Redis => {
            let client = redis::Client::open(config.storage.redis_url.as_str())?;
            tracing::info!("Using Redis store at {}", config.storage.redis_url);
            Ok(Arc::new(RedisService::new(Arc::new(client))))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Gemini-backed grader, with OCR when enabled.
pub fn build_grader(config: &Config) -> Grader {
    if config.gemini.api_key.is_empty() {
        tracing::warn!("No Gemini API key configured; every criterion will get the fallback score");
    }
    let grader = Grader::new(
        Arc::new(GeminiClient::new(config.gemini.clone())),
        config.grading.max_score,
    );
    if config.ocr.enabled {
        tracing::info!("OCR enabled via {}", config.ocr.command);
        grader.with_ocr(Arc::new(TesseractCli::new(&config.ocr)))
    } else {
        grader
    }
}

pub fn build_router(store: SharedStore, config: Config) -> Router {
    let session_layer = SessionManagerLayer::new(SessionMemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_name("session");

    let max_body = config.upload.max_file_size;

    Router::new()
        // Auth routes
        .route("/", get(handlers::serve_login_page))
        .route("/login", post(handlers::handle_login))
        .route("/register", post(handlers::handle_register))
        .route("/logout", get(handlers::handle_logout))

        // Grading routes
        .route("/upload", get(handlers::serve_upload_page))
        .route("/grade", post(handlers::submit_grading))
        .route("/status/:job_id", get(handlers::get_job_status))
        .route("/results/:job_id", get(handlers::view_results))
        .route("/download/:job_id", get(handlers::download_report))

        // Dashboard routes
        .route("/user", get(handlers::serve_user_dashboard))
        .route("/delete/:job_id", get(handlers::delete_job))

        .nest_service("/static", ServeDir::new("static"))

        .layer(from_fn(middleware::require_auth))
        .layer(session_layer)

        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))

        .with_state((store, config))
}
