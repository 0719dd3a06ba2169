//! HTTP API surface — spec §6.
//!
//! Enriched from `vimana-cloud-vimana` and `RebornBeat-Ozone-Studio`
//! (both depend on `axum`/`tower-http`) since the teacher crate has no web
//! framework of its own.

pub mod dto;
pub mod handlers;

use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::FileStorageService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FileStorageService>,
}

pub fn router(service: Arc<FileStorageService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/api/v1/storage/files/upload", post(handlers::upload))
        .route("/api/v1/storage/files/download/:file_id", get(handlers::download))
        .route("/api/v1/storage/files/:file_id", delete(handlers::delete))
        .route("/api/v1/storage/files", get(handlers::list))
        .route("/api/v1/storage/files/search", get(handlers::search))
        .route("/api/v1/storage/stats/:family_id", get(handlers::stats))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
