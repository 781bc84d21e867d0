// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use ab_glyph::FontVec;
use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{detect::detect_handler, outputs::get_output_handler};
use crate::storage::FileStore;
use crate::vision::{YoloDetector, MAX_IMAGE_SIZE, MODEL_NAME};

/// Request body limit: the 10MB image cap plus multipart overhead
const MAX_UPLOAD_BODY: usize = MAX_IMAGE_SIZE + 1024 * 1024;

/// Shared state for request handlers
///
/// The detector is optional: the server starts without a model (detect
/// requests get 503) so the output file server stays usable, mirroring
/// how other model-backed endpoints degrade when their model is absent.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<RwLock<Option<Arc<YoloDetector>>>>,
    pub store: Arc<FileStore>,
    label_font: Arc<Option<FontVec>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: FileStore) -> Self {
        Self {
            detector: Arc::new(RwLock::new(None)),
            store: Arc::new(store),
            label_font: Arc::new(None),
            started_at: Instant::now(),
        }
    }

    pub fn with_label_font(mut self, font: Option<FontVec>) -> Self {
        self.label_font = Arc::new(font);
        self
    }

    /// Font for burned-in labels, when one was configured and loaded
    pub fn label_font(&self) -> Option<&FontVec> {
        (*self.label_font).as_ref()
    }
}

/// Build the application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Detection endpoint
        .route("/detect", post(detect_handler))
        // Output file server
        .route("/outputs/:file_name", get(get_output_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the API
pub async fn start_server(
    addr: SocketAddr,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let model = state.detector.read().await.is_some().then_some(MODEL_NAME);
    axum::response::Json(json!({
        "status": "healthy",
        "model": model,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "version": crate::version::VERSION_NUMBER,
    }))
}
