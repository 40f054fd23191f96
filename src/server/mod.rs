//! HTTP server setup and routing.

mod analyze;
mod routes;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::advisory::AdvisoryClient;
use crate::config::AppConfig;
use crate::inference::RooftopModel;

/// Maximum accepted upload size
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Shared application state passed to all handlers.
///
/// The model is resolved once at startup and never replaced; handlers
/// share the same immutable handle for the process lifetime.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub model: Option<Arc<RooftopModel>>,
    pub advisor: Arc<AdvisoryClient>,
    /// Server start time for uptime calculation
    pub started_at: Instant,
}

impl AppState {
    /// Create state without a loaded model (development mode only)
    pub fn new(config: AppConfig, advisor: AdvisoryClient) -> Self {
        Self {
            config: Arc::new(config),
            model: None,
            advisor: Arc::new(advisor),
            started_at: Instant::now(),
        }
    }

    /// Create state with the resolved segmentation model
    pub fn with_model(config: AppConfig, advisor: AdvisoryClient, model: RooftopModel) -> Self {
        Self {
            config: Arc::new(config),
            model: Some(Arc::new(model)),
            advisor: Arc::new(advisor),
            started_at: Instant::now(),
        }
    }

    /// Check if the segmentation model is loaded
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Creates the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(routes::health))
        .route("/config", get(routes::config))
        .route("/analyze", post(analyze::analyze))
        .route("/analyze/manual", post(analyze::analyze_manual))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
