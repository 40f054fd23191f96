//! Health and configuration route handlers.

use axum::{extract::State, Json};

use crate::types::{
    AdvisorInfo, ConfigResponse, HealthResponse, HealthStatus, ModelInfo, ServerInfo,
};

use super::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Health check endpoint
///
/// GET /api/v1/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_loaded = state.has_model();

    // Degraded while the segmentation model is missing (development mode)
    let status = if model_loaded {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    Json(HealthResponse {
        status,
        version: VERSION.to_string(),
        model_loaded,
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Configuration endpoint
///
/// GET /api/v1/config
pub async fn config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = &state.config;

    let device = state.model.as_ref().map(|m| m.device().to_string());

    Json(ConfigResponse {
        model: ModelInfo {
            sources: config.model.sources.clone(),
            loaded: state.has_model(),
            device,
            required: config.model.required,
        },
        advisor: AdvisorInfo {
            base_url: config.advisor.base_url.clone(),
            model: config.advisor.model.clone(),
        },
        server: ServerInfo {
            host: config.server.host.clone(),
            port: config.server.port,
        },
    })
}
