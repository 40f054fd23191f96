//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::advisory::AdvisoryMetrics;

/// Overall service health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// Running, but the segmentation model is not loaded
    Degraded,
}

/// Response for GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub model_loaded: bool,
    pub uptime_seconds: u64,
}

/// Response for GET /api/v1/config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub model: ModelInfo,
    pub advisor: AdvisorInfo,
    pub server: ServerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Configured sources in resolution order
    pub sources: Vec<String>,
    pub loaded: bool,
    pub device: Option<String>,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorInfo {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub host: String,
    pub port: u16,
}

/// Request body for POST /api/v1/analyze/manual
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualAnalyzeRequest {
    /// Rooftop area in square meters
    pub area: f64,
}

/// Response for both analysis endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// Estimated (or manually entered) rooftop area in square meters
    pub estimated_area_m2: f64,

    /// Parsed advisory metrics
    pub metrics: AdvisoryMetrics,

    /// Raw advisory text the metrics were parsed from
    pub advisory_text: String,

    /// Base64 PNG of the original-plus-mask visualization; absent for
    /// manual area entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segmentation_png: Option<String>,

    /// Base64 PNG of the bill comparison chart
    pub bill_chart_png: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_request_deserialize() {
        let req: ManualAnalyzeRequest = serde_json::from_str(r#"{"area": 150.5}"#).unwrap();
        assert_eq!(req.area, 150.5);
    }

    #[test]
    fn test_health_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            r#""degraded""#
        );
    }

    #[test]
    fn test_analyze_response_omits_missing_visualization() {
        let response = AnalyzeResponse {
            estimated_area_m2: 150.0,
            metrics: AdvisoryMetrics::default(),
            advisory_text: "{}".to_string(),
            segmentation_png: None,
            bill_chart_png: "AAAA".to_string(),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("segmentation_png"));
        assert!(json.contains("bill_chart_png"));
    }
}
