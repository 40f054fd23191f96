//! Solar installation advisory via an external LLM endpoint.
//!
//! Builds a deterministic prompt from an area estimate, sends it to a
//! chat-completion API, and extracts the embedded JSON advisory.

mod client;
mod parse;
mod prompt;

pub use client::AdvisoryClient;
pub use parse::parse_metrics;
pub use prompt::build_prompt;

use serde::{Deserialize, Serialize};

/// Parsed advisory metrics.
///
/// Every field is optional: the upstream model is instructed to emit the
/// full schema but is not trusted to. Missing values surface to consumers
/// as `None` ("N/A" in presentation) rather than failing the parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryMetrics {
    #[serde(default)]
    pub recommended_panels: Option<i64>,
    #[serde(default)]
    pub recommended_panels_explanation: Option<String>,

    #[serde(default)]
    pub total_capacity_kw: Option<f64>,
    #[serde(default)]
    pub total_capacity_kw_explanation: Option<String>,

    #[serde(default)]
    pub yearly_production_kwh: Option<f64>,
    #[serde(default)]
    pub yearly_production_explanation: Option<String>,

    #[serde(default)]
    pub installation_cost_inr: Option<f64>,
    #[serde(default)]
    pub installation_cost_explanation: Option<String>,

    #[serde(default)]
    pub yearly_savings_inr: Option<f64>,
    #[serde(default)]
    pub yearly_savings_explanation: Option<String>,

    #[serde(default)]
    pub payback_period_years: Option<f64>,
    #[serde(default)]
    pub payback_period_explanation: Option<String>,
}

/// Advisory error types, classified for user-facing reporting
#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    #[error("Invalid API credential: {0}")]
    InvalidCredential(String),

    #[error("API authentication failed - check your OpenRouter API key and account credits")]
    Auth,

    #[error("Rate limited - too many requests, wait a moment and try again")]
    RateLimited,

    #[error("Quota exceeded - the OpenRouter account is out of credits")]
    QuotaExceeded,

    #[error("API error: {0}")]
    Api(String),

    #[error("Malformed advisory response: {0}")]
    Malformed(String),
}
