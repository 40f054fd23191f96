//! Solar Rooftop Analyzer
//!
//! A single-binary HTTP service that estimates usable rooftop area from
//! uploaded imagery via a pretrained segmentation model (ONNX Runtime),
//! obtains a solar installation advisory from an external LLM endpoint,
//! and renders a bill-comparison chart.

pub mod advisory;
pub mod chart;
pub mod config;
pub mod error;
pub mod inference;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, Result};

pub use advisory::{AdvisoryClient, AdvisoryMetrics};
pub use inference::{AreaEstimate, Device, ModelSource, RooftopModel};
