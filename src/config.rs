use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::inference::ModelSource;

/// Application configuration loaded from environment variables.
///
/// All settings can be configured via environment variables with the `SOLAR_`
/// prefix. For example: `SOLAR_SERVER__PORT=8080`, `SOLAR_MODEL__ENABLE_CUDA=true`
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Segmentation model configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Advisory LLM endpoint configuration
    #[serde(default)]
    pub advisor: AdvisorConfig,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Ordered model sources, tried first to last. Local paths and
    /// http(s) URLs are both accepted.
    #[serde(default = "default_model_sources")]
    pub sources: Vec<String>,

    /// Override for the download cache directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Enable CUDA acceleration
    #[serde(default)]
    pub enable_cuda: bool,

    /// Whether startup must fail when no source resolves. Disable only for
    /// UI development; image analysis then returns a canned mock estimate.
    #[serde(default = "default_model_required")]
    pub required: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sources: default_model_sources(),
            cache_dir: None,
            enable_cuda: false,
            required: default_model_required(),
        }
    }
}

fn default_model_sources() -> Vec<String> {
    vec![
        "./rooftop_best_model.onnx".to_string(),
        "https://github.com/yogesh-pro/solar-rooftop-analyzer/releases/download/v1.0/rooftop_best_model.onnx"
            .to_string(),
        "https://github.com/yogesh-pro/solar-rooftop-analyzer/releases/download/Model/rooftop_best_model.onnx"
            .to_string(),
    ]
}

fn default_model_required() -> bool {
    true
}

impl ModelConfig {
    /// Parse the configured source strings into typed model sources,
    /// preserving order.
    pub fn parsed_sources(&self) -> Vec<ModelSource> {
        self.sources.iter().map(|s| ModelSource::parse(s)).collect()
    }

    /// Path the download cache writes the model artifact to.
    pub fn cache_file(&self) -> PathBuf {
        let dir = self
            .cache_dir
            .clone()
            .unwrap_or_else(crate::inference::default_cache_dir);
        dir.join("rooftop_best_model.onnx")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorConfig {
    /// Base URL of the chat-completion API
    #[serde(default = "default_advisor_base_url")]
    pub base_url: String,

    /// Model identifier sent with each completion request
    #[serde(default = "default_advisor_model")]
    pub model: String,

    /// Bearer credential for the advisory endpoint. Defaults from the
    /// `OPENROUTER_API_KEY` process variable; startup fails without it.
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            base_url: default_advisor_base_url(),
            model: default_advisor_model(),
            api_key: default_api_key(),
        }
    }
}

fn default_advisor_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_advisor_model() -> String {
    "google/gemma-3-12b-it:free".to_string()
}

fn default_api_key() -> Option<String> {
    std::env::var("OPENROUTER_API_KEY").ok()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl ServerConfig {
    /// Returns the socket address for binding the server
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Invalid socket address")
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables should be prefixed with `SOLAR_` and use
    /// double underscores for nested values:
    /// - `SOLAR_MODEL__ENABLE_CUDA` -> model.enable_cuda
    /// - `SOLAR_ADVISOR__MODEL` -> advisor.model
    /// - `SOLAR_SERVER__PORT` -> server.port
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("SOLAR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            advisor: AdvisorConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.model.sources.len(), 3);
        assert!(config.model.required);
        assert!(!config.model.enable_cuda);
        assert_eq!(config.advisor.model, "google/gemma-3-12b-it:free");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_source_order_preserved() {
        let config = ModelConfig::default();
        let sources = config.parsed_sources();

        assert_eq!(sources.len(), 3);
        assert!(matches!(sources[0], ModelSource::Local(_)));
        assert!(matches!(sources[1], ModelSource::Remote(_)));
    }

    #[test]
    fn test_cache_file_honors_override() {
        let config = ModelConfig {
            cache_dir: Some(PathBuf::from("/tmp/models")),
            ..ModelConfig::default()
        };
        assert_eq!(
            config.cache_file(),
            PathBuf::from("/tmp/models/rooftop_best_model.onnx")
        );
    }

    #[test]
    fn test_socket_addr() {
        let server = ServerConfig::default();
        let addr = server.socket_addr();
        assert_eq!(addr.port(), 8080);
    }
}
