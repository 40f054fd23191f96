//! Solar Rooftop Analyzer - Entry Point

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rooftop_analyzer::advisory::AdvisoryClient;
use rooftop_analyzer::config::AppConfig;
use rooftop_analyzer::inference::resolve_model;
use rooftop_analyzer::server::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Solar Rooftop Analyzer");

    // Load configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config from environment: {e}, using defaults");
        AppConfig::default()
    });

    info!(
        sources = config.model.sources.len(),
        cuda = config.model.enable_cuda,
        advisor_model = %config.advisor.model,
        "Configuration loaded"
    );

    // A missing advisory credential halts startup
    let advisor = AdvisoryClient::new(&config.advisor)
        .context("Advisory credential missing or invalid (set OPENROUTER_API_KEY)")?;

    // Resolve the segmentation model once; the handle is shared for the
    // process lifetime
    let sources = config.model.parsed_sources();
    let cache_file = config.model.cache_file();
    let state = match resolve_model(&sources, &cache_file, config.model.enable_cuda).await {
        Ok(model) => {
            info!(device = %model.device(), "Segmentation model ready");
            AppState::with_model(config.clone(), advisor, model)
        }
        Err(e) if !config.model.required => {
            warn!(error = %e, "Model not available, running in development mode - image analysis returns mock estimates");
            AppState::new(config.clone(), advisor)
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context("Model resolution failed and model.required is set"));
        }
    };

    // Create router
    let app = create_router(state);

    // Bind to socket
    let addr = config.server.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(%addr, "Server listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber for logging
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rooftop_analyzer=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
