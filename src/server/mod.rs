//! HTTP serving layer
//!
//! REST API for dataset inspection, training runs, and fraud scoring.
//! Routes are nested under `/api/fraud`, with `/api/health` alongside.

mod api;
mod error;
mod handlers;
mod state;

pub use api::create_router;
pub use error::ServerError;
pub use state::AppState;

use crate::data::FraudDataset;
use crate::inference::RiskThresholds;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Server configuration, sourced from environment variables with defaults
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_path: String,
    pub models_dir: String,
    pub prediction_log: Option<PathBuf>,
    pub thresholds: RiskThresholds,
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            data_path: std::env::var("DATA_PATH")
                .unwrap_or_else(|_| "./data/creditcard.csv".to_string()),
            models_dir: std::env::var("MODELS_DIR").unwrap_or_else(|_| "./models".to_string()),
            prediction_log: std::env::var("PREDICTION_LOG").ok().map(PathBuf::from),
            thresholds: RiskThresholds::default(),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100 * 1024 * 1024), // 100MB
        }
    }
}

/// Start the server with the given configuration
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let start_time = chrono::Utc::now();
    info!(
        data_path = %config.data_path,
        models_dir = %config.models_dir,
        started_at = %start_time.to_rfc3339(),
        "Initializing fraud detection server"
    );

    std::fs::create_dir_all(&config.models_dir)?;

    let state = Arc::new(AppState::new(config.clone()));

    // Load the transaction dataset once; training reuses this handle.
    match FraudDataset::load(&config.data_path) {
        Ok(dataset) => {
            let summary = dataset.summary()?;
            info!(
                rows = summary.total_rows,
                fraud = summary.fraud_count,
                fraud_pct = summary.fraud_percentage,
                "dataset loaded"
            );
            state.set_dataset(dataset).await;
        }
        Err(e) => {
            warn!(path = %config.data_path, error = %e, "dataset unavailable, training disabled");
        }
    }

    // Recover persisted artifacts from previous runs
    for artifact in state.store.load_all() {
        state.registry.publish(artifact);
    }
    let loaded = state.registry.loaded();
    if !loaded.is_empty() {
        info!(count = loaded.len(), "persisted models published");
    }

    let app = create_router(Arc::clone(&state), &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        pid = std::process::id(),
        url = %format!("http://{}/api/health", addr),
        "Server listening"
    );

    let shutdown_signal = async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        let uptime = chrono::Utc::now().signed_duration_since(start_time);
        info!(
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shut down cleanly");
    Ok(())
}
