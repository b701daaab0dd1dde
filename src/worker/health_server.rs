use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{config::config_model::DotEnvyConfig, infrastructure::axum_http::default_routers};

/// Liveness surface for the worker process.
pub async fn start(config: Arc<DotEnvyConfig>) -> Result<()> {
    let app = Router::new()
        .fallback(default_routers::not_found)
        .route("/health-check", get(default_routers::health_check))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.worker_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Worker health server is running on port {}", config.worker_server.port);
    axum::serve(listener, app).await?;

    Ok(())
}
