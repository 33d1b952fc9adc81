// src/server.rs

//! Operator endpoint: liveness and metrics exposition.

use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::Result;

pub fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        )
}

/// Serve the operator endpoint until shutdown.
pub async fn serve(port: u16, handle: PrometheusHandle, cancel: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "starting health check server");

    axum::serve(listener, router(handle))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
