//! HTTP surface over the monitor operations

pub mod error;
pub mod routes;

use axum::{
    Router,
    routing::{get, post},
};
use log::info;
use std::net::SocketAddr;

use crate::monitor::Monitor;

pub fn build_router(monitor: Monitor) -> Router {
    Router::new()
        .route("/api/status", get(routes::status))
        .route("/api/analyze", post(routes::analyze))
        .route("/api/scan", post(routes::scan))
        .route("/api/bruteforce", post(routes::bruteforce))
        .with_state(monitor)
}

/// Bind `addr` and serve until the process exits
pub async fn serve(monitor: Monitor, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(monitor, listener).await
}

/// Serve on an already bound listener
pub async fn serve_on(monitor: Monitor, listener: tokio::net::TcpListener) -> std::io::Result<()> {
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(monitor)).await
}
