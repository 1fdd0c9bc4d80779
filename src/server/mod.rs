//! server
//!
//! The HTTP surface: an axum router over a shared [`Gateway`].
//!
//! # Routes
//!
//! | Route | Methods |
//! |---|---|
//! | `/gitapi/{kind}/.../file/{repo}/...` | `GET`, `POST`, `PUT`, `DELETE` |
//! | `/task/id/{id}` | `GET` (poll), `DELETE` (cancel) |
//!
//! Every error response carries a `ServerStatus` JSON body. Requests are
//! traced by `tower_http::trace::TraceLayer`.

pub mod error;
pub mod multipart;
mod resources;
mod tasks;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::engine::Gateway;

pub use error::AppError;

/// How often finished tasks past their retention are dropped.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ── Config ──

pub struct ServeConfig {
    pub bind: String,
    pub port: u16,
}

// ── App State ──

pub(crate) struct AppState {
    gateway: Arc<Gateway>,
}

// ── Entrypoint ──

/// Bind the listener and serve until Ctrl-C.
pub async fn serve(gateway: Arc<Gateway>, config: ServeConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, root = %gateway.root().display(), "gitgate listening");

    let sweeper = tokio::spawn(sweep_tasks(gateway.clone()));
    let result = axum::serve(listener, router(gateway))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    sweeper.abort();
    result?;
    tracing::info!("server stopped");
    Ok(())
}

/// Build the router without binding a port.
pub fn router(gateway: Arc<Gateway>) -> Router {
    let state = Arc::new(AppState { gateway });
    Router::new()
        .route(
            "/gitapi/{*rest}",
            get(resources::get_resource)
                .post(resources::post_resource)
                .put(resources::put_resource)
                .delete(resources::delete_resource),
        )
        .route("/task/id/{id}", get(tasks::poll_task).delete(tasks::cancel_task))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn sweep_tasks(gateway: Arc<Gateway>) {
    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        interval.tick().await;
        gateway.tasks().sweep();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
