//! HTTP surface for the layscience job service.

pub mod error;
pub mod handlers;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ServerError};
pub use state::AppState;

pub const API_PREFIX: &str = "/api/v1";

/// Builds the API router. Upload bodies are capped at the configured
/// upload limit; other routes keep axum's default limit.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.uploads().max_bytes();

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/jobs", post(handlers::create_job).get(handlers::list_jobs))
        .route("/jobs/{id}", get(handlers::get_job))
        .route("/summaries/{id}", get(handlers::get_summary))
        .route("/summaries/{id}/translate", post(handlers::translate_summary));

    Router::new()
        .nest(API_PREFIX, api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn parse_bind(address: &str) -> Result<SocketAddr, ServerError> {
    address
        .trim()
        .parse()
        .map_err(|source| ServerError::InvalidBind {
            address: address.to_string(),
            source,
        })
}

/// Serves `state` on `address` until `shutdown` resolves.
pub async fn serve<F>(state: AppState, address: &str, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = parse_bind(address)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            address: addr.to_string(),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(ServerError::Serve)?;
    tracing::info!(%local_addr, "layscience server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;

    tracing::info!("server shutdown complete");
    Ok(())
}
