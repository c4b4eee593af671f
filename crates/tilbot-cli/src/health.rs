//! Liveness endpoint for uptime monitors, served apart from the Telegram loop.

use std::future::Future;

use axum::routing::get;
use axum::Router;
use tilbot_core::constants::transport::HEALTH_BODY;
use tracing::info;

pub fn router() -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(alive))
}

async fn alive() -> &'static str {
    HEALTH_BODY
}

/// Serve the liveness routes on `bind` until `shutdown` resolves.
pub async fn serve<F>(bind: &str, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Health check available at http://{}/health", listener.local_addr()?);

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
}
