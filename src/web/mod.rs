mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::bsky::PostSource;
use crate::community::PresentationOptions;
use crate::config::Config;
use crate::feed::FeedStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn PostSource>,
    pub config: Arc<Config>,
    pub feeds: FeedStore,
}

impl AppState {
    #[must_use]
    pub fn new(source: Arc<dyn PostSource>, config: Config, feeds: FeedStore) -> Self {
        Self {
            source,
            config: Arc::new(config),
            feeds,
        }
    }

    fn presentation_options(&self) -> PresentationOptions {
        PresentationOptions {
            max_reply_depth: self.config.max_reply_depth,
            concurrency: self.config.presentation_concurrency,
        }
    }
}

/// Start the web server.
///
/// # Errors
///
/// Returns an error if the server fails to bind or stops unexpectedly.
pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.web_host, state.config.web_port)
        .parse()
        .context("Invalid web server address")?;

    let app = create_app(state);

    info!(addr = %addr, "Starting HTTP web server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind web server")?;

    axum::serve(listener, app)
        .await
        .context("Web server error")?;

    Ok(())
}

/// Create the main application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
