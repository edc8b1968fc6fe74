//! HTTP surface: htmx fragment routes, the push channel and static files.
//!
//! Every route goes through [`SubscriptionService`]; handlers hold no state
//! of their own.

pub mod handlers;
pub mod render;
pub mod ws;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use tubecore::SubscriptionService;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SubscriptionService>,
}

impl AppState {
    pub fn new(service: Arc<SubscriptionService>) -> Self {
        Self { service }
    }
}

/// Builds the application router. Files under the data root are served at
/// `/static/data`.
pub fn router(state: AppState) -> Router {
    let data_root = state.service.data_root().to_path_buf();

    Router::new()
        .route("/", get(handlers::index))
        .route("/subscriptions", get(handlers::subscriptions))
        .route("/items", get(handlers::subscriptions))
        .route("/add", post(handlers::add))
        .route("/remove/{*url}", delete(handlers::remove))
        .route("/update/{*url}", post(handlers::update))
        .route("/set-parameters", post(handlers::set_parameters))
        .route("/videos/{channel_id}", get(handlers::videos))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(handlers::health))
        .nest_service("/static/data", ServeDir::new(data_root))
        .with_state(state)
}

/// Start the web server and run until Ctrl-C.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address {}:{}: {}", host, port, e))?;

    let app = router(state);

    log::info!("Starting web server on http://{}", addr);
    log::info!("  /              - Subscription manager (HTML)");
    log::info!("  /ws            - Push channel (WebSocket)");
    log::info!("  /static/data/  - Downloaded files");
    log::info!("  /health        - Health check");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    log::info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
