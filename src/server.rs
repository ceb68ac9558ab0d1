mod handler;
mod identity;
mod types;

pub use handler::{ContentRouter, RobotsHandler, Telemetry, TrapHandler};
pub use identity::IdentityResolver;
pub use types::RequestContext;

use crate::config::TrapPath;
use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// The handlers registered on the router, built once at startup.
pub struct Handlers {
    pub trap: TrapHandler,
    pub robots: RobotsHandler,
    pub content: ContentRouter,
}

/// Builds the router: the trap path, `/robots.txt`, and everything else
/// through the content router. Other methods on the trap and robots paths
/// fall through to the content router too, so they never answer 405.
pub fn build_router(trap_path: &TrapPath, handlers: Handlers) -> Router {
    Router::new()
        .route(
            trap_path.as_str(),
            get(handle_trap).fallback(handle_content),
        )
        .route("/robots.txt", get(handle_robots).fallback(handle_content))
        .fallback(handle_content)
        .with_state(Arc::new(handlers))
}

async fn handle_trap(State(handlers): State<Arc<Handlers>>, req: Request) -> Response {
    handlers.trap.handle(req).await
}

async fn handle_robots(State(handlers): State<Arc<Handlers>>, req: Request) -> Response {
    handlers.robots.handle(req).await
}

async fn handle_content(State(handlers): State<Arc<Handlers>>, req: Request) -> Response {
    handlers.content.handle(req).await
}

/// Serves until Ctrl-C. Peer addresses are exposed to handlers through
/// `ConnectInfo`.
pub async fn run(listener: TcpListener, router: Router) -> std::io::Result<()> {
    info!("HTTP server listening on {}", listener.local_addr()?);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received."),
        Err(e) => {
            error!("Failed to listen for Ctrl-C, running until killed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
