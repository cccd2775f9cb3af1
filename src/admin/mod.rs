pub mod handlers;
pub mod auth;

use axum::{
    middleware,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::balancer::pool::BackendPool;
use crate::ratelimit::RateLimiter;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State injected into admin handlers and the auth middleware.
#[derive(Clone)]
pub struct AdminState {
    pub pool: Arc<BackendPool>,
    pub limiter: Arc<RateLimiter>,
    pub api_key: String,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .route("/admin/ratelimits", get(get_ratelimits).post(set_ratelimit))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until the shutdown signal fires.
pub async fn run_admin_server(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin server starting");

    let app = setup_admin_router(state).into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Admin server received shutdown signal");
        })
        .await?;

    tracing::info!("Admin server stopped");
    Ok(())
}
