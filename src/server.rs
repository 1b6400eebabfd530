use crate::handlers::{self, AppState};
use crate::middleware::request_id;
use crate::service::RiskService;
use axum::{
    http::Method,
    middleware,
    routing::{get, post},
    Router,
};
use hyper::Server;
use std::future::Future;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Create the HTTP router with all routes
pub fn create_router(service: Arc<RiskService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/risks/health", get(handlers::health))
        .route(
            "/v1/risks",
            post(handlers::create_risk).get(handlers::list_risks),
        )
        .route(
            "/v1/risks/:id",
            get(handlers::get_risk).delete(handlers::delete_risk),
        )
        .with_state(AppState { service })
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id))
                .layer(cors),
        )
}

/// Serve on `listener` until `shutdown` resolves, then give in-flight
/// requests up to `grace_period` to finish.
///
/// A drain that overruns the grace period is logged, not returned as an error.
pub async fn start_server<F>(
    listener: TcpListener,
    service: Arc<RiskService>,
    shutdown: F,
    grace_period: Duration,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    listener.set_nonblocking(true)?;
    let addr = listener.local_addr()?;
    let app = create_router(service);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = Server::from_tcp(listener)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            stop_rx.await.ok();
        });
    tokio::pin!(server);

    info!("HTTP server running on http://{addr}");
    info!("Health check: http://{addr}/risks/health");

    tokio::select! {
        result = &mut server => {
            result?;
            return Ok(());
        }
        _ = shutdown => {
            info!("Shutting down HTTP server, waiting up to {:?} for in-flight requests", grace_period);
        }
    }

    let _ = stop_tx.send(());
    match tokio::time::timeout(grace_period, &mut server).await {
        Ok(Ok(())) => info!("Successfully and gracefully shut down HTTP server"),
        Ok(Err(e)) => error!("Failed to gracefully shut down HTTP server: {e}"),
        Err(_) => warn!(
            "HTTP server did not drain within {:?}, abandoning in-flight requests",
            grace_period
        ),
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
