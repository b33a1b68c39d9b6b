mod auth;
mod error;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use backtest::BacktestEngine;
use common::Result;
use engine::RuntimeManager;

pub use error::{ApiError, ApiResult};

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RuntimeManager>,
    pub backtest: Arc<BacktestEngine>,
    pub api_token: Arc<String>,
}

impl AppState {
    pub fn new(manager: Arc<RuntimeManager>, backtest: Arc<BacktestEngine>, api_token: impl Into<String>) -> Self {
        Self {
            manager,
            backtest,
            api_token: Arc::new(api_token.into()),
        }
    }
}

/// Every route. `/api/*` requires the bearer token, `/healthz` does not.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let protected = Router::new()
        .merge(routes::strategy_router())
        .merge(routes::backtest_router())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .merge(protected)
        .merge(routes::health_router())
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(cors)
}

/// Build and run the Axum API server until `shutdown` resolves.
pub async fn serve<F>(state: AppState, port: u16, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
