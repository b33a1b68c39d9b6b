use axum::{extract::State, routing::post, Json, Router};

use backtest::{BacktestConfig, BacktestReport};

use crate::error::ApiResult;
use crate::AppState;

pub fn backtest_router() -> Router<AppState> {
    Router::new().route("/api/backtests", post(run_backtest))
}

async fn run_backtest(
    State(state): State<AppState>,
    Json(config): Json<BacktestConfig>,
) -> ApiResult<Json<BacktestReport>> {
    Ok(Json(state.backtest.run(&config).await?))
}
