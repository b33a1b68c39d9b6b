use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use common::{LogEntry, StrategyId, StrategySnapshot};
use strategy::{CatalogEntry, StrategyEntry};

use crate::error::ApiResult;
use crate::AppState;

pub fn strategy_router() -> Router<AppState> {
    Router::new()
        .route("/api/algorithms", get(list_algorithms))
        .route("/api/strategies", get(list_strategies).post(create_strategy))
        .route("/api/strategies/:id", get(get_strategy).delete(delete_strategy))
        .route("/api/strategies/:id/start", post(start_strategy))
        .route("/api/strategies/:id/stop", post(stop_strategy))
        .route("/api/strategies/:id/logs", get(strategy_logs))
}

async fn list_algorithms(State(state): State<AppState>) -> Json<Vec<CatalogEntry>> {
    Json(state.manager.algorithms())
}

async fn list_strategies(State(state): State<AppState>) -> Json<Vec<StrategySnapshot>> {
    Json(state.manager.list_all().await)
}

/// Body: `{"type": "grid", "name": ..., "pair": ..., "params": {...}}`.
async fn create_strategy(
    State(state): State<AppState>,
    Json(body): Json<StrategyEntry>,
) -> ApiResult<(StatusCode, Json<StrategySnapshot>)> {
    let snapshot = state
        .manager
        .create_strategy(&body.algorithm, body.draft)
        .await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

async fn get_strategy(
    State(state): State<AppState>,
    Path(id): Path<StrategyId>,
) -> ApiResult<Json<StrategySnapshot>> {
    Ok(Json(state.manager.get(id).await?))
}

async fn delete_strategy(
    State(state): State<AppState>,
    Path(id): Path<StrategyId>,
) -> ApiResult<StatusCode> {
    state.manager.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_strategy(
    State(state): State<AppState>,
    Path(id): Path<StrategyId>,
) -> ApiResult<Json<StrategySnapshot>> {
    Ok(Json(state.manager.start(id).await?))
}

async fn stop_strategy(
    State(state): State<AppState>,
    Path(id): Path<StrategyId>,
) -> ApiResult<Json<StrategySnapshot>> {
    Ok(Json(state.manager.stop(id).await?))
}

async fn strategy_logs(
    State(state): State<AppState>,
    Path(id): Path<StrategyId>,
) -> ApiResult<Json<Vec<LogEntry>>> {
    Ok(Json(state.manager.logs(id).await?))
}
