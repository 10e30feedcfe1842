use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::response::{ok, AppError};
use crate::services::leaderboard::{self, PeriodType};
use crate::services::EngineError;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/:period", get(single_board))
}

async fn overview(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let boards = leaderboard::get_leaderboards(
        state.db_proxy(),
        state.ranking_zone(),
        query.limit.unwrap_or(DEFAULT_LIMIT),
    )
    .await?;
    Ok(ok(boards))
}

async fn single_board(
    State(state): State<AppState>,
    Path(period): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let period_type: PeriodType = period.parse().map_err(EngineError::from)?;
    let entries = leaderboard::get_leaderboard(
        state.db_proxy(),
        state.ranking_zone(),
        period_type,
        query.limit.unwrap_or(DEFAULT_LIMIT),
    )
    .await?;
    Ok(ok(entries))
}
