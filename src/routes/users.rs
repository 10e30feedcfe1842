use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::response::{ok, AppError};
use crate::routes::parse_external_id;
use crate::services::models::{ExerciseKind, Level, User, UserProfile};
use crate::services::{progress, EngineError};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnsureUserRequest {
    user_id: i64,
    #[serde(flatten)]
    profile: UserProfile,
}

#[derive(Debug, Default, Deserialize)]
struct RequestExerciseBody {
    #[serde(default)]
    kinds: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitAnswerRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChangeLevelRequest {
    level: String,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserView {
    #[serde(flatten)]
    user: User,
    remaining_exercises: i64,
}

#[derive(Serialize)]
struct CountView {
    total: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(ensure_user).get(list_users))
        .route("/count", get(count_users))
        .route("/:id", get(get_user))
        .route("/:id/exercise", post(request_exercise))
        .route("/:id/vocab", post(request_vocab))
        .route("/:id/answer", post(submit_answer))
        .route("/:id/reveal", post(reveal_answer))
        .route("/:id/reset", post(reset))
        .route("/:id/level", put(change_level))
}

async fn ensure_user(
    State(state): State<AppState>,
    Json(body): Json<EnsureUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = progress::ensure_user(state.db_proxy(), body.user_id, &body.profile).await?;
    Ok(ok(user))
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let users = progress::list_users(
        state.db_proxy(),
        query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        query.offset.unwrap_or(0),
    )
    .await?;
    Ok(ok(users))
}

async fn count_users(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let total = progress::count_users(state.db_proxy()).await?;
    Ok(ok(CountView { total }))
}

async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let external_id = parse_external_id(&id)?;
    let proxy = state.db_proxy();
    let user = progress::get_user(proxy, external_id).await?;
    let remaining_exercises = progress::remaining_exercises(proxy, external_id).await?;
    Ok(ok(UserView {
        user,
        remaining_exercises,
    }))
}

async fn request_exercise(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<RequestExerciseBody>>,
) -> Result<impl IntoResponse, AppError> {
    let external_id = parse_external_id(&id)?;
    let body = body.map(|Json(body)| body).unwrap_or_default();
    let kinds = body
        .kinds
        .iter()
        .map(|k| k.parse::<ExerciseKind>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(EngineError::from)?;

    let exercise = progress::request_exercise(state.db_proxy(), external_id, &kinds).await?;
    Ok(ok(exercise))
}

async fn request_vocab(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let external_id = parse_external_id(&id)?;
    let word = progress::request_vocab(state.db_proxy(), external_id).await?;
    Ok(ok(word))
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let external_id = parse_external_id(&id)?;
    let outcome = progress::submit_answer(
        state.db_proxy(),
        state.grader(),
        state.policy(),
        state.ranking_zone(),
        external_id,
        &body.text,
    )
    .await?;
    Ok(ok(outcome))
}

async fn reveal_answer(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let external_id = parse_external_id(&id)?;
    let revealed = progress::reveal_answer(state.db_proxy(), state.policy(), external_id).await?;
    Ok(ok(revealed))
}

async fn reset(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let external_id = parse_external_id(&id)?;
    let user = progress::reset(state.db_proxy(), external_id).await?;
    Ok(ok(user))
}

async fn change_level(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ChangeLevelRequest>,
) -> Result<impl IntoResponse, AppError> {
    let external_id = parse_external_id(&id)?;
    let level: Level = body.level.parse().map_err(EngineError::from)?;
    let user = progress::change_level(state.db_proxy(), external_id, level).await?;
    Ok(ok(user))
}
