use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::state::AppState;

const DB_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    database_latency_ms: Option<u64>,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LivenessResponse {
    status: &'static str,
    timestamp: String,
    start_time: String,
    uptime: u64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(root)).route("/live", get(live))
}

async fn root(State(state): State<AppState>) -> Response {
    let (database, latency, status_code) = match state.db_proxy().ping(DB_CHECK_TIMEOUT).await {
        Ok(elapsed) => ("connected", Some(elapsed.as_millis() as u64), StatusCode::OK),
        Err(err) => {
            tracing::warn!(error = %err, "database health check failed");
            ("disconnected", None, StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let response = HealthResponse {
        status: if status_code == StatusCode::OK { "ok" } else { "degraded" },
        database,
        database_latency_ms: latency,
        timestamp: now_iso(),
    };
    (status_code, Json(response)).into_response()
}

async fn live(State(state): State<AppState>) -> Response {
    let started: DateTime<Utc> = state.started_at_system().into();
    Json(LivenessResponse {
        status: "healthy",
        timestamp: now_iso(),
        start_time: started.to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.uptime_seconds(),
    })
    .into_response()
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
