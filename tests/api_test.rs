use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use renshu_backend_rust::services::models::Level;

mod common;

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health_root() {
    let db = common::create_test_db().await;
    let app = common::create_test_app(&db);

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_health_live() {
    let db = common::create_test_db().await;
    let app = common::create_test_app(&db);

    let (status, body) = send(&app, "GET", "/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_unknown_route_uses_error_envelope() {
    let db = common::create_test_db().await;
    let app = common::create_test_app(&db);

    let (status, body) = send(&app, "GET", "/api/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_register_and_fetch_user() {
    let db = common::create_test_db().await;
    let app = common::create_test_app(&db);

    let (status, body) = send(
        &app,
        "POST",
        "/api/users",
        Some(json!({"userId": 501, "username": "sora", "firstName": "Sora"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["userId"], 501);
    assert_eq!(body["data"]["level"], "N5");
    assert_eq!(body["data"]["session"]["state"], "idle");

    let (status, body) = send(&app, "GET", "/api/users/501", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "sora");
    assert_eq!(body["data"]["remainingExercises"], 0);

    let (status, body) = send(&app, "GET", "/api/users/count", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);

    let (status, body) = send(&app, "GET", "/api/users?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_missing_and_malformed_users() {
    let db = common::create_test_db().await;
    let app = common::create_test_app(&db);

    let (status, body) = send(&app, "GET", "/api/users/404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send(&app, "POST", "/api/users/abc/exercise", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_exercise_round_trip_over_http() {
    let db = common::create_test_db().await;
    let app = common::create_test_app(&db);
    let exercise_id = common::seed_question(&db.proxy, Level::N5, "好きな食べ物は？").await;

    send(&app, "POST", "/api/users", Some(json!({"userId": 9, "username": "ren"}))).await;

    let (status, body) = send(&app, "POST", "/api/users/9/exercise", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], exercise_id);
    assert_eq!(body["data"]["type"], "question");
    assert_eq!(body["data"]["content"]["question"], "好きな食べ物は？");

    let (status, body) = send(&app, "POST", "/api/users/9/exercise", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = send(&app, "POST", "/api/users/9/answer", Some(json!({"text": "wrong"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isCorrect"], false);
    assert_eq!(body["data"]["session"]["state"], "awaiting_exercise");
    assert_eq!(body["data"]["session"]["exerciseId"], exercise_id);

    let (status, body) = send(&app, "POST", "/api/users/9/answer", Some(json!({"text": "right"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isCorrect"], true);
    assert_eq!(body["data"]["session"]["state"], "idle");

    let (status, body) = send(&app, "POST", "/api/users/9/answer", Some(json!({"text": "right"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, body) = send(&app, "GET", "/api/leaderboard/daily", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["userId"], 9);
    assert_eq!(body["data"][0]["score"], 1);
    assert_eq!(body["data"][0]["rank"], 1);

    let (status, body) = send(&app, "GET", "/api/leaderboard?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["weekly"][0]["username"], "ren");
    assert_eq!(body["data"]["monthly"][0]["score"], 1);

    let (status, body) = send(&app, "POST", "/api/users/9/exercise", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "no content available");
}

#[tokio::test]
async fn test_vocab_reveal_and_reset() {
    let db = common::create_test_db().await;
    let app = common::create_test_app(&db);
    common::seed_word(&db.proxy, Level::N5, Some("雨"), "あめ", "rain").await;
    send(&app, "POST", "/api/users", Some(json!({"userId": 33}))).await;

    let (status, body) = send(&app, "POST", "/api/users/33/reveal", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = send(&app, "POST", "/api/users/33/vocab", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["translation"], "rain");

    let (status, body) = send(&app, "POST", "/api/users/33/reveal", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["answer"], "雨");
    assert_eq!(body["data"]["review"]["repetition"], 0);

    let (status, body) = send(&app, "POST", "/api/users/33/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["session"]["state"], "idle");
    assert_eq!(body["data"]["session"]["mode"], "exercise");
}

#[tokio::test]
async fn test_level_and_leaderboard_validation() {
    let db = common::create_test_db().await;
    let app = common::create_test_app(&db);
    send(&app, "POST", "/api/users", Some(json!({"userId": 4}))).await;

    let (status, body) = send(&app, "PUT", "/api/users/4/level", Some(json!({"level": "n3"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["level"], "N3");

    let (status, body) = send(&app, "PUT", "/api/users/4/level", Some(json!({"level": "N9"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = send(&app, "GET", "/api/leaderboard/yearly", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/leaderboard/weekly?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        "POST",
        "/api/users/4/exercise",
        Some(json!({"kinds": ["crossword"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = send(&app, "POST", "/api/users/4/answer", Some(json!({"text": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
