use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqliteConnection};

use crate::db::DatabaseProxy;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: i64,
    pub user_id: i64,
    pub exercise_id: i64,
    pub user_input: String,
    pub feedback: String,
    pub is_correct: bool,
    pub created_at: DateTime<Utc>,
}

pub async fn insert_submission(
    conn: &mut SqliteConnection,
    user_id: i64,
    exercise_id: i64,
    user_input: &str,
    feedback: &str,
    is_correct: bool,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"INSERT INTO "user_submissions" ("userId", "exerciseId", "userInput", "feedback", "isCorrect", "createdAt")
           VALUES (?, ?, ?, ?, ?, ?) RETURNING "id""#,
    )
    .bind(user_id)
    .bind(exercise_id)
    .bind(user_input)
    .bind(feedback)
    .bind(is_correct)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

pub async fn list_for_exercise(
    proxy: &DatabaseProxy,
    user_id: i64,
    exercise_id: i64,
) -> Result<Vec<Submission>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT "id", "userId", "exerciseId", "userInput", "feedback", "isCorrect", "createdAt"
           FROM "user_submissions"
           WHERE "userId" = ? AND "exerciseId" = ?
           ORDER BY "id""#,
    )
    .bind(user_id)
    .bind(exercise_id)
    .fetch_all(proxy.pool())
    .await?;

    rows.iter()
        .map(|row| {
            Ok(Submission {
                id: row.try_get("id")?,
                user_id: row.try_get("userId")?,
                exercise_id: row.try_get("exerciseId")?,
                user_input: row.try_get("userInput")?,
                feedback: row.try_get("feedback")?,
                is_correct: row.try_get("isCorrect")?,
                created_at: row.try_get("createdAt")?,
            })
        })
        .collect()
}
