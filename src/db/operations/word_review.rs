use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqliteConnection};

use crate::db::DatabaseProxy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordReview {
    pub word_id: i64,
    pub user_id: i64,
    pub repetition: i64,
    pub next_review: DateTime<Utc>,
    pub last_reviewed: DateTime<Utc>,
}

pub async fn get_review(
    proxy: &DatabaseProxy,
    word_id: i64,
    user_id: i64,
) -> Result<Option<WordReview>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "wordId", "userId", "repetition", "nextReview", "lastReviewed"
           FROM "word_reviews" WHERE "wordId" = ? AND "userId" = ?"#,
    )
    .bind(word_id)
    .bind(user_id)
    .fetch_optional(proxy.pool())
    .await?;

    row.map(|row| {
        Ok(WordReview {
            word_id: row.try_get("wordId")?,
            user_id: row.try_get("userId")?,
            repetition: row.try_get("repetition")?,
            next_review: row.try_get("nextReview")?,
            last_reviewed: row.try_get("lastReviewed")?,
        })
    })
    .transpose()
}

/// Takes the write lock on the review row (creating it at repetition 0 when
/// absent) and returns the prior repetition. A missing row and repetition 0
/// schedule identically, so seeding does not change the outcome.
pub async fn lock_prior_repetition(
    conn: &mut SqliteConnection,
    word_id: i64,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO "word_reviews" ("wordId", "userId", "repetition", "nextReview", "lastReviewed")
           VALUES (?, ?, 0, ?, ?)
           ON CONFLICT ("wordId", "userId") DO NOTHING"#,
    )
    .bind(word_id)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    sqlx::query_scalar(r#"SELECT "repetition" FROM "word_reviews" WHERE "wordId" = ? AND "userId" = ?"#)
        .bind(word_id)
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await
}

pub async fn store_review(
    conn: &mut SqliteConnection,
    review: &WordReview,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE "word_reviews"
           SET "repetition" = ?, "nextReview" = ?, "lastReviewed" = ?
           WHERE "wordId" = ? AND "userId" = ?"#,
    )
    .bind(review.repetition)
    .bind(review.next_review)
    .bind(review.last_reviewed)
    .bind(review.word_id)
    .bind(review.user_id)
    .execute(conn)
    .await?;
    Ok(())
}
