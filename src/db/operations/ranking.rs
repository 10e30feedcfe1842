use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use crate::db::operations::decode_variant;
use crate::db::DatabaseProxy;
use crate::services::leaderboard::PeriodWindow;
use crate::services::models::Level;

#[derive(Debug, Clone, PartialEq)]
pub struct RankingRow {
    pub external_id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub level: Level,
    pub score: i64,
}

/// Adds `amount` to the user's score for one period, creating the row on
/// first use. Single statement, so concurrent increments never lose updates.
pub async fn increment_score(
    conn: &mut SqliteConnection,
    user_id: i64,
    window: &PeriodWindow,
    amount: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO "user_rankings" ("userId", "score", "periodStart", "periodEnd", "periodType", "createdAt")
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT ("userId", "periodStart", "periodEnd", "periodType")
           DO UPDATE SET "score" = "user_rankings"."score" + excluded."score""#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(window.start)
    .bind(window.end)
    .bind(window.period_type.as_str())
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn get_score(
    proxy: &DatabaseProxy,
    user_id: i64,
    window: &PeriodWindow,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT "score" FROM "user_rankings"
           WHERE "userId" = ? AND "periodStart" = ? AND "periodEnd" = ? AND "periodType" = ?"#,
    )
    .bind(user_id)
    .bind(window.start)
    .bind(window.end)
    .bind(window.period_type.as_str())
    .fetch_optional(proxy.pool())
    .await
}

/// Highest scores inside the window for users with a public username,
/// best first, equal scores by ascending external id.
pub async fn top_scores(
    proxy: &DatabaseProxy,
    window: &PeriodWindow,
    limit: i64,
) -> Result<Vec<RankingRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT u."externalId", u."username", u."firstName", u."lastName", u."avatarUrl",
                  u."level", r."score"
           FROM "user_rankings" r
           JOIN "users" u ON u."id" = r."userId"
           WHERE r."periodType" = ?
             AND r."periodStart" >= ?
             AND r."periodEnd" <= ?
             AND u."username" IS NOT NULL
           ORDER BY r."score" DESC, u."externalId" ASC
           LIMIT ?"#,
    )
    .bind(window.period_type.as_str())
    .bind(window.start)
    .bind(window.end)
    .bind(limit)
    .fetch_all(proxy.pool())
    .await?;

    rows.iter()
        .map(|row| {
            let level: String = row.try_get("level")?;
            Ok(RankingRow {
                external_id: row.try_get("externalId")?,
                username: row.try_get("username")?,
                first_name: row.try_get("firstName")?,
                last_name: row.try_get("lastName")?,
                avatar_url: row.try_get("avatarUrl")?,
                level: decode_variant(&level)?,
                score: row.try_get("score")?,
            })
        })
        .collect()
}
