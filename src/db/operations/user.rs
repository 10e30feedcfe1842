use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::db::operations::decode_variant;
use crate::db::DatabaseProxy;
use crate::services::models::{Level, SessionMode, SessionState, User, UserProfile};

const USER_COLUMNS: &str = r#""id", "externalId", "username", "firstName", "lastName", "avatarUrl",
    "level", "points", "exercisesDone", "currentExerciseId", "currentWordId", "currentMode",
    "createdAt", "updatedAt""#;

/// Matches rows whose mode-selected pointer is empty.
const NO_OUTSTANDING_ITEM: &str = r#"NOT (("currentMode" = 'exercise' AND "currentExerciseId" IS NOT NULL)
    OR ("currentMode" = 'vocab' AND "currentWordId" IS NOT NULL))"#;

pub async fn get_user(proxy: &DatabaseProxy, external_id: i64) -> Result<Option<User>, sqlx::Error> {
    let row = sqlx::query(&format!(
        r#"SELECT {USER_COLUMNS} FROM "users" WHERE "externalId" = ?"#
    ))
    .bind(external_id)
    .fetch_optional(proxy.pool())
    .await?;

    row.as_ref().map(map_user_row).transpose()
}

/// Inserts the user unless one with this external id already exists.
/// Returns true when a row was created.
pub async fn insert_user(
    proxy: &DatabaseProxy,
    external_id: i64,
    profile: &UserProfile,
    level: Level,
) -> Result<bool, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"INSERT INTO "users" (
               "externalId", "username", "firstName", "lastName", "avatarUrl",
               "level", "currentMode", "createdAt", "updatedAt"
           ) VALUES (?, ?, ?, ?, ?, ?, 'exercise', ?, ?)
           ON CONFLICT ("externalId") DO NOTHING"#,
    )
    .bind(external_id)
    .bind(profile.username.as_deref())
    .bind(profile.first_name.as_deref())
    .bind(profile.last_name.as_deref())
    .bind(profile.avatar_url.as_deref())
    .bind(level.as_str())
    .bind(now)
    .bind(now)
    .execute(proxy.pool())
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Refreshes names from the transport profile. A stored avatar is only
/// replaced when none was set before.
pub async fn update_profile(
    proxy: &DatabaseProxy,
    external_id: i64,
    profile: &UserProfile,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE "users" SET
               "username" = COALESCE(?, "username"),
               "firstName" = COALESCE(?, "firstName"),
               "lastName" = COALESCE(?, "lastName"),
               "avatarUrl" = COALESCE("avatarUrl", ?),
               "updatedAt" = ?
           WHERE "externalId" = ?"#,
    )
    .bind(profile.username.as_deref())
    .bind(profile.first_name.as_deref())
    .bind(profile.last_name.as_deref())
    .bind(profile.avatar_url.as_deref())
    .bind(Utc::now())
    .bind(external_id)
    .execute(proxy.pool())
    .await?;
    Ok(())
}

pub async fn count_users(proxy: &DatabaseProxy) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(r#"SELECT COUNT(*) FROM "users""#)
        .fetch_one(proxy.pool())
        .await
}

pub async fn list_users(
    proxy: &DatabaseProxy,
    limit: i64,
    offset: i64,
) -> Result<Vec<User>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        r#"SELECT {USER_COLUMNS} FROM "users" ORDER BY "createdAt" DESC, "id" DESC LIMIT ? OFFSET ?"#
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(proxy.pool())
    .await?;

    rows.iter().map(map_user_row).collect()
}

/// Makes the exercise the user's outstanding item, but only if nothing is
/// outstanding right now. Returns false when another item won the race.
pub async fn claim_exercise(
    proxy: &DatabaseProxy,
    user_id: i64,
    exercise_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!(
        r#"UPDATE "users" SET
               "currentExerciseId" = ?, "currentWordId" = NULL,
               "currentMode" = 'exercise', "updatedAt" = ?
           WHERE "id" = ? AND {NO_OUTSTANDING_ITEM}"#
    ))
    .bind(exercise_id)
    .bind(Utc::now())
    .bind(user_id)
    .execute(proxy.pool())
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn claim_word(proxy: &DatabaseProxy, user_id: i64, word_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(&format!(
        r#"UPDATE "users" SET
               "currentWordId" = ?, "currentExerciseId" = NULL,
               "currentMode" = 'vocab', "updatedAt" = ?
           WHERE "id" = ? AND {NO_OUTSTANDING_ITEM}"#
    ))
    .bind(word_id)
    .bind(Utc::now())
    .bind(user_id)
    .execute(proxy.pool())
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Takes the write lock for the caller's transaction and confirms that
/// `session` is still what the user owes. False means the item was answered,
/// reset or replaced in the meantime and nothing may be recorded for it.
pub async fn hold_outstanding(
    conn: &mut SqliteConnection,
    user_id: i64,
    session: SessionState,
) -> Result<bool, sqlx::Error> {
    let (mode, column, item_id) = match session {
        SessionState::AwaitingExercise { exercise_id } => ("exercise", "currentExerciseId", exercise_id),
        SessionState::AwaitingWord { word_id } => ("vocab", "currentWordId", word_id),
        SessionState::Idle { .. } => return Ok(false),
    };

    let result = sqlx::query(&format!(
        r#"UPDATE "users" SET "updatedAt" = ?
           WHERE "id" = ? AND "currentMode" = ? AND "{column}" = ?"#
    ))
    .bind(Utc::now())
    .bind(user_id)
    .bind(mode)
    .bind(item_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Clears the outstanding exercise if it is still `exercise_id`.
pub async fn release_exercise(
    conn: &mut SqliteConnection,
    user_id: i64,
    exercise_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE "users" SET "currentExerciseId" = NULL, "updatedAt" = ?
           WHERE "id" = ? AND "currentMode" = 'exercise' AND "currentExerciseId" = ?"#,
    )
    .bind(Utc::now())
    .bind(user_id)
    .bind(exercise_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Clears the outstanding word if it is still `word_id`, crediting the user
/// with `points` and one completed item.
pub async fn release_word_with_credit(
    conn: &mut SqliteConnection,
    user_id: i64,
    word_id: i64,
    points: f64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE "users" SET
               "currentWordId" = NULL,
               "points" = "points" + ?,
               "exercisesDone" = "exercisesDone" + 1,
               "updatedAt" = ?
           WHERE "id" = ? AND "currentMode" = 'vocab' AND "currentWordId" = ?"#,
    )
    .bind(points)
    .bind(Utc::now())
    .bind(user_id)
    .bind(word_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn reset_session(proxy: &DatabaseProxy, user_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE "users" SET
               "currentExerciseId" = NULL, "currentWordId" = NULL,
               "currentMode" = 'exercise', "updatedAt" = ?
           WHERE "id" = ?"#,
    )
    .bind(Utc::now())
    .bind(user_id)
    .execute(proxy.pool())
    .await?;
    Ok(())
}

pub async fn set_level(proxy: &DatabaseProxy, user_id: i64, level: Level) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE "users" SET
               "level" = ?, "currentExerciseId" = NULL, "currentWordId" = NULL, "updatedAt" = ?
           WHERE "id" = ?"#,
    )
    .bind(level.as_str())
    .bind(Utc::now())
    .bind(user_id)
    .execute(proxy.pool())
    .await?;
    Ok(())
}

fn map_user_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    let level: String = row.try_get("level")?;
    let mode: String = row.try_get("currentMode")?;
    let mode: SessionMode = decode_variant(&mode)?;

    Ok(User {
        id: row.try_get("id")?,
        external_id: row.try_get("externalId")?,
        username: row.try_get("username")?,
        first_name: row.try_get("firstName")?,
        last_name: row.try_get("lastName")?,
        avatar_url: row.try_get("avatarUrl")?,
        level: decode_variant(&level)?,
        points: row.try_get("points")?,
        exercises_done: row.try_get("exercisesDone")?,
        session: SessionState::from_columns(
            mode,
            row.try_get("currentExerciseId")?,
            row.try_get("currentWordId")?,
        ),
        created_at: row.try_get("createdAt")?,
        updated_at: row.try_get("updatedAt")?,
    })
}
