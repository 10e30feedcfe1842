use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use crate::db::operations::{decode_err, decode_variant};
use crate::db::DatabaseProxy;
use crate::services::models::{
    Exercise, ExerciseContent, ExerciseKind, Level, NewExercise, NewWord, Word, WordExample,
};

/// Exercise at a level together with how often the user already submitted to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExerciseCandidate {
    pub id: i64,
    pub kind: ExerciseKind,
    pub times_shown: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueWord {
    pub word_id: i64,
    pub next_review: DateTime<Utc>,
}

pub async fn insert_exercises(
    proxy: &DatabaseProxy,
    exercises: &[NewExercise],
) -> Result<Vec<i64>, sqlx::Error> {
    let now = Utc::now();
    let mut tx = proxy.pool().begin().await?;
    let mut ids = Vec::with_capacity(exercises.len());

    for exercise in exercises {
        let payload = exercise.content.to_stored().map_err(decode_err)?;
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO "exercises" ("level", "type", "content", "createdAt")
               VALUES (?, ?, ?, ?) RETURNING "id""#,
        )
        .bind(exercise.level.as_str())
        .bind(exercise.content.kind().as_str())
        .bind(payload)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        ids.push(id);
    }

    tx.commit().await?;
    Ok(ids)
}

pub async fn insert_words(proxy: &DatabaseProxy, words: &[NewWord]) -> Result<Vec<i64>, sqlx::Error> {
    let now = Utc::now();
    let mut tx = proxy.pool().begin().await?;
    let mut ids = Vec::with_capacity(words.len());

    for word in words {
        let examples = serde_json::to_string(&word.examples).map_err(decode_err)?;
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO "words" ("kanji", "kana", "translation", "examples", "level", "audioUrl", "createdAt")
               VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING "id""#,
        )
        .bind(word.kanji.as_deref())
        .bind(&word.kana)
        .bind(&word.translation)
        .bind(examples)
        .bind(word.level.as_str())
        .bind(&word.audio_url)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        ids.push(id);
    }

    tx.commit().await?;
    Ok(ids)
}

pub async fn get_exercises_by_level(
    proxy: &DatabaseProxy,
    level: Level,
) -> Result<Vec<Exercise>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT "id", "level", "type", "content", "createdAt"
           FROM "exercises" WHERE "level" = ? ORDER BY "id""#,
    )
    .bind(level.as_str())
    .fetch_all(proxy.pool())
    .await?;

    rows.iter().map(map_exercise_row).collect()
}

pub async fn get_exercise_by_id(
    proxy: &DatabaseProxy,
    exercise_id: i64,
) -> Result<Option<Exercise>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "id", "level", "type", "content", "createdAt"
           FROM "exercises" WHERE "id" = ?"#,
    )
    .bind(exercise_id)
    .fetch_optional(proxy.pool())
    .await?;

    row.as_ref().map(map_exercise_row).transpose()
}

pub async fn get_word_by_id(proxy: &DatabaseProxy, word_id: i64) -> Result<Option<Word>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "id", "kanji", "kana", "translation", "examples", "level", "audioUrl", "createdAt"
           FROM "words" WHERE "id" = ?"#,
    )
    .bind(word_id)
    .fetch_optional(proxy.pool())
    .await?;

    row.as_ref().map(map_word_row).transpose()
}

/// Every exercise of the given level and kinds with the user's submission count.
pub async fn exercise_candidates(
    proxy: &DatabaseProxy,
    user_id: i64,
    level: Level,
    kinds: &[ExerciseKind],
) -> Result<Vec<ExerciseCandidate>, sqlx::Error> {
    if kinds.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        r#"SELECT e."id", e."type", COALESCE(s."timesShown", 0) AS "timesShown"
           FROM "exercises" e
           LEFT JOIN (
               SELECT "exerciseId", COUNT(*) AS "timesShown"
               FROM "user_submissions"
               WHERE "userId" = "#,
    );
    qb.push_bind(user_id);
    qb.push(
        r#" GROUP BY "exerciseId"
           ) s ON s."exerciseId" = e."id"
           WHERE e."level" = "#,
    );
    qb.push_bind(level.as_str());
    qb.push(r#" AND e."type" IN ("#);
    {
        let mut sep = qb.separated(", ");
        for kind in kinds {
            sep.push_bind(kind.as_str());
        }
    }
    qb.push(")");

    let rows = qb.build().fetch_all(proxy.pool()).await?;
    rows.iter()
        .map(|row| {
            let kind: String = row.try_get("type")?;
            Ok(ExerciseCandidate {
                id: row.try_get("id")?,
                kind: decode_variant(&kind)?,
                times_shown: row.try_get("timesShown")?,
            })
        })
        .collect()
}

pub async fn count_unsolved_exercises(
    proxy: &DatabaseProxy,
    user_id: i64,
    level: Level,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM "exercises" e
           WHERE e."level" = ?
             AND NOT EXISTS (
                 SELECT 1 FROM "user_submissions" s
                 WHERE s."exerciseId" = e."id" AND s."userId" = ?
             )"#,
    )
    .bind(level.as_str())
    .bind(user_id)
    .fetch_one(proxy.pool())
    .await
}

/// Reviewed words of the level that are due at `now`, most overdue first.
pub async fn due_words(
    proxy: &DatabaseProxy,
    user_id: i64,
    level: Level,
    now: DateTime<Utc>,
) -> Result<Vec<DueWord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT w."id", r."nextReview"
           FROM "words" w
           JOIN "word_reviews" r ON r."wordId" = w."id" AND r."userId" = ?
           WHERE w."level" = ? AND r."nextReview" <= ?
           ORDER BY r."nextReview" ASC"#,
    )
    .bind(user_id)
    .bind(level.as_str())
    .bind(now)
    .fetch_all(proxy.pool())
    .await?;

    rows.iter()
        .map(|row| {
            Ok(DueWord {
                word_id: row.try_get("id")?,
                next_review: row.try_get("nextReview")?,
            })
        })
        .collect()
}

/// Words of the level the user has never reviewed.
pub async fn unseen_word_ids(
    proxy: &DatabaseProxy,
    user_id: i64,
    level: Level,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar(
        r#"SELECT w."id" FROM "words" w
           WHERE w."level" = ?
             AND NOT EXISTS (
                 SELECT 1 FROM "word_reviews" r
                 WHERE r."wordId" = w."id" AND r."userId" = ?
             )
           ORDER BY w."id""#,
    )
    .bind(level.as_str())
    .bind(user_id)
    .fetch_all(proxy.pool())
    .await
}

fn map_exercise_row(row: &SqliteRow) -> Result<Exercise, sqlx::Error> {
    let level: String = row.try_get("level")?;
    let kind: String = row.try_get("type")?;
    let payload: String = row.try_get("content")?;
    let kind: ExerciseKind = decode_variant(&kind)?;

    Ok(Exercise {
        id: row.try_get("id")?,
        level: decode_variant(&level)?,
        content: ExerciseContent::from_stored(kind, &payload).map_err(decode_err)?,
        created_at: row.try_get("createdAt")?,
    })
}

fn map_word_row(row: &SqliteRow) -> Result<Word, sqlx::Error> {
    let level: String = row.try_get("level")?;
    let examples: String = row.try_get("examples")?;
    let examples: Vec<WordExample> = serde_json::from_str(&examples).map_err(decode_err)?;

    Ok(Word {
        id: row.try_get("id")?,
        kanji: row.try_get("kanji")?,
        kana: row.try_get("kana")?,
        translation: row.try_get("translation")?,
        examples,
        level: decode_variant(&level)?,
        audio_url: row.try_get("audioUrl")?,
        created_at: row.try_get("createdAt")?,
    })
}
