//! Spaced-repetition scheduling for vocabulary review.
//!
//! A word's review state is its streak of consecutive correct answers
//! (`repetition`). A correct answer extends the streak and waits for the
//! interval indexed by the streak it had *before* the answer; a wrong answer
//! zeroes the streak and schedules a fast retry.

use chrono::{DateTime, Duration, Utc};
use rand::seq::IndexedRandom;
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::db::operations::content::{self, DueWord};
use crate::db::operations::word_review::{self, WordReview};
use crate::db::DatabaseProxy;
use crate::services::models::{Level, Word};
use crate::services::{EngineError, EngineResult, CONTENT_EXHAUSTED};

pub const DEFAULT_INTERVAL_HOURS: [i64; 7] = [4, 8, 24, 48, 168, 336, 720];
pub const FAILED_REVIEW_RETRY_HOURS: i64 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalPolicy {
    intervals_hours: Vec<i64>,
    retry_hours: i64,
}

impl IntervalPolicy {
    pub fn new(intervals_hours: Vec<i64>) -> EngineResult<Self> {
        if intervals_hours.is_empty() {
            return Err(EngineError::validation("interval table must not be empty"));
        }
        if intervals_hours.iter().any(|h| *h <= 0) {
            return Err(EngineError::validation("intervals must be positive"));
        }
        Ok(Self {
            intervals_hours,
            retry_hours: FAILED_REVIEW_RETRY_HOURS,
        })
    }

    pub fn with_retry_hours(mut self, hours: i64) -> EngineResult<Self> {
        if hours <= 0 {
            return Err(EngineError::validation("retry interval must be positive"));
        }
        self.retry_hours = hours;
        Ok(self)
    }

    pub fn intervals_hours(&self) -> &[i64] {
        &self.intervals_hours
    }

    /// Wait after a correct answer given the streak before that answer.
    /// Streaks past the end of the table stay on the last entry.
    pub fn interval_after_success(&self, prior_repetition: i64) -> Duration {
        let last = self.intervals_hours.len() - 1;
        let index = usize::try_from(prior_repetition.max(0)).unwrap_or(last).min(last);
        Duration::hours(self.intervals_hours[index])
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::hours(self.retry_hours)
    }

    pub fn schedule(&self, prior_repetition: i64, is_correct: bool, now: DateTime<Utc>) -> ReviewOutcome {
        if !is_correct {
            return ReviewOutcome {
                repetition: 0,
                next_review_at: now + self.retry_interval(),
            };
        }
        ReviewOutcome {
            repetition: prior_repetition.max(0) + 1,
            next_review_at: now + self.interval_after_success(prior_repetition),
        }
    }
}

impl Default for IntervalPolicy {
    fn default() -> Self {
        Self {
            intervals_hours: DEFAULT_INTERVAL_HOURS.to_vec(),
            retry_hours: FAILED_REVIEW_RETRY_HOURS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub repetition: i64,
    pub next_review_at: DateTime<Utc>,
}

pub async fn record_review(
    proxy: &DatabaseProxy,
    policy: &IntervalPolicy,
    word_id: i64,
    user_id: i64,
    is_correct: bool,
) -> EngineResult<ReviewOutcome> {
    record_review_at(proxy, policy, word_id, user_id, is_correct, Utc::now()).await
}

pub async fn record_review_at(
    proxy: &DatabaseProxy,
    policy: &IntervalPolicy,
    word_id: i64,
    user_id: i64,
    is_correct: bool,
    now: DateTime<Utc>,
) -> EngineResult<ReviewOutcome> {
    if content::get_word_by_id(proxy, word_id).await?.is_none() {
        return Err(EngineError::not_found(format!("word {word_id}")));
    }

    let mut tx = proxy.pool().begin().await?;
    let outcome = apply_review(&mut *tx, policy, word_id, user_id, is_correct, now).await?;
    tx.commit().await?;
    Ok(outcome)
}

/// Read-modify-write of one review row inside the caller's transaction.
pub(crate) async fn apply_review(
    conn: &mut SqliteConnection,
    policy: &IntervalPolicy,
    word_id: i64,
    user_id: i64,
    is_correct: bool,
    now: DateTime<Utc>,
) -> Result<ReviewOutcome, sqlx::Error> {
    let prior = word_review::lock_prior_repetition(&mut *conn, word_id, user_id, now).await?;
    let outcome = policy.schedule(prior, is_correct, now);

    word_review::store_review(
        &mut *conn,
        &WordReview {
            word_id,
            user_id,
            repetition: outcome.repetition,
            next_review: outcome.next_review_at,
            last_reviewed: now,
        },
    )
    .await?;

    tracing::debug!(
        word_id,
        user_id,
        prior,
        repetition = outcome.repetition,
        next_review = %outcome.next_review_at,
        "review recorded"
    );

    Ok(outcome)
}

pub async fn next_word(proxy: &DatabaseProxy, user_id: i64, level: Level) -> EngineResult<Word> {
    next_word_at(proxy, user_id, level, Utc::now()).await
}

/// Most overdue reviewed word first; otherwise a random never-reviewed word.
/// Words scheduled in the future are never offered.
pub async fn next_word_at(
    proxy: &DatabaseProxy,
    user_id: i64,
    level: Level,
    now: DateTime<Utc>,
) -> EngineResult<Word> {
    let due = content::due_words(proxy, user_id, level, now).await?;
    let chosen = match pick_most_overdue(&due) {
        Some(word_id) => Some(word_id),
        None => {
            let unseen = content::unseen_word_ids(proxy, user_id, level).await?;
            pick_uniform(&unseen)
        }
    };

    let Some(word_id) = chosen else {
        tracing::info!(user_id, level = %level, "words exhausted");
        return Err(EngineError::not_found(CONTENT_EXHAUSTED));
    };

    content::get_word_by_id(proxy, word_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("word {word_id}")))
}

/// `due` must be sorted by `next_review` ascending. Ties on the earliest
/// timestamp are broken uniformly at random.
pub fn pick_most_overdue(due: &[DueWord]) -> Option<i64> {
    let earliest = due.first()?.next_review;
    let tied: Vec<i64> = due
        .iter()
        .take_while(|d| d.next_review == earliest)
        .map(|d| d.word_id)
        .collect();
    pick_uniform(&tied)
}

pub(crate) fn pick_uniform(ids: &[i64]) -> Option<i64> {
    ids.choose(&mut rand::rng()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn first_reviews_schedule_four_hours() {
        let policy = IntervalPolicy::default();
        let now = at(9);

        let ok = policy.schedule(0, true, now);
        assert_eq!(ok.repetition, 1);
        assert_eq!(ok.next_review_at, now + Duration::hours(4));

        let fail = policy.schedule(0, false, now);
        assert_eq!(fail.repetition, 0);
        assert_eq!(fail.next_review_at, now + Duration::hours(4));
    }

    #[test]
    fn streak_walks_the_table_and_caps() {
        let policy = IntervalPolicy::default();
        let now = at(0);
        let mut repetition = 0;
        let mut seen = Vec::new();
        for _ in 0..10 {
            let outcome = policy.schedule(repetition, true, now);
            seen.push((outcome.next_review_at - now).num_hours());
            repetition = outcome.repetition;
        }
        assert_eq!(seen, vec![4, 8, 24, 48, 168, 336, 720, 720, 720, 720]);
        assert_eq!(repetition, 10);
    }

    #[test]
    fn failure_resets_any_streak() {
        let policy = IntervalPolicy::default();
        for prior in [0, 1, 5, 6, 40] {
            let outcome = policy.schedule(prior, false, at(12));
            assert_eq!(outcome.repetition, 0);
            assert_eq!(outcome.next_review_at, at(16));
        }
    }

    #[test]
    fn substituted_table_is_used() {
        let policy = IntervalPolicy::new(vec![1, 2]).unwrap().with_retry_hours(1).unwrap();
        assert_eq!(policy.interval_after_success(0), Duration::hours(1));
        assert_eq!(policy.interval_after_success(1), Duration::hours(2));
        assert_eq!(policy.interval_after_success(9), Duration::hours(2));
        assert_eq!(policy.retry_interval(), Duration::hours(1));
        assert!(IntervalPolicy::new(vec![]).is_err());
        assert!(IntervalPolicy::new(vec![3, 0]).is_err());
    }

    #[test]
    fn most_overdue_breaks_ties_only_on_earliest() {
        let due = vec![
            DueWord { word_id: 1, next_review: at(1) },
            DueWord { word_id: 2, next_review: at(1) },
            DueWord { word_id: 3, next_review: at(2) },
        ];
        let mut picked = std::collections::HashSet::new();
        for _ in 0..50 {
            picked.insert(pick_most_overdue(&due).unwrap());
        }
        assert_eq!(picked, std::collections::HashSet::from([1, 2]));
        assert_eq!(pick_most_overdue(&[]), None);
    }

    #[test]
    fn uniform_pick_reaches_more_than_the_first_id() {
        let ids = [10, 20, 30];
        let mut picked = std::collections::HashSet::new();
        for _ in 0..60 {
            let id = pick_uniform(&ids).unwrap();
            assert!(ids.contains(&id));
            picked.insert(id);
        }
        assert!(picked.len() >= 2, "always picked {picked:?}");
        assert_eq!(pick_uniform(&[]), None);
    }
}
