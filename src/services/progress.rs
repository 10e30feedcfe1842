//! Per-user session state machine.
//!
//! A user is either idle or owes an answer for exactly one item. Claiming
//! an item and clearing it after a correct answer are both conditional
//! updates, so concurrent requests for the same user cannot hand out two
//! items or award one answer twice.

use chrono::{FixedOffset, Utc};
use serde::Serialize;

use crate::db::operations::{content, submission, user as user_ops};
use crate::db::DatabaseProxy;
use crate::services::grading::{GradeReport, Grader, GradingItem};
use crate::services::leaderboard::{self, POINTS_PER_CORRECT_ANSWER};
use crate::services::models::{Exercise, ExerciseKind, Level, SessionState, User, UserProfile, Word};
use crate::services::scheduler::{self, IntervalPolicy, ReviewOutcome};
use crate::services::selector;
use crate::services::{EngineError, EngineResult};

/// Added to `User.points` for each correctly answered word.
pub const VOCAB_POINTS: f64 = 0.5;
pub const MAX_LIST_LIMIT: i64 = 100;

const OUTSTANDING_ITEM: &str = "already have an outstanding item";
const NO_LONGER_OUTSTANDING: &str = "item is no longer outstanding";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub is_correct: bool,
    pub score: u8,
    pub comment: String,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewOutcome>,
    pub session: SessionState,
}

impl SubmitOutcome {
    fn new(report: GradeReport, review: Option<ReviewOutcome>, session: SessionState) -> Self {
        Self {
            is_correct: report.is_correct(),
            score: report.score,
            comment: report.comment,
            suggestion: report.suggestion,
            review,
            session,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedWord {
    pub word: Word,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example_translation: Option<String>,
    pub review: ReviewOutcome,
}

/// Registers the user on first contact (level N5, exercise mode) and keeps
/// their public profile fresh on every later one.
pub async fn ensure_user(proxy: &DatabaseProxy, external_id: i64, profile: &UserProfile) -> EngineResult<User> {
    if user_ops::insert_user(proxy, external_id, profile, Level::default()).await? {
        tracing::info!(external_id, "user registered");
    } else {
        user_ops::update_profile(proxy, external_id, profile).await?;
    }
    get_user(proxy, external_id).await
}

pub async fn get_user(proxy: &DatabaseProxy, external_id: i64) -> EngineResult<User> {
    user_ops::get_user(proxy, external_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("user {external_id}")))
}

pub async fn count_users(proxy: &DatabaseProxy) -> EngineResult<i64> {
    Ok(user_ops::count_users(proxy).await?)
}

pub async fn list_users(proxy: &DatabaseProxy, limit: i64, offset: i64) -> EngineResult<Vec<User>> {
    if limit <= 0 {
        return Err(EngineError::validation("limit must be positive"));
    }
    if offset < 0 {
        return Err(EngineError::validation("offset must not be negative"));
    }
    Ok(user_ops::list_users(proxy, limit.min(MAX_LIST_LIMIT), offset).await?)
}

pub async fn request_exercise(
    proxy: &DatabaseProxy,
    external_id: i64,
    kinds: &[ExerciseKind],
) -> EngineResult<Exercise> {
    let user = get_user(proxy, external_id).await?;
    if user.session.is_awaiting() {
        return Err(EngineError::invalid_state(OUTSTANDING_ITEM));
    }
    let kinds: &[ExerciseKind] = if kinds.is_empty() { &ExerciseKind::ALL } else { kinds };

    let exercise = selector::next_exercise(proxy, user.id, user.level, kinds).await?;
    if !user_ops::claim_exercise(proxy, user.id, exercise.id).await? {
        tracing::info!(external_id, exercise_id = exercise.id, "exercise claim lost to concurrent request");
        return Err(EngineError::invalid_state(OUTSTANDING_ITEM));
    }

    tracing::info!(external_id, exercise_id = exercise.id, kind = %exercise.kind(), "exercise sent");
    Ok(exercise)
}

pub async fn request_vocab(proxy: &DatabaseProxy, external_id: i64) -> EngineResult<Word> {
    let user = get_user(proxy, external_id).await?;
    if user.session.is_awaiting() {
        return Err(EngineError::invalid_state(OUTSTANDING_ITEM));
    }

    let word = scheduler::next_word(proxy, user.id, user.level).await?;
    if !user_ops::claim_word(proxy, user.id, word.id).await? {
        tracing::info!(external_id, word_id = word.id, "word claim lost to concurrent request");
        return Err(EngineError::invalid_state(OUTSTANDING_ITEM));
    }

    tracing::info!(external_id, word_id = word.id, "word sent");
    Ok(word)
}

/// Grades `text` against the outstanding item and persists the result.
///
/// Nothing is written when grading fails. Everything written after a
/// successful grade commits together or not at all.
pub async fn submit_answer(
    proxy: &DatabaseProxy,
    grader: &dyn Grader,
    policy: &IntervalPolicy,
    zone: FixedOffset,
    external_id: i64,
    text: &str,
) -> EngineResult<SubmitOutcome> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EngineError::validation("answer must not be empty"));
    }

    let user = get_user(proxy, external_id).await?;
    match user.session {
        SessionState::AwaitingExercise { exercise_id } => {
            submit_exercise_answer(proxy, grader, zone, &user, exercise_id, text).await
        }
        SessionState::AwaitingWord { word_id } => {
            submit_word_answer(proxy, grader, policy, zone, &user, word_id, text).await
        }
        SessionState::Idle { .. } => Err(EngineError::invalid_state("no outstanding item")),
    }
}

async fn submit_exercise_answer(
    proxy: &DatabaseProxy,
    grader: &dyn Grader,
    zone: FixedOffset,
    user: &User,
    exercise_id: i64,
    text: &str,
) -> EngineResult<SubmitOutcome> {
    let exercise = content::get_exercise_by_id(proxy, exercise_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("exercise {exercise_id}")))?;

    let report = grade(grader, &GradingItem::Exercise(exercise), text, user.external_id).await?;
    let is_correct = report.is_correct();

    let mut tx = proxy.pool().begin().await?;
    if !user_ops::hold_outstanding(&mut *tx, user.id, user.session).await? {
        return Err(EngineError::invalid_state(NO_LONGER_OUTSTANDING));
    }
    submission::insert_submission(&mut *tx, user.id, exercise_id, text, &report.feedback(), is_correct).await?;
    if is_correct {
        if !user_ops::release_exercise(&mut *tx, user.id, exercise_id).await? {
            return Err(EngineError::invalid_state(NO_LONGER_OUTSTANDING));
        }
        leaderboard::award_points_in(&mut *tx, zone, user.id, POINTS_PER_CORRECT_ANSWER, Utc::now()).await?;
    }
    tx.commit().await?;

    tracing::info!(
        external_id = user.external_id,
        exercise_id,
        score = report.score,
        is_correct,
        "exercise answer graded"
    );

    let session = if is_correct {
        SessionState::Idle { mode: user.session.mode() }
    } else {
        user.session
    };
    Ok(SubmitOutcome::new(report, None, session))
}

async fn submit_word_answer(
    proxy: &DatabaseProxy,
    grader: &dyn Grader,
    policy: &IntervalPolicy,
    zone: FixedOffset,
    user: &User,
    word_id: i64,
    text: &str,
) -> EngineResult<SubmitOutcome> {
    let word = content::get_word_by_id(proxy, word_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("word {word_id}")))?;

    let report = grade(grader, &GradingItem::Word(word), text, user.external_id).await?;
    let is_correct = report.is_correct();
    let now = Utc::now();

    let mut tx = proxy.pool().begin().await?;
    if !user_ops::hold_outstanding(&mut *tx, user.id, user.session).await? {
        return Err(EngineError::invalid_state(NO_LONGER_OUTSTANDING));
    }
    let review = scheduler::apply_review(&mut *tx, policy, word_id, user.id, is_correct, now).await?;
    if is_correct {
        if !user_ops::release_word_with_credit(&mut *tx, user.id, word_id, VOCAB_POINTS).await? {
            return Err(EngineError::invalid_state(NO_LONGER_OUTSTANDING));
        }
        leaderboard::award_points_in(&mut *tx, zone, user.id, POINTS_PER_CORRECT_ANSWER, now).await?;
    }
    tx.commit().await?;

    tracing::info!(
        external_id = user.external_id,
        word_id,
        score = report.score,
        is_correct,
        repetition = review.repetition,
        "word answer graded"
    );

    let session = if is_correct {
        SessionState::Idle { mode: user.session.mode() }
    } else {
        user.session
    };
    Ok(SubmitOutcome::new(report, Some(review), session))
}

async fn grade(grader: &dyn Grader, item: &GradingItem, text: &str, external_id: i64) -> EngineResult<GradeReport> {
    grader.score(item, text).await.map_err(|err| {
        tracing::warn!(external_id, error = %err, "grading failed");
        EngineError::Grading(err.to_string())
    })
}

/// Shows the answer for the outstanding word and counts it as a failed
/// review. The word stays outstanding until answered correctly.
pub async fn reveal_answer(proxy: &DatabaseProxy, policy: &IntervalPolicy, external_id: i64) -> EngineResult<RevealedWord> {
    let user = get_user(proxy, external_id).await?;
    let Some(word_id) = user.session.outstanding_word() else {
        return Err(EngineError::invalid_state("no outstanding word"));
    };

    let word = content::get_word_by_id(proxy, word_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("word {word_id}")))?;

    let mut tx = proxy.pool().begin().await?;
    let review = scheduler::apply_review(&mut *tx, policy, word_id, user.id, false, Utc::now()).await?;
    tx.commit().await?;

    tracing::info!(external_id, word_id, "answer revealed");

    let first_example = word.examples.first();
    Ok(RevealedWord {
        answer: word.display_form().to_string(),
        example: first_example.map(|e| e.annotated()),
        example_translation: first_example.map(|e| e.translation.clone()),
        word,
        review,
    })
}

pub async fn reset(proxy: &DatabaseProxy, external_id: i64) -> EngineResult<User> {
    let user = get_user(proxy, external_id).await?;
    user_ops::reset_session(proxy, user.id).await?;
    tracing::info!(external_id, "session reset");
    get_user(proxy, external_id).await
}

pub async fn change_level(proxy: &DatabaseProxy, external_id: i64, level: Level) -> EngineResult<User> {
    let user = get_user(proxy, external_id).await?;
    user_ops::set_level(proxy, user.id, level).await?;
    tracing::info!(external_id, from = %user.level, to = %level, "level changed");
    get_user(proxy, external_id).await
}

/// Exercises at the user's level they never submitted to.
pub async fn remaining_exercises(proxy: &DatabaseProxy, external_id: i64) -> EngineResult<i64> {
    let user = get_user(proxy, external_id).await?;
    Ok(content::count_unsolved_exercises(proxy, user.id, user.level).await?)
}
