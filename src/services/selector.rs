use crate::db::operations::content::{self, ExerciseCandidate};
use crate::db::DatabaseProxy;
use crate::services::models::{Exercise, ExerciseKind, Level};
use crate::services::scheduler::pick_uniform;
use crate::services::{EngineError, EngineResult, CONTENT_EXHAUSTED};

/// An exercise stays on offer until the user has submitted to it as many
/// times as its kind allows (grammar twice, everything else once).
pub fn is_eligible(candidate: &ExerciseCandidate) -> bool {
    candidate.times_shown < candidate.kind.max_exposures()
}

pub fn eligible_ids(candidates: &[ExerciseCandidate]) -> Vec<i64> {
    candidates
        .iter()
        .filter(|c| is_eligible(c))
        .map(|c| c.id)
        .collect()
}

/// Picks uniformly among the exercises of `level` and `kinds` the user may
/// still see. `NotFound` means the content is exhausted for this user.
pub async fn next_exercise(
    proxy: &DatabaseProxy,
    user_id: i64,
    level: Level,
    kinds: &[ExerciseKind],
) -> EngineResult<Exercise> {
    let mut kinds = kinds.to_vec();
    kinds.sort_by_key(|k| k.as_str());
    kinds.dedup();

    let candidates = content::exercise_candidates(proxy, user_id, level, &kinds).await?;
    let eligible = eligible_ids(&candidates);

    tracing::debug!(
        user_id,
        level = %level,
        candidates = candidates.len(),
        eligible = eligible.len(),
        "exercise selection"
    );

    let Some(exercise_id) = pick_uniform(&eligible) else {
        tracing::info!(user_id, level = %level, "exercises exhausted");
        return Err(EngineError::not_found(CONTENT_EXHAUSTED));
    };

    content::get_exercise_by_id(proxy, exercise_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("exercise {exercise_id}")))
}
