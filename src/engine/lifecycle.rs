//! Question lifecycle state machine.
//!
//! Pure logic with no storage or HTTP concerns: the stores run these
//! functions inside their own serialization unit (per-question lock or row
//! lock) so the append, the stopping consultation, and the allocation are
//! one atomic step.

use chrono::Utc;

use crate::engine::allocation::{self, Allocation, RewardDelta};
use crate::engine::stopping::StoppingRule;
use crate::engine::EngineError;
use crate::models::{Estimate, Question, QuestionParams, QuestionStatus};

/// Validate creation parameters: R positive, k at least 1, alpha in (0, 1].
pub fn validate_params(params: &QuestionParams) -> Result<(), EngineError> {
    if !params.r.is_finite() || params.r <= 0.0 {
        return Err(EngineError::Validation(
            "R must be a positive number".to_string(),
        ));
    }
    if params.k == 0 {
        return Err(EngineError::Validation(
            "k must be a positive integer".to_string(),
        ));
    }
    if !params.alpha.is_finite() || params.alpha <= 0.0 || params.alpha > 1.0 {
        return Err(EngineError::Validation(
            "alpha must lie in (0, 1]".to_string(),
        ));
    }
    Ok(())
}

/// Run one lifecycle step against a question held under exclusive access:
/// validate, append, consult the stopping rule, and on stop compute the
/// allocation and flip the question to Resolved.
///
/// Returns `Some(allocation)` when this submission resolved the question;
/// the caller applies the deltas to participant totals in the same atomic
/// unit that persists the question. A rejected submission leaves the
/// question untouched.
pub fn record_estimate(
    question: &mut Question,
    participant_id: &str,
    value: f64,
    stopping: &StoppingRule,
) -> Result<Option<Allocation>, EngineError> {
    if question.is_resolved() {
        return Err(EngineError::Validation(format!(
            "question {} is already resolved",
            question.id
        )));
    }
    if !value.is_finite() || value <= 0.0 || value >= 1.0 {
        return Err(EngineError::Validation(
            "estimate must lie strictly between 0 and 1".to_string(),
        ));
    }
    if question.has_estimate_from(participant_id) {
        return Err(EngineError::Validation(format!(
            "participant {participant_id} already submitted an estimate on question {}",
            question.id
        )));
    }

    question.estimates.push(Estimate {
        participant_id: participant_id.to_string(),
        value,
        submitted_at: Utc::now(),
    });

    if stopping.should_stop(question.params.alpha, question.estimates.len()) {
        let allocation = allocation::allocate(&question.estimates, &question.params)?;
        question.status = QuestionStatus::Resolved;
        return Ok(Some(allocation));
    }

    Ok(None)
}

/// Per-participant breakdown of a resolved question.
#[derive(Debug, Clone)]
pub struct ResultsBreakdown {
    pub final_estimate: f64,
    pub deltas: Vec<RewardDelta>,
}

/// Re-derive the reward breakdown for a resolved question.
///
/// Allocation is a deterministic function of the (immutable) resolved
/// sequence and the question parameters, so results never need to be
/// persisted separately and repeated reads are identical.
pub fn build_results(question: &Question) -> Result<ResultsBreakdown, EngineError> {
    if !question.is_resolved() {
        return Err(EngineError::Conflict(format!(
            "question {} is not resolved yet",
            question.id
        )));
    }
    let last = question.estimates.last().ok_or_else(|| {
        EngineError::InvariantViolation(format!(
            "resolved question {} has an empty estimate sequence",
            question.id
        ))
    })?;

    let allocation = allocation::allocate(&question.estimates, &question.params)?;
    Ok(ResultsBreakdown {
        final_estimate: last.value,
        deltas: allocation.deltas,
    })
}
