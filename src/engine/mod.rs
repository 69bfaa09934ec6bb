// Engine layer - the resolution-and-scoring core, plus the facade the HTTP
// layer holds in its axum state. Pure logic lives in the submodules; the
// facade owns the store and the stopping rule and performs the external
// percentage-to-probability conversion.

pub mod allocation;
pub mod lifecycle;
pub mod scoring;
pub mod stopping;

use std::sync::Arc;

use tracing::info;

use crate::models::{
    ParticipantResult, ParticipantTotal, Question, QuestionId, QuestionParams, ResultsResponse,
};
use crate::store::{QuestionStore, StoreError, SubmitOutcome};

pub use allocation::{allocate, Allocation, RewardDelta};
pub use lifecycle::{build_results, record_estimate, validate_params, ResultsBreakdown};
pub use scoring::{score, DEFAULT_PRIOR, EPSILON};
pub use stopping::StoppingRule;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::Store(StoreError::Query(e))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Facade over the store and the stopping rule, exposing the operations of
/// the external interface. Cheap to clone; handlers keep one in axum state.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn QuestionStore>,
    stopping: Arc<StoppingRule>,
}

impl Engine {
    pub fn new(store: Arc<dyn QuestionStore>, stopping: Arc<StoppingRule>) -> Self {
        Self { store, stopping }
    }

    /// Create a question after validating its parameter triple.
    /// Authorization (admin-only) is the caller's responsibility.
    pub async fn create_question(
        &self,
        text: &str,
        params: QuestionParams,
    ) -> EngineResult<QuestionId> {
        if text.trim().is_empty() {
            return Err(EngineError::Validation(
                "question text must not be empty".to_string(),
            ));
        }
        lifecycle::validate_params(&params)?;
        let id = self.store.create_question(text, params).await?;
        info!(question_id = %id, r = params.r, k = params.k, alpha = params.alpha, "created question");
        Ok(id)
    }

    /// Submit an estimate in the external integer-percentage form (1..=99).
    /// Conversion to the internal (0, 1) probability happens here; the
    /// whole append/stop/allocate/apply unit runs serialized inside the
    /// store.
    pub async fn submit_estimate(
        &self,
        question_id: QuestionId,
        participant_id: &str,
        percent: i64,
    ) -> EngineResult<SubmitOutcome> {
        if participant_id.trim().is_empty() {
            return Err(EngineError::Validation(
                "participant id must not be empty".to_string(),
            ));
        }
        if !(1..=99).contains(&percent) {
            return Err(EngineError::Validation(
                "estimate must be an integer between 1 and 99".to_string(),
            ));
        }
        let value = percent as f64 / 100.0;

        let outcome = self
            .store
            .submit_estimate(question_id, participant_id, value, &self.stopping)
            .await?;
        if outcome.resolved {
            info!(question_id = %question_id, participant_id, "question resolved");
        }
        Ok(outcome)
    }

    pub async fn get_question(&self, question_id: QuestionId) -> EngineResult<Question> {
        self.store.get_question(question_id).await
    }

    pub async fn list_open_questions(&self) -> EngineResult<Vec<Question>> {
        self.store.list_open_questions().await
    }

    /// Reward breakdown for a resolved question; `Conflict` while Open.
    pub async fn get_results(&self, question_id: QuestionId) -> EngineResult<ResultsResponse> {
        let question = self.store.get_question(question_id).await?;
        let breakdown = lifecycle::build_results(&question)?;
        Ok(ResultsResponse {
            question_id,
            final_estimate: breakdown.final_estimate,
            per_participant: breakdown
                .deltas
                .into_iter()
                .map(|d| ParticipantResult {
                    participant_id: d.participant_id,
                    estimate: d.estimate,
                    reward: d.reward,
                    tier: d.tier,
                })
                .collect(),
        })
    }

    pub async fn participant_total(&self, participant_id: &str) -> EngineResult<f64> {
        self.store.participant_total(participant_id).await
    }

    pub async fn leaderboard(&self, limit: i64) -> EngineResult<Vec<ParticipantTotal>> {
        self.store.leaderboard(limit).await
    }
}
