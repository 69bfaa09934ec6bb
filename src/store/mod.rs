// Persistence collaborator. The trait is the contract the engine relies on:
// a per-question serialized read-modify-write unit for submissions and an
// all-or-nothing reward application at resolution. Two backends: in-memory
// (tests, db-less runs) and Postgres.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::{EngineError, StoppingRule};
use crate::models::{ParticipantTotal, Question, QuestionId, QuestionParams};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query execution error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What a successful submission observed: either the estimate was recorded
/// and the question stayed Open, or this submission resolved it.
#[derive(Debug, Clone, Copy)]
pub struct SubmitOutcome {
    pub resolved: bool,
}

#[async_trait]
pub trait QuestionStore: Send + Sync {
    async fn create_question(
        &self,
        text: &str,
        params: QuestionParams,
    ) -> Result<QuestionId, EngineError>;

    /// Execute the whole append/stop-check/allocate/apply unit for one
    /// submission under per-question mutual exclusion. Submissions to
    /// different questions must not contend. The duplicate-participant
    /// check and the append happen inside the same serialized unit, and
    /// reward deltas from a resolution are applied to participant totals
    /// all-or-nothing.
    async fn submit_estimate(
        &self,
        question_id: QuestionId,
        participant_id: &str,
        value: f64,
        stopping: &StoppingRule,
    ) -> Result<SubmitOutcome, EngineError>;

    async fn get_question(&self, question_id: QuestionId) -> Result<Question, EngineError>;

    async fn list_open_questions(&self) -> Result<Vec<Question>, EngineError>;

    /// Accumulated reward total; `NotFound` for a participant that has
    /// never had a submission accepted.
    async fn participant_total(&self, participant_id: &str) -> Result<f64, EngineError>;

    async fn leaderboard(&self, limit: i64) -> Result<Vec<ParticipantTotal>, EngineError>;
}
