pub mod api;
pub mod engine;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use engine::{
    allocate, build_results, record_estimate, score, validate_params, Allocation, Engine,
    EngineError, RewardDelta, StoppingRule, DEFAULT_PRIOR, EPSILON,
};

pub use models::{
    Estimate, ParticipantId, ParticipantTotal, Question, QuestionId, QuestionParams,
    QuestionStatus, Tier, MAX_ESTIMATES,
};

pub use store::{memory::MemoryStore, postgres::PgStore, QuestionStore, StoreError, SubmitOutcome};
