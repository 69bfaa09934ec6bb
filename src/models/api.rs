use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::participant::ParticipantId;
use crate::models::question::{Question, QuestionId, QuestionParams, Tier};

/// Request body for question creation. Authorization happens upstream of
/// the engine; by the time this arrives the caller is trusted to be an admin.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuestionRequest {
    pub text: String,
    pub r: f64,
    pub k: u32,
    pub alpha: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQuestionResponse {
    pub question_id: QuestionId,
}

/// Request body for an estimate submission. The value is the external
/// integer-percentage form, 1 through 99 inclusive.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitEstimateRequest {
    pub participant_id: ParticipantId,
    pub value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitEstimateResponse {
    pub resolved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateView {
    pub participant_id: ParticipantId,
    pub value: f64,
    pub submitted_at: DateTime<Utc>,
}

/// Read-only projection of a question, resolved or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub question_id: QuestionId,
    pub text: String,
    pub parameters: QuestionParams,
    pub estimates: Vec<EstimateView>,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Question> for QuestionView {
    fn from(q: Question) -> Self {
        Self {
            question_id: q.id,
            text: q.text,
            parameters: q.params,
            estimates: q
                .estimates
                .into_iter()
                .map(|e| EstimateView {
                    participant_id: e.participant_id,
                    value: e.value,
                    submitted_at: e.submitted_at,
                })
                .collect(),
            resolved: matches!(q.status, crate::models::QuestionStatus::Resolved),
            created_at: q.created_at,
        }
    }
}

/// One participant's line in a resolved question's results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantResult {
    pub participant_id: ParticipantId,
    pub estimate: f64,
    pub reward: f64,
    pub tier: Tier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub question_id: QuestionId,
    pub final_estimate: f64,
    pub per_participant: Vec<ParticipantResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalResponse {
    pub participant_id: ParticipantId,
    pub total: f64,
}
