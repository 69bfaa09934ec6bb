use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::participant::ParticipantId;

pub type QuestionId = Uuid;

/// Hard cap on the length of a question's estimate sequence. Guarantees
/// termination even when alpha is close to zero.
pub const MAX_ESTIMATES: usize = 100;

/// Mechanism parameters fixed at question creation.
///
/// `r` is the flat bonus paid to each of the last `k` participants, and
/// `alpha` is the per-estimate probability that the question resolves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionParams {
    pub r: f64,
    pub k: u32,
    pub alpha: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Open,
    Resolved,
}

/// A single submitted belief value. The value is a probability in the open
/// interval (0, 1); the 1-99 percentage form seen on the wire is converted
/// before it reaches here. Position in the question's sequence is the
/// submission order; the timestamp is informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    pub participant_id: ParticipantId,
    pub value: f64,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub params: QuestionParams,
    pub estimates: Vec<Estimate>,
    pub status: QuestionStatus,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn new(text: String, params: QuestionParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            params,
            estimates: Vec::new(),
            status: QuestionStatus::Open,
            created_at: Utc::now(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == QuestionStatus::Resolved
    }

    /// Whether this participant already has an estimate on this question.
    pub fn has_estimate_from(&self, participant_id: &str) -> bool {
        self.estimates
            .iter()
            .any(|e| e.participant_id == participant_id)
    }
}

/// Reward tier a participant lands in at resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Bonus,
    Scored,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bonus => "bonus",
            Tier::Scored => "scored",
        }
    }
}
