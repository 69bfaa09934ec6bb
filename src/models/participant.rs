use serde::{Deserialize, Serialize};

/// Opaque identity handed to us by the identity collaborator. The engine
/// never authenticates it; it only requires stability and uniqueness.
pub type ParticipantId = String;

/// A participant's accumulated reward total. Totals start at zero and only
/// ever increase through reward application at resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantTotal {
    pub participant_id: ParticipantId,
    pub total: f64,
}
