//! Two-tier reward allocation at resolution.
//!
//! The last `effective_k` estimates form the bonus tier and each receives
//! the flat reward R. Every earlier estimate is market-scored against its
//! immediate predecessor (the first against the uninformative 0.5 prior).

use crate::engine::scoring;
use crate::engine::EngineError;
use crate::models::{Estimate, ParticipantId, QuestionParams, Tier};

/// One participant's reward from one resolution event.
#[derive(Debug, Clone)]
pub struct RewardDelta {
    pub participant_id: ParticipantId,
    pub estimate: f64,
    pub reward: f64,
    pub tier: Tier,
}

/// Full allocation for one resolution. Each participant in the sequence
/// appears exactly once (one estimate per participant is a lifecycle
/// invariant), from exactly one tier.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub deltas: Vec<RewardDelta>,
}

impl Allocation {
    /// Sum of every delta - used by conservation checks: must equal
    /// `effective_k * R` plus the sum of scored-tier scores.
    pub fn total_reward(&self) -> f64 {
        self.deltas.iter().map(|d| d.reward).sum()
    }
}

/// Reference value for the estimate at `index`: the predecessor's value,
/// or the uninformative prior for the first estimate.
fn reference_for(estimates: &[Estimate], index: usize) -> f64 {
    if index == 0 {
        scoring::DEFAULT_PRIOR
    } else {
        estimates[index - 1].value
    }
}

/// Partition a finalized estimate sequence into bonus and scored tiers and
/// compute each participant's reward delta.
///
/// Tier membership is positional: the last `min(k, n)` estimates are the
/// bonus tier, everything before them is market-scored. An empty sequence
/// can only mean the lifecycle resolved without an estimate, which is a
/// bug upstream, not a condition to paper over.
pub fn allocate(
    estimates: &[Estimate],
    params: &QuestionParams,
) -> Result<Allocation, EngineError> {
    if estimates.is_empty() {
        return Err(EngineError::InvariantViolation(
            "reward allocation invoked on an empty estimate sequence".to_string(),
        ));
    }

    let n = estimates.len();
    let effective_k = (params.k as usize).min(n);
    let bonus_start = n - effective_k;

    let mut deltas = Vec::with_capacity(n);
    for (i, estimate) in estimates.iter().enumerate() {
        let (reward, tier) = if i >= bonus_start {
            (params.r, Tier::Bonus)
        } else {
            let reference = reference_for(estimates, i);
            (
                scoring::score(estimate.value, reference, scoring::DEFAULT_PRIOR),
                Tier::Scored,
            )
        };
        deltas.push(RewardDelta {
            participant_id: estimate.participant_id.clone(),
            estimate: estimate.value,
            reward,
            tier,
        });
    }

    Ok(Allocation { deltas })
}
