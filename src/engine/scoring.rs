//! Cross-entropy market scoring.
//!
//! The mechanism is self-resolving: no ground-truth outcome is ever
//! observed, so the scored tier is paid by how much each estimate improved
//! the implied probability over its predecessor, weighted by a fixed prior
//! belief.

/// Smoothing constant keeping `ln` away from zero when an estimate sits at
/// the boundary of the probability range. Must be applied identically to
/// every term.
pub const EPSILON: f64 = 1e-4;

/// Prior belief used both as the scoring weight and as the reference for
/// the first estimate in a sequence.
pub const DEFAULT_PRIOR: f64 = 0.5;

/// Compute the CE-MSR value for `estimate` against `reference` under
/// `prior`.
///
/// Positive means the estimate improved on the reference, negative means it
/// worsened it; the result is not clamped. Inputs are trusted to lie in the
/// open interval (0, 1) - the submission path validates the 1-99 percentage
/// range and converts before calling.
pub fn score(estimate: f64, reference: f64, prior: f64) -> f64 {
    prior * ((estimate + EPSILON) / (reference + EPSILON)).ln()
        + (1.0 - prior) * (((1.0 - estimate) + EPSILON) / ((1.0 - reference) + EPSILON)).ln()
}
