use std::sync::Arc;

use crowdcast_engine::{
    Engine, EngineError, MemoryStore, QuestionParams, StoppingRule, MAX_ESTIMATES,
};

fn engine_with(stopping: StoppingRule) -> Engine {
    Engine::new(Arc::new(MemoryStore::new()), Arc::new(stopping))
}

fn params(r: f64, k: u32, alpha: f64) -> QuestionParams {
    QuestionParams { r, k, alpha }
}

// Drive submissions from distinct participants until the question resolves,
// returning how many were accepted.
async fn submit_until_resolved(engine: &Engine, question_id: uuid::Uuid, limit: usize) -> usize {
    for i in 0..limit {
        let outcome = engine
            .submit_estimate(question_id, &format!("p{i}"), 40 + (i as i64 % 20))
            .await
            .expect("submission from a fresh participant on an open question");
        if outcome.resolved {
            return i + 1;
        }
    }
    panic!("question did not resolve within {limit} submissions");
}

#[tokio::test]
async fn resolution_terminates_within_the_capacity_cap() {
    // An alpha this small never fires stochastically; only the cap can end
    // the question, and it must.
    let engine = engine_with(StoppingRule::seeded(9));
    let id = engine
        .create_question("will it rain", params(10.0, 2, 1e-9))
        .await
        .unwrap();

    let accepted = submit_until_resolved(&engine, id, MAX_ESTIMATES).await;
    assert_eq!(accepted, MAX_ESTIMATES);

    let question = engine.get_question(id).await.unwrap();
    assert!(question.is_resolved());
    assert_eq!(question.estimates.len(), MAX_ESTIMATES);
}

#[tokio::test]
async fn moderate_alpha_also_terminates() {
    for seed in [1u64, 2, 3, 4, 5] {
        let engine = engine_with(StoppingRule::seeded(seed));
        let id = engine
            .create_question("q", params(10.0, 2, 0.2))
            .await
            .unwrap();
        let accepted = submit_until_resolved(&engine, id, MAX_ESTIMATES).await;
        assert!(accepted <= MAX_ESTIMATES);
    }
}

#[tokio::test]
async fn participants_are_pairwise_distinct_and_duplicates_are_rejected() {
    let engine = engine_with(StoppingRule::seeded(42));
    let id = engine
        .create_question("q", params(10.0, 2, 1e-9))
        .await
        .unwrap();

    engine.submit_estimate(id, "alice", 40).await.unwrap();
    engine.submit_estimate(id, "bob", 60).await.unwrap();

    let err = engine.submit_estimate(id, "alice", 70).await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let question = engine.get_question(id).await.unwrap();
    let mut ids: Vec<_> = question
        .estimates
        .iter()
        .map(|e| e.participant_id.clone())
        .collect();
    let before = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), before);
}

#[tokio::test]
async fn rewards_are_conserved_at_resolution() {
    // Capacity 8 with a never-firing alpha pins resolution to the eighth
    // submission.
    let engine = engine_with(StoppingRule::seeded_with_capacity(42, 8));
    let r = 5.0;
    let k = 3;
    let id = engine
        .create_question("q", params(r, k, 1e-9))
        .await
        .unwrap();

    let percents = [30, 35, 45, 55, 60, 40, 70, 65];
    for (i, pct) in percents.iter().enumerate() {
        engine
            .submit_estimate(id, &format!("p{i}"), *pct)
            .await
            .unwrap();
    }

    let question = engine.get_question(id).await.unwrap();
    assert!(question.is_resolved());

    // Recompute the scored-tier sum independently from the sequence.
    let values: Vec<f64> = question.estimates.iter().map(|e| e.value).collect();
    let scored_len = values.len() - k as usize;
    let mut scored_sum = 0.0;
    for i in 0..scored_len {
        let reference = if i == 0 { 0.5 } else { values[i - 1] };
        scored_sum += crowdcast_engine::score(values[i], reference, 0.5);
    }
    let expected = k as f64 * r + scored_sum;

    let results = engine.get_results(id).await.unwrap();
    let applied: f64 = results.per_participant.iter().map(|p| p.reward).sum();
    assert!((applied - expected).abs() < 1e-9);

    // And the applied totals agree with the reported rewards.
    for entry in &results.per_participant {
        let total = engine.participant_total(&entry.participant_id).await.unwrap();
        assert!((total - entry.reward).abs() < 1e-12);
    }
}

#[tokio::test]
async fn results_are_idempotent() {
    let engine = engine_with(StoppingRule::seeded_with_capacity(42, 4));
    let id = engine
        .create_question("q", params(10.0, 2, 1e-9))
        .await
        .unwrap();
    for (i, pct) in [40, 55, 60, 70].iter().enumerate() {
        engine
            .submit_estimate(id, &format!("p{i}"), *pct)
            .await
            .unwrap();
    }

    let first = engine.get_results(id).await.unwrap();
    let second = engine.get_results(id).await.unwrap();
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn scenario_single_submission_with_alpha_one_lands_in_the_bonus_tier() {
    // R=10, k=2, alpha=1.0: the first submission resolves immediately and
    // effective_k collapses to the sequence length, so the sole participant
    // is entirely in the bonus tier.
    let engine = engine_with(StoppingRule::seeded(1));
    let id = engine
        .create_question("q", params(10.0, 2, 1.0))
        .await
        .unwrap();

    let outcome = engine.submit_estimate(id, "p1", 50).await.unwrap();
    assert!(outcome.resolved);

    let results = engine.get_results(id).await.unwrap();
    assert_eq!(results.per_participant.len(), 1);
    assert_eq!(results.per_participant[0].tier.as_str(), "bonus");
    assert_eq!(results.per_participant[0].reward, 10.0);
    assert_eq!(engine.participant_total("p1").await.unwrap(), 10.0);
}

#[tokio::test]
async fn scenario_zero_alpha_is_rejected_at_creation() {
    let engine = engine_with(StoppingRule::seeded(1));
    let err = engine
        .create_question("q", params(10.0, 1, 0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn scenario_three_estimates_k_one_partitions_and_scores_correctly() {
    // Estimates 0.5, 0.6, 0.9 with k=1: the last estimate takes the flat
    // bonus; the first scores zero against the 0.5 prior; the second scores
    // the closed-form CE-MSR value of 0.6 against 0.5.
    let engine = engine_with(StoppingRule::seeded_with_capacity(42, 3));
    let id = engine
        .create_question("q", params(10.0, 1, 1e-9))
        .await
        .unwrap();
    engine.submit_estimate(id, "p1", 50).await.unwrap();
    engine.submit_estimate(id, "p2", 60).await.unwrap();
    let outcome = engine.submit_estimate(id, "p3", 90).await.unwrap();
    assert!(outcome.resolved);

    let results = engine.get_results(id).await.unwrap();
    assert_eq!(results.final_estimate, 0.9);
    assert_eq!(results.per_participant.len(), 3);

    let p1 = &results.per_participant[0];
    let p2 = &results.per_participant[1];
    let p3 = &results.per_participant[2];

    assert_eq!(p3.tier.as_str(), "bonus");
    assert_eq!(p3.reward, 10.0);

    assert_eq!(p1.tier.as_str(), "scored");
    assert!(p1.reward.abs() < 1e-12);

    assert_eq!(p2.tier.as_str(), "scored");
    let eps: f64 = 1e-4;
    let closed_form =
        0.5 * ((0.6 + eps) / (0.5 + eps)).ln() + 0.5 * ((0.4 + eps) / (0.5 + eps)).ln();
    assert!((p2.reward - closed_form).abs() < 1e-12);
}

#[tokio::test]
async fn invalid_submissions_are_rejected_cleanly() {
    let engine = engine_with(StoppingRule::seeded(42));
    let id = engine
        .create_question("q", params(10.0, 2, 1e-9))
        .await
        .unwrap();

    for bad in [0i64, 100, -5, 150] {
        let err = engine.submit_estimate(id, "alice", bad).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "value {bad}");
    }

    let err = engine
        .submit_estimate(uuid::Uuid::new_v4(), "alice", 50)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    // Nothing was accepted, so alice has no total yet.
    let err = engine.participant_total("alice").await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}
