//! Concurrent-submission behavior: per-question serialization must prevent
//! lost updates, duplicate submissions, and double resolution under true
//! parallelism.

use std::sync::Arc;

use futures::future::join_all;

use crowdcast_engine::{Engine, EngineError, MemoryStore, QuestionParams, StoppingRule};

fn engine_with(stopping: StoppingRule) -> Engine {
    Engine::new(Arc::new(MemoryStore::new()), Arc::new(stopping))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_participants_all_land_without_lost_updates() {
    let engine = engine_with(StoppingRule::seeded(42));
    let id = engine
        .create_question("q", QuestionParams { r: 10.0, k: 2, alpha: 1e-9 })
        .await
        .unwrap();

    let tasks: Vec<_> = (0..10)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .submit_estimate(id, &format!("p{i}"), 30 + i as i64)
                    .await
            })
        })
        .collect();

    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let question = engine.get_question(id).await.unwrap();
    assert_eq!(question.estimates.len(), 10);

    let mut ids: Vec<_> = question
        .estimates
        .iter()
        .map(|e| e.participant_id.clone())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10, "every participant exactly once");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_duplicate_submissions_accept_exactly_one() {
    let engine = engine_with(StoppingRule::seeded(42));
    let id = engine
        .create_question("q", QuestionParams { r: 10.0, k: 2, alpha: 1e-9 })
        .await
        .unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.submit_estimate(id, "alice", 55).await })
        })
        .collect();

    let mut accepted = 0;
    for result in join_all(tasks).await {
        match result.unwrap() {
            Ok(_) => accepted += 1,
            Err(EngineError::Validation(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(accepted, 1);

    let question = engine.get_question(id).await.unwrap();
    assert_eq!(question.estimates.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn resolution_happens_exactly_once_under_contention() {
    // alpha = 1.0: whichever submission wins the lock resolves the
    // question; every other one must see Resolved and be rejected, and
    // rewards must be applied exactly once.
    let engine = engine_with(StoppingRule::seeded(42));
    let r = 10.0;
    let id = engine
        .create_question("q", QuestionParams { r, k: 2, alpha: 1.0 })
        .await
        .unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .submit_estimate(id, &format!("p{i}"), 50)
                    .await
                    .map(|outcome| (i, outcome))
            })
        })
        .collect();

    let mut winners = Vec::new();
    for result in join_all(tasks).await {
        match result.unwrap() {
            Ok((i, outcome)) => {
                assert!(outcome.resolved);
                winners.push(i);
            }
            Err(EngineError::Validation(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners.len(), 1, "exactly one submission resolves");

    let question = engine.get_question(id).await.unwrap();
    assert!(question.is_resolved());
    assert_eq!(question.estimates.len(), 1);

    // The winner holds the full bonus; nobody else was ever provisioned.
    let winner = format!("p{}", winners[0]);
    assert_eq!(engine.participant_total(&winner).await.unwrap(), r);
    for i in 0..8 {
        if i != winners[0] {
            let err = engine
                .participant_total(&format!("p{i}"))
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::NotFound(_)));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_questions_do_not_interfere() {
    let engine = engine_with(StoppingRule::seeded(42));
    let mut question_ids = Vec::new();
    for i in 0..4 {
        let id = engine
            .create_question(
                &format!("q{i}"),
                QuestionParams { r: 10.0, k: 2, alpha: 1e-9 },
            )
            .await
            .unwrap();
        question_ids.push(id);
    }

    let tasks: Vec<_> = question_ids
        .iter()
        .flat_map(|&id| {
            (0..5).map(move |i| (id, i))
        })
        .map(|(id, i)| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine.submit_estimate(id, &format!("p{i}"), 40 + i as i64).await
            })
        })
        .collect();

    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    for id in question_ids {
        let question = engine.get_question(id).await.unwrap();
        assert_eq!(question.estimates.len(), 5);
        assert!(!question.is_resolved());
    }
}
