//! In-memory store.
//!
//! Each question sits behind its own `tokio::sync::Mutex`; holding it for
//! the duration of `submit_estimate` is the per-question serialization
//! unit. Participant totals live behind a single mutex, and all deltas from
//! one resolution are applied under one acquisition, which makes the
//! application all-or-nothing. Lock order is always registry, then
//! question, then totals.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::engine::{lifecycle, EngineError, StoppingRule};
use crate::models::{ParticipantId, ParticipantTotal, Question, QuestionId, QuestionParams};
use crate::store::{QuestionStore, SubmitOutcome};

#[derive(Default)]
pub struct MemoryStore {
    questions: RwLock<HashMap<QuestionId, Arc<Mutex<Question>>>>,
    totals: Mutex<HashMap<ParticipantId, f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn question_handle(
        &self,
        question_id: QuestionId,
    ) -> Result<Arc<Mutex<Question>>, EngineError> {
        self.questions
            .read()
            .await
            .get(&question_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("question {question_id} not found")))
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn create_question(
        &self,
        text: &str,
        params: QuestionParams,
    ) -> Result<QuestionId, EngineError> {
        let question = Question::new(text.to_string(), params);
        let id = question.id;
        self.questions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(question)));
        Ok(id)
    }

    async fn submit_estimate(
        &self,
        question_id: QuestionId,
        participant_id: &str,
        value: f64,
        stopping: &StoppingRule,
    ) -> Result<SubmitOutcome, EngineError> {
        let handle = self.question_handle(question_id).await?;

        // Exclusive access to this question for the whole unit; other
        // questions stay fully concurrent.
        let mut question = handle.lock().await;
        let allocation = lifecycle::record_estimate(&mut question, participant_id, value, stopping)?;

        let mut totals = self.totals.lock().await;
        // First accepted submission provisions the participant's total.
        totals.entry(participant_id.to_string()).or_insert(0.0);
        if let Some(allocation) = &allocation {
            debug!(
                question_id = %question_id,
                deltas = allocation.deltas.len(),
                "applying resolution rewards"
            );
            for delta in &allocation.deltas {
                *totals.entry(delta.participant_id.clone()).or_insert(0.0) += delta.reward;
            }
        }

        Ok(SubmitOutcome {
            resolved: allocation.is_some(),
        })
    }

    async fn get_question(&self, question_id: QuestionId) -> Result<Question, EngineError> {
        let handle = self.question_handle(question_id).await?;
        let question = handle.lock().await;
        Ok(question.clone())
    }

    async fn list_open_questions(&self) -> Result<Vec<Question>, EngineError> {
        let registry = self.questions.read().await;
        let mut open = Vec::new();
        for handle in registry.values() {
            let question = handle.lock().await;
            if !question.is_resolved() {
                open.push(question.clone());
            }
        }
        open.sort_by_key(|q| q.created_at);
        Ok(open)
    }

    async fn participant_total(&self, participant_id: &str) -> Result<f64, EngineError> {
        self.totals
            .lock()
            .await
            .get(participant_id)
            .copied()
            .ok_or_else(|| {
                EngineError::NotFound(format!("participant {participant_id} not found"))
            })
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<ParticipantTotal>, EngineError> {
        let totals = self.totals.lock().await;
        let mut rows: Vec<ParticipantTotal> = totals
            .iter()
            .map(|(id, total)| ParticipantTotal {
                participant_id: id.clone(),
                total: *total,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.participant_id.cmp(&b.participant_id))
        });
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}
