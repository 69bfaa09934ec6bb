//! Postgres store.
//!
//! Per-question serialization comes from `SELECT ... FOR UPDATE` on the
//! question row: two submissions to the same question queue on the row
//! lock, submissions to different questions proceed in parallel. The
//! estimate insert, the participant upsert, and the bulk reward update all
//! run inside the same transaction, so the commit is the atomicity
//! boundary for the whole submission unit.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, info};

use crate::engine::{lifecycle, EngineError, StoppingRule};
use crate::models::{
    Estimate, ParticipantTotal, Question, QuestionId, QuestionParams, QuestionStatus,
};
use crate::store::{QuestionStore, StoreError, SubmitOutcome};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS engine_question (
        id UUID PRIMARY KEY,
        text TEXT NOT NULL,
        reward_r DOUBLE PRECISION NOT NULL,
        bonus_k INTEGER NOT NULL,
        alpha DOUBLE PRECISION NOT NULL,
        resolved BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS engine_estimate (
        question_id UUID NOT NULL REFERENCES engine_question(id),
        position INTEGER NOT NULL,
        participant_id TEXT NOT NULL,
        value DOUBLE PRECISION NOT NULL,
        submitted_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (question_id, position),
        UNIQUE (question_id, participant_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS engine_participant (
        id TEXT PRIMARY KEY,
        total DOUBLE PRECISION NOT NULL DEFAULT 0,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with a small lazy pool and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        info!("Creating database connection pool");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(3))
            .connect_lazy(database_url)
            .map_err(|e| StoreError::Connection(format!("Failed to create pool: {}", e)))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        info!("Database schema ready");
        Ok(())
    }

    /// Load a question inside a transaction, taking the row lock that
    /// serializes concurrent submissions to it.
    async fn load_question_for_update(
        tx: &mut Transaction<'_, Postgres>,
        question_id: QuestionId,
    ) -> Result<Question, EngineError> {
        let row = sqlx::query(
            r#"
            SELECT id, text, reward_r, bonus_k, alpha, resolved, created_at
            FROM engine_question
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(question_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("question {question_id} not found")))?;

        let estimates = load_estimates(&mut **tx, question_id).await?;
        question_from_row(&row, estimates)
    }
}

async fn load_estimates<'e, E>(executor: E, question_id: QuestionId) -> Result<Vec<Estimate>, EngineError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query(
        r#"
        SELECT participant_id, value, submitted_at
        FROM engine_estimate
        WHERE question_id = $1
        ORDER BY position
        "#,
    )
    .bind(question_id)
    .fetch_all(executor)
    .await?;

    let mut estimates = Vec::with_capacity(rows.len());
    for row in rows {
        estimates.push(Estimate {
            participant_id: row.try_get::<String, _>("participant_id")?,
            value: row.try_get::<f64, _>("value")?,
            submitted_at: row.try_get::<DateTime<Utc>, _>("submitted_at")?,
        });
    }
    Ok(estimates)
}

fn question_from_row(
    row: &sqlx::postgres::PgRow,
    estimates: Vec<Estimate>,
) -> Result<Question, EngineError> {
    let resolved: bool = row.try_get("resolved")?;
    Ok(Question {
        id: row.try_get::<QuestionId, _>("id")?,
        text: row.try_get::<String, _>("text")?,
        params: QuestionParams {
            r: row.try_get::<f64, _>("reward_r")?,
            k: row.try_get::<i32, _>("bonus_k")? as u32,
            alpha: row.try_get::<f64, _>("alpha")?,
        },
        estimates,
        status: if resolved {
            QuestionStatus::Resolved
        } else {
            QuestionStatus::Open
        },
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl QuestionStore for PgStore {
    async fn create_question(
        &self,
        text: &str,
        params: QuestionParams,
    ) -> Result<QuestionId, EngineError> {
        let question = Question::new(text.to_string(), params);

        sqlx::query(
            r#"
            INSERT INTO engine_question (id, text, reward_r, bonus_k, alpha, resolved, created_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6)
            "#,
        )
        .bind(question.id)
        .bind(&question.text)
        .bind(params.r)
        .bind(params.k as i32)
        .bind(params.alpha)
        .bind(question.created_at)
        .execute(&self.pool)
        .await?;

        Ok(question.id)
    }

    #[tracing::instrument(skip(self, stopping), fields(question_id = %question_id, participant_id))]
    async fn submit_estimate(
        &self,
        question_id: QuestionId,
        participant_id: &str,
        value: f64,
        stopping: &StoppingRule,
    ) -> Result<SubmitOutcome, EngineError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Transaction(format!("Failed to start transaction: {}", e)))?;

        // Row lock held until commit serializes this question's unit.
        let mut question = Self::load_question_for_update(&mut tx, question_id).await?;
        let allocation = lifecycle::record_estimate(&mut question, participant_id, value, stopping)?;

        let appended = question
            .estimates
            .last()
            .ok_or_else(|| {
                EngineError::InvariantViolation(
                    "accepted submission left an empty estimate sequence".to_string(),
                )
            })?;

        sqlx::query(
            r#"
            INSERT INTO engine_estimate (question_id, position, participant_id, value, submitted_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(question_id)
        .bind((question.estimates.len() - 1) as i32)
        .bind(participant_id)
        .bind(appended.value)
        .bind(appended.submitted_at)
        .execute(&mut *tx)
        .await?;

        // First accepted submission provisions the participant's total.
        sqlx::query(
            r#"
            INSERT INTO engine_participant (id, total, updated_at)
            VALUES ($1, 0, NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(participant_id)
        .execute(&mut *tx)
        .await?;

        if let Some(allocation) = &allocation {
            debug!(deltas = allocation.deltas.len(), "applying resolution rewards");

            sqlx::query("UPDATE engine_question SET resolved = TRUE WHERE id = $1")
                .bind(question_id)
                .execute(&mut *tx)
                .await?;

            let ids: Vec<String> = allocation
                .deltas
                .iter()
                .map(|d| d.participant_id.clone())
                .collect();
            let rewards: Vec<f64> = allocation.deltas.iter().map(|d| d.reward).collect();

            sqlx::query(
                r#"
                UPDATE engine_participant AS p
                SET total = p.total + d.delta, updated_at = NOW()
                FROM UNNEST($1::text[], $2::float8[]) AS d(id, delta)
                WHERE p.id = d.id
                "#,
            )
            .bind(&ids[..])
            .bind(&rewards[..])
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Transaction(format!("Failed to commit transaction: {}", e)))?;

        Ok(SubmitOutcome {
            resolved: allocation.is_some(),
        })
    }

    async fn get_question(&self, question_id: QuestionId) -> Result<Question, EngineError> {
        let row = sqlx::query(
            r#"
            SELECT id, text, reward_r, bonus_k, alpha, resolved, created_at
            FROM engine_question
            WHERE id = $1
            "#,
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("question {question_id} not found")))?;

        let estimates = load_estimates(&self.pool, question_id).await?;
        question_from_row(&row, estimates)
    }

    async fn list_open_questions(&self) -> Result<Vec<Question>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT id, text, reward_r, bonus_k, alpha, resolved, created_at
            FROM engine_question
            WHERE NOT resolved
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut questions = Vec::with_capacity(rows.len());
        for row in rows {
            let id: QuestionId = row.try_get("id")?;
            let estimates = load_estimates(&self.pool, id).await?;
            questions.push(question_from_row(&row, estimates)?);
        }
        Ok(questions)
    }

    async fn participant_total(&self, participant_id: &str) -> Result<f64, EngineError> {
        let row = sqlx::query("SELECT total FROM engine_participant WHERE id = $1")
            .bind(participant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound(format!("participant {participant_id} not found"))
            })?;

        Ok(row.try_get::<f64, _>("total")?)
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<ParticipantTotal>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT id, total
            FROM engine_participant
            ORDER BY total DESC, id
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(ParticipantTotal {
                participant_id: row.try_get::<String, _>("id")?,
                total: row.try_get::<f64, _>("total")?,
            });
        }
        Ok(out)
    }
}
