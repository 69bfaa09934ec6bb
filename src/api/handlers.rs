use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::engine::Engine;
use crate::models::{
    CreateQuestionRequest, CreateQuestionResponse, ParticipantTotal, QuestionParams, QuestionView,
    ResultsResponse, SubmitEstimateRequest, SubmitEstimateResponse, TotalResponse,
};

/// How many rows the leaderboard returns. Pagination is deliberately out of
/// scope; the original interface always served a fixed top slice.
const LEADERBOARD_LIMIT: i64 = 10;

#[tracing::instrument(skip(engine, req), fields(r = req.r, k = req.k, alpha = req.alpha))]
pub async fn create_question_handler(
    State(engine): State<Engine>,
    Json(req): Json<CreateQuestionRequest>,
) -> ApiResult<(StatusCode, Json<CreateQuestionResponse>)> {
    let question_id = engine
        .create_question(
            &req.text,
            QuestionParams {
                r: req.r,
                k: req.k,
                alpha: req.alpha,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateQuestionResponse { question_id }),
    ))
}

#[tracing::instrument(skip(engine))]
pub async fn list_questions_handler(
    State(engine): State<Engine>,
) -> ApiResult<Json<Vec<QuestionView>>> {
    let questions = engine.list_open_questions().await?;
    Ok(Json(questions.into_iter().map(QuestionView::from).collect()))
}

#[tracing::instrument(skip(engine), fields(question_id = %question_id))]
pub async fn get_question_handler(
    State(engine): State<Engine>,
    Path(question_id): Path<Uuid>,
) -> ApiResult<Json<QuestionView>> {
    let question = engine.get_question(question_id).await?;
    Ok(Json(QuestionView::from(question)))
}

#[tracing::instrument(
    skip(engine, req),
    fields(question_id = %question_id, participant_id = %req.participant_id)
)]
pub async fn submit_estimate_handler(
    State(engine): State<Engine>,
    Path(question_id): Path<Uuid>,
    Json(req): Json<SubmitEstimateRequest>,
) -> ApiResult<Json<SubmitEstimateResponse>> {
    info!("Processing estimate submission");

    let outcome = engine
        .submit_estimate(question_id, &req.participant_id, req.value)
        .await?;

    Ok(Json(SubmitEstimateResponse {
        resolved: outcome.resolved,
    }))
}

#[tracing::instrument(skip(engine), fields(question_id = %question_id))]
pub async fn get_results_handler(
    State(engine): State<Engine>,
    Path(question_id): Path<Uuid>,
) -> ApiResult<Json<ResultsResponse>> {
    let results = engine.get_results(question_id).await?;
    Ok(Json(results))
}

#[tracing::instrument(skip(engine), fields(participant_id = %participant_id))]
pub async fn participant_total_handler(
    State(engine): State<Engine>,
    Path(participant_id): Path<String>,
) -> ApiResult<Json<TotalResponse>> {
    let total = engine.participant_total(&participant_id).await?;
    Ok(Json(TotalResponse {
        participant_id,
        total,
    }))
}

#[tracing::instrument(skip(engine))]
pub async fn leaderboard_handler(
    State(engine): State<Engine>,
) -> ApiResult<Json<Vec<ParticipantTotal>>> {
    let rows = engine.leaderboard(LEADERBOARD_LIMIT).await?;
    Ok(Json(rows))
}
