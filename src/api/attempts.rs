use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::attempt::{
    AnswerUpsert, AttemptStart, AttemptStartedResponse, AttemptStateResponse,
    GradingStatusResponse, NavigateRequest, QuestionView,
};
use crate::services::attempts::ResultState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_attempt))
        .route("/:attempt_id", get(get_attempt))
        .route("/:attempt_id/answer", put(record_answer))
        .route("/:attempt_id/navigate", post(navigate))
        .route("/:attempt_id/submit", post(request_submit))
        .route("/:attempt_id/cancel", post(cancel_submit))
        .route("/:attempt_id/confirm", post(confirm_submit))
        .route("/:attempt_id/exit", post(exit_attempt))
        .route("/:attempt_id/result", get(get_result))
}

async fn start_attempt(
    State(state): State<AppState>,
    Json(payload): Json<AttemptStart>,
) -> Result<(StatusCode, Json<AttemptStartedResponse>), ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let template = state
        .bank()
        .get(payload.year, &payload.subject)
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?
        .clone();

    let attempt_id = state.attempts().start(&template).await;
    let instance = state
        .attempts()
        .instance(attempt_id)
        .await
        .ok_or_else(|| ApiError::internal("attempt missing after start", "Failed to start attempt"))?;

    let exam = &instance.exam;
    let response = AttemptStartedResponse {
        attempt_id,
        exam_id: exam.id.clone(),
        subject_key: exam.subject_key.clone(),
        subject_label: exam.subject_label.clone(),
        year: exam.year,
        duration_seconds: exam.duration_seconds(),
        direction: exam.direction,
        passages: exam.passages.clone(),
        questions: exam.questions.iter().map(QuestionView::from).collect(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_attempt(
    Path(attempt_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<AttemptStateResponse>, ApiError> {
    Ok(Json(snapshot_response(&state, attempt_id).await?))
}

async fn record_answer(
    Path(attempt_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<AnswerUpsert>,
) -> Result<Json<AttemptStateResponse>, ApiError> {
    payload.validate().map_err(|err| ApiError::BadRequest(err.to_string()))?;

    state.attempts().record_answer(attempt_id, &payload.question_id, payload.answer).await?;
    Ok(Json(snapshot_response(&state, attempt_id).await?))
}

async fn navigate(
    Path(attempt_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<NavigateRequest>,
) -> Result<Json<AttemptStateResponse>, ApiError> {
    state.attempts().navigate(attempt_id, payload.delta).await?;
    Ok(Json(snapshot_response(&state, attempt_id).await?))
}

async fn request_submit(
    Path(attempt_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<AttemptStateResponse>, ApiError> {
    state.attempts().request_submit(attempt_id).await?;
    Ok(Json(snapshot_response(&state, attempt_id).await?))
}

async fn cancel_submit(
    Path(attempt_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<AttemptStateResponse>, ApiError> {
    state.attempts().cancel_submit(attempt_id).await?;
    Ok(Json(snapshot_response(&state, attempt_id).await?))
}

async fn confirm_submit(
    Path(attempt_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<GradingStatusResponse>), ApiError> {
    state.attempts().confirm_submit(attempt_id).await?;
    Ok((StatusCode::ACCEPTED, Json(GradingStatusResponse { status: "grading", progress: 0 })))
}

async fn exit_attempt(
    Path(attempt_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.attempts().exit(attempt_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_result(
    Path(attempt_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    match state.attempts().result(attempt_id).await? {
        ResultState::Ready(result) => Ok(Json(*result).into_response()),
        ResultState::Pending(progress) => Ok((
            StatusCode::CONFLICT,
            Json(GradingStatusResponse { status: "grading", progress }),
        )
            .into_response()),
    }
}

async fn snapshot_response(
    state: &AppState,
    attempt_id: Uuid,
) -> Result<AttemptStateResponse, ApiError> {
    let snapshot = state
        .attempts()
        .snapshot(attempt_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    Ok(AttemptStateResponse {
        attempt_id,
        phase: snapshot.phase,
        current_index: snapshot.current_index,
        remaining_seconds: snapshot.remaining_seconds,
        answers: snapshot.answers,
        grading_progress: snapshot.grading_progress,
    })
}
