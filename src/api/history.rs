use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::history::{HistoryResponse, SubjectStatsResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(list_history)).route("/stats", get(subject_stats))
}

async fn list_history(State(state): State<AppState>) -> Result<Json<HistoryResponse>, ApiError> {
    let items = state
        .results()
        .history()
        .await
        .map_err(|err| ApiError::ServiceUnavailable(format!("result store unavailable: {err}")))?;

    let total_count = items.len();
    Ok(Json(HistoryResponse { items, total_count }))
}

async fn subject_stats(
    State(state): State<AppState>,
) -> Result<Json<SubjectStatsResponse>, ApiError> {
    let items = state
        .results()
        .subject_stats()
        .await
        .map_err(|err| ApiError::ServiceUnavailable(format!("result store unavailable: {err}")))?;

    Ok(Json(SubjectStatsResponse { items }))
}
