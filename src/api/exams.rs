use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::schemas::exam::{ExamDetailResponse, ExamListResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", get(list_exams)).route("/:year/:subject", get(get_exam))
}

async fn list_exams(State(state): State<AppState>) -> Json<ExamListResponse> {
    let items = state.bank().summaries();
    let total_count = items.len();
    Json(ExamListResponse { items, total_count })
}

/// A missing template is the non-fatal "exam unavailable" state, never an
/// internal error.
async fn get_exam(
    Path((year, subject)): Path<(i32, String)>,
    State(state): State<AppState>,
) -> Result<Json<ExamDetailResponse>, ApiError> {
    let exam = state
        .bank()
        .get(year, &subject)
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    Ok(Json(ExamDetailResponse::from(exam)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn list_exams_returns_bank_summaries() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .oneshot(test_support::json_request(Method::GET, "/api/v1/exams", None))
            .await
            .expect("list exams");

        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body["total_count"], 1);
        assert_eq!(body["items"][0]["subject_key"], "mathematics");
        assert_eq!(body["items"][0]["question_count"], 2);
    }

    #[tokio::test]
    async fn get_exam_returns_detail_or_not_found() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/v1/exams/2023/mathematics", None))
            .await
            .expect("get exam");

        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {body}");
        assert_eq!(body["duration_minutes"], 30);

        let response = ctx
            .app
            .oneshot(test_support::json_request(Method::GET, "/api/v1/exams/1999/alchemy", None))
            .await
            .expect("get missing exam");

        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "response: {body}");
        assert_eq!(body["detail"], "Exam not found");
    }
}
