use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::core::metrics;
use crate::core::state::AppState;
use crate::repositories::results::StoreHealth;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let response = RootResponse {
        message: "ExamPrep Rust API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs_url: format!("{}/docs", state.settings().api().api_v1_str),
    };

    Json(response)
}

pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut status = "healthy".to_string();
    let mut components = HashMap::new();

    match state.results().health().await {
        StoreHealth::Healthy => {
            components.insert("result_store".to_string(), "healthy".to_string());
        }
        StoreHealth::Disconnected => {
            components.insert("result_store".to_string(), "disconnected".to_string());
        }
        StoreHealth::Unhealthy(error) => {
            components.insert("result_store".to_string(), format!("unhealthy: {error}"));
            status = "degraded".to_string();
        }
    }

    if state.bank().is_empty() {
        components.insert("exam_bank".to_string(), "empty".to_string());
        status = "degraded".to_string();
    } else {
        components.insert("exam_bank".to_string(), format!("{} exams", state.bank().len()));
    }

    Json(HealthResponse { service: "examprep-api".to_string(), status, components })
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
