use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tower::ServiceExt;

use crate::api;
use crate::core::{config::Settings, state::AppState};
use crate::domain::models::{Exam, Question, SavedResult};
use crate::domain::types::{QuestionKind, Section, TextDirection};
use crate::repositories::exam_bank::ExamBank;
use crate::repositories::results::MemoryResultStore;
use crate::services::attempts::AttemptService;
use crate::services::oracle::GradingOracle;

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) store: Arc<MemoryResultStore>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    dotenvy::dotenv().ok();

    std::env::set_var("EXAMPREP_ENV", "test");
    std::env::set_var("EXAMPREP_STRICT_CONFIG", "0");
    std::env::set_var("EXAMPREP_ORACLE_DELAY_MS", "0");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("ORACLE_API_KEY");
    std::env::remove_var("ORACLE_BASE_URL");
}

/// One mcq plus one open-ended question; the open-ended answer "paris is
/// the capital" earns full marks through the fallback's substring match.
pub(crate) fn sample_exam() -> Exam {
    Exam {
        id: "math-2023".to_string(),
        year: 2023,
        subject_key: "mathematics".to_string(),
        subject_label: "Mathematics".to_string(),
        duration_minutes: 30,
        direction: TextDirection::Ltr,
        passages: HashMap::new(),
        questions: vec![
            Question {
                id: "q1".to_string(),
                section: Section::Mcq,
                prompt: "Which letter comes second?".to_string(),
                kind: QuestionKind::Mcq,
                options: vec!["A".to_string(), "B".to_string()],
                correct_answer: "B".to_string(),
                marks: 1,
                explanation: "B follows A.".to_string(),
                topic: None,
                diagram: None,
            },
            Question {
                id: "q2".to_string(),
                section: Section::ShortAnswer,
                prompt: "What is the capital of France?".to_string(),
                kind: QuestionKind::Text,
                options: Vec::new(),
                correct_answer: "Paris".to_string(),
                marks: 4,
                explanation: "Paris has been the capital since 987.".to_string(),
                topic: Some("geography".to_string()),
                diagram: None,
            },
        ],
    }
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let bank = ExamBank::from_exams(vec![sample_exam()]);
    let store = Arc::new(MemoryResultStore::default());
    let attempts =
        AttemptService::new(GradingOracle::heuristic_only(), store.clone(), Duration::ZERO);

    let state = AppState::new(settings, bank, store.clone(), attempts);
    let app = api::router::router(state.clone());

    TestContext { state, app, store, _guard: guard }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}

/// Polls the result endpoint until grading completes.
pub(crate) async fn poll_result(app: &Router, attempt_id: &str) -> serde_json::Value {
    let uri = format!("/api/v1/attempts/{attempt_id}/result");

    for _ in 0..200 {
        let response = app
            .clone()
            .oneshot(json_request(Method::GET, &uri, None))
            .await
            .expect("poll result");

        if response.status() == StatusCode::OK {
            return read_json(response).await;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("grading never completed for attempt {attempt_id}");
}

/// Waits for the fire-and-forget persistence to land `count` results.
pub(crate) async fn wait_for_saved(
    store: &Arc<MemoryResultStore>,
    count: usize,
) -> Vec<SavedResult> {
    for _ in 0..200 {
        let saved = store.saved().await;
        if saved.len() >= count {
            return saved;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("expected {count} saved results");
}
