use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::models::Question;
use crate::domain::types::{QuestionKind, Section, SessionPhase, TextDirection};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AttemptStart {
    pub(crate) year: i32,
    #[serde(alias = "subjectKey")]
    #[validate(length(min = 1, message = "subject must not be empty"))]
    pub(crate) subject: String,
}

/// Student-facing view of a question: the answer key and explanation stay
/// server-side until grading has produced feedback.
#[derive(Debug, Serialize)]
pub(crate) struct QuestionView {
    pub(crate) id: String,
    pub(crate) section: Section,
    pub(crate) prompt: String,
    #[serde(rename = "type")]
    pub(crate) kind: QuestionKind,
    pub(crate) options: Vec<String>,
    pub(crate) marks: u32,
    pub(crate) topic: Option<String>,
    pub(crate) diagram: Option<String>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            section: question.section,
            prompt: question.prompt.clone(),
            kind: question.kind,
            options: question.options.clone(),
            marks: question.marks,
            topic: question.topic.clone(),
            diagram: question.diagram.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptStartedResponse {
    pub(crate) attempt_id: Uuid,
    pub(crate) exam_id: String,
    pub(crate) subject_key: String,
    pub(crate) subject_label: String,
    pub(crate) year: i32,
    pub(crate) duration_seconds: u64,
    pub(crate) direction: TextDirection,
    pub(crate) passages: HashMap<Section, String>,
    pub(crate) questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptStateResponse {
    pub(crate) attempt_id: Uuid,
    pub(crate) phase: SessionPhase,
    pub(crate) current_index: usize,
    pub(crate) remaining_seconds: u64,
    pub(crate) answers: HashMap<String, String>,
    pub(crate) grading_progress: u8,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerUpsert {
    #[serde(alias = "questionId")]
    #[validate(length(min = 1, message = "question_id must not be empty"))]
    pub(crate) question_id: String,
    #[serde(default)]
    pub(crate) answer: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NavigateRequest {
    pub(crate) delta: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingStatusResponse {
    pub(crate) status: &'static str,
    pub(crate) progress: u8,
}
