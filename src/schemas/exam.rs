use serde::Serialize;

use crate::domain::models::Exam;
use crate::domain::types::TextDirection;
use crate::repositories::exam_bank::ExamSummary;

#[derive(Debug, Serialize)]
pub(crate) struct ExamListResponse {
    pub(crate) items: Vec<ExamSummary>,
    pub(crate) total_count: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamDetailResponse {
    pub(crate) id: String,
    pub(crate) year: i32,
    pub(crate) subject_key: String,
    pub(crate) subject_label: String,
    pub(crate) duration_minutes: u32,
    pub(crate) direction: TextDirection,
    pub(crate) question_count: usize,
}

impl From<&Exam> for ExamDetailResponse {
    fn from(exam: &Exam) -> Self {
        Self {
            id: exam.id.clone(),
            year: exam.year,
            subject_key: exam.subject_key.clone(),
            subject_label: exam.subject_label.clone(),
            duration_minutes: exam.duration_minutes,
            direction: exam.direction,
            question_count: exam.questions.len(),
        }
    }
}
