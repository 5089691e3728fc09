use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::types::{GradeLetter, QuestionKind, Section, TextDirection};

/// Immutable question definition as authored in an exam template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) section: Section,
    pub(crate) prompt: String,
    #[serde(rename = "type")]
    pub(crate) kind: QuestionKind,
    #[serde(default)]
    pub(crate) options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    pub(crate) correct_answer: String,
    pub(crate) marks: u32,
    #[serde(default)]
    pub(crate) explanation: String,
    #[serde(default)]
    pub(crate) topic: Option<String>,
    #[serde(default)]
    pub(crate) diagram: Option<String>,
}

impl Question {
    pub(crate) fn is_mcq(&self) -> bool {
        self.kind == QuestionKind::Mcq
    }
}

/// A named, timed collection of questions for one year/subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) year: i32,
    #[serde(alias = "subjectKey")]
    pub(crate) subject_key: String,
    #[serde(alias = "subjectLabel")]
    pub(crate) subject_label: String,
    #[serde(alias = "durationMinutes")]
    pub(crate) duration_minutes: u32,
    #[serde(default)]
    pub(crate) direction: TextDirection,
    #[serde(default)]
    pub(crate) passages: HashMap<Section, String>,
    pub(crate) questions: Vec<Question>,
}

#[derive(Debug, Error)]
pub(crate) enum TemplateError {
    #[error("exam {exam_id}: duration_minutes must be positive")]
    InvalidDuration { exam_id: String },
    #[error("exam {exam_id}: question list is empty")]
    NoQuestions { exam_id: String },
    #[error("exam {exam_id}: question {question_id} has marks = 0")]
    ZeroMarks { exam_id: String, question_id: String },
    #[error("exam {exam_id}: mcq question {question_id} has no options")]
    NoOptions { exam_id: String, question_id: String },
    #[error("exam {exam_id}: mcq question {question_id} correct answer not among options")]
    AnswerNotInOptions { exam_id: String, question_id: String },
}

impl Exam {
    /// Template invariants: positive duration, non-empty question list,
    /// marks >= 1, and every mcq correct answer present among its options
    /// under the case-insensitive trim comparison used by grading.
    pub(crate) fn validate(&self) -> Result<(), TemplateError> {
        if self.duration_minutes == 0 {
            return Err(TemplateError::InvalidDuration { exam_id: self.id.clone() });
        }
        if self.questions.is_empty() {
            return Err(TemplateError::NoQuestions { exam_id: self.id.clone() });
        }

        for question in &self.questions {
            if question.marks == 0 {
                return Err(TemplateError::ZeroMarks {
                    exam_id: self.id.clone(),
                    question_id: question.id.clone(),
                });
            }
            if question.is_mcq() {
                if question.options.is_empty() {
                    return Err(TemplateError::NoOptions {
                        exam_id: self.id.clone(),
                        question_id: question.id.clone(),
                    });
                }
                let wanted = normalize_answer(&question.correct_answer);
                if !question.options.iter().any(|option| normalize_answer(option) == wanted) {
                    return Err(TemplateError::AnswerNotInOptions {
                        exam_id: self.id.clone(),
                        question_id: question.id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub(crate) fn duration_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }
}

/// Case-insensitive trim comparison form shared by validation and grading.
pub(crate) fn normalize_answer(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Per-attempt copy of an exam whose mcq options have been shuffled.
/// Read-only for the remainder of its lifetime; discarded after grading.
#[derive(Debug, Clone)]
pub(crate) struct ExamInstance {
    pub(crate) exam: Exam,
}

impl ExamInstance {
    pub(crate) fn questions(&self) -> &[Question] {
        &self.exam.questions
    }

    pub(crate) fn max_score(&self) -> u32 {
        self.exam.questions.iter().map(|question| question.marks).sum()
    }
}

/// Per-question grading outcome shown back to the student.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct GradedFeedback {
    pub(crate) question_id: String,
    pub(crate) section: Section,
    pub(crate) prompt: String,
    pub(crate) student_answer: String,
    pub(crate) correct_answer: String,
    pub(crate) awarded: u32,
    pub(crate) marks: u32,
    pub(crate) feedback: String,
    pub(crate) correct: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub(crate) struct SectionScore {
    pub(crate) score: u32,
    pub(crate) total: u32,
}

/// Aggregate produced by one completed grading pass; never mutated after.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExamResult {
    pub(crate) exam_id: String,
    pub(crate) subject_key: String,
    pub(crate) subject_label: String,
    pub(crate) year: i32,
    pub(crate) total_score: u32,
    pub(crate) max_score: u32,
    pub(crate) percentage: f64,
    pub(crate) grade: GradeLetter,
    pub(crate) feedback: Vec<GradedFeedback>,
    pub(crate) section_totals: HashMap<Section, SectionScore>,
    pub(crate) time_taken_seconds: u64,
}

/// Record handed to the persistence collaborator once per completed attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SavedResult {
    pub(crate) exam_id: String,
    pub(crate) subject: String,
    pub(crate) year: i32,
    pub(crate) score: u32,
    pub(crate) max_score: u32,
    pub(crate) grade: GradeLetter,
    pub(crate) date: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubjectStats {
    pub(crate) subject: String,
    pub(crate) average: f64,
    pub(crate) attempts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq_question(id: &str, options: &[&str], correct: &str) -> Question {
        Question {
            id: id.to_string(),
            section: Section::Mcq,
            prompt: "pick one".to_string(),
            kind: QuestionKind::Mcq,
            options: options.iter().map(|option| option.to_string()).collect(),
            correct_answer: correct.to_string(),
            marks: 1,
            explanation: String::new(),
            topic: None,
            diagram: None,
        }
    }

    fn exam_with(questions: Vec<Question>) -> Exam {
        Exam {
            id: "exam-1".to_string(),
            year: 2023,
            subject_key: "mathematics".to_string(),
            subject_label: "Mathematics".to_string(),
            duration_minutes: 60,
            direction: TextDirection::Ltr,
            passages: HashMap::new(),
            questions,
        }
    }

    #[test]
    fn validate_accepts_case_insensitive_answer_match() {
        let exam = exam_with(vec![mcq_question("q1", &["Paris", "London"], "  paris ")]);
        exam.validate().expect("valid template");
    }

    #[test]
    fn validate_rejects_answer_missing_from_options() {
        let exam = exam_with(vec![mcq_question("q1", &["A", "B"], "C")]);
        assert!(matches!(exam.validate(), Err(TemplateError::AnswerNotInOptions { .. })));
    }

    #[test]
    fn validate_rejects_zero_duration_and_empty_questions() {
        let mut exam = exam_with(vec![mcq_question("q1", &["A", "B"], "A")]);
        exam.duration_minutes = 0;
        assert!(matches!(exam.validate(), Err(TemplateError::InvalidDuration { .. })));

        let empty = exam_with(Vec::new());
        assert!(matches!(empty.validate(), Err(TemplateError::NoQuestions { .. })));
    }

    #[test]
    fn exam_template_parses_camel_case_aliases() {
        let raw = serde_json::json!({
            "id": "math-2023",
            "year": 2023,
            "subjectKey": "mathematics",
            "subjectLabel": "Mathematics",
            "durationMinutes": 90,
            "questions": [{
                "id": "q1",
                "section": "mcq",
                "prompt": "2 + 2 = ?",
                "type": "mcq",
                "options": ["3", "4"],
                "correctAnswer": "4",
                "marks": 1
            }]
        });

        let exam: Exam = serde_json::from_value(raw).expect("exam json");
        assert_eq!(exam.subject_key, "mathematics");
        assert_eq!(exam.duration_seconds(), 5400);
        assert_eq!(exam.questions[0].kind, QuestionKind::Mcq);
        exam.validate().expect("valid template");
    }
}
