use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::models::Exam;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExamSummary {
    pub(crate) year: i32,
    pub(crate) subject_key: String,
    pub(crate) subject_label: String,
    pub(crate) duration_minutes: u32,
    pub(crate) question_count: usize,
}

/// Static exam template source, loaded once at startup and indexed by
/// (year, subject). A missing exam is a non-fatal empty state for callers.
#[derive(Debug, Default, Clone)]
pub(crate) struct ExamBank {
    exams: HashMap<(i32, String), Exam>,
}

impl ExamBank {
    /// Reads every `*.json` template under `root`. Invalid files are logged
    /// and skipped so one broken template cannot take the bank down.
    pub(crate) fn load(root: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(root)
            .with_context(|| format!("failed to read exam bank directory: {}", root.display()))?;

        let mut exams = HashMap::new();
        for entry in entries {
            let path = entry.context("failed to read exam bank directory entry")?.path();
            if path.extension().and_then(|extension| extension.to_str()) != Some("json") {
                continue;
            }

            match load_template(&path) {
                Ok(exam) => {
                    let key = (exam.year, exam.subject_key.clone());
                    if let Some(previous) = exams.insert(key, exam) {
                        tracing::warn!(
                            exam_id = %previous.id,
                            path = %path.display(),
                            "Duplicate year/subject template replaced"
                        );
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, path = %path.display(), "Skipping invalid exam template");
                }
            }
        }

        if exams.is_empty() {
            tracing::warn!(path = %root.display(), "Exam bank is empty");
        } else {
            tracing::info!(count = exams.len(), "Exam bank loaded");
        }

        Ok(Self { exams })
    }

    #[cfg(test)]
    pub(crate) fn from_exams(exams: Vec<Exam>) -> Self {
        Self {
            exams: exams
                .into_iter()
                .map(|exam| ((exam.year, exam.subject_key.clone()), exam))
                .collect(),
        }
    }

    pub(crate) fn get(&self, year: i32, subject_key: &str) -> Option<&Exam> {
        self.exams.get(&(year, subject_key.to_string()))
    }

    pub(crate) fn len(&self) -> usize {
        self.exams.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.exams.is_empty()
    }

    pub(crate) fn summaries(&self) -> Vec<ExamSummary> {
        let mut summaries: Vec<ExamSummary> = self
            .exams
            .values()
            .map(|exam| ExamSummary {
                year: exam.year,
                subject_key: exam.subject_key.clone(),
                subject_label: exam.subject_label.clone(),
                duration_minutes: exam.duration_minutes,
                question_count: exam.questions.len(),
            })
            .collect();

        summaries.sort_by(|a, b| b.year.cmp(&a.year).then(a.subject_key.cmp(&b.subject_key)));
        summaries
    }
}

fn load_template(path: &Path) -> Result<Exam> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read exam template: {}", path.display()))?;
    let exam: Exam = serde_json::from_str(&raw)
        .with_context(|| format!("exam template has invalid format: {}", path.display()))?;
    exam.validate()?;
    Ok(exam)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use uuid::Uuid;

    use super::ExamBank;

    fn temp_bank_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("examprep-bank-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("create temp bank dir");
        dir
    }

    fn valid_template(id: &str, year: i32, subject: &str) -> String {
        serde_json::json!({
            "id": id,
            "year": year,
            "subjectKey": subject,
            "subjectLabel": subject.to_uppercase(),
            "durationMinutes": 60,
            "questions": [{
                "id": "q1",
                "section": "mcq",
                "prompt": "2 + 2 = ?",
                "type": "mcq",
                "options": ["3", "4"],
                "correctAnswer": "4",
                "marks": 1
            }]
        })
        .to_string()
    }

    #[test]
    fn load_indexes_templates_by_year_and_subject() {
        let dir = temp_bank_dir();
        fs::write(dir.join("math.json"), valid_template("math-2023", 2023, "mathematics"))
            .expect("write template");
        fs::write(dir.join("phys.json"), valid_template("phys-2022", 2022, "physics"))
            .expect("write template");
        fs::write(dir.join("notes.txt"), "not a template").expect("write stray file");

        let bank = ExamBank::load(&dir).expect("load bank");

        assert_eq!(bank.len(), 2);
        assert_eq!(bank.get(2023, "mathematics").expect("math exam").id, "math-2023");
        assert!(bank.get(2023, "physics").is_none());

        let summaries = bank.summaries();
        assert_eq!(summaries[0].year, 2023);
        assert_eq!(summaries[1].subject_key, "physics");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_skips_invalid_templates() {
        let dir = temp_bank_dir();
        fs::write(dir.join("good.json"), valid_template("chem-2024", 2024, "chemistry"))
            .expect("write template");
        fs::write(dir.join("broken.json"), "{ not json").expect("write broken file");
        // Structurally valid JSON that fails the template invariants: the
        // correct answer is not among the options.
        let invalid = serde_json::json!({
            "id": "bad-2024",
            "year": 2024,
            "subjectKey": "biology",
            "subjectLabel": "Biology",
            "durationMinutes": 60,
            "questions": [{
                "id": "q1",
                "section": "mcq",
                "prompt": "2 + 2 = ?",
                "type": "mcq",
                "options": ["3", "4"],
                "correctAnswer": "5",
                "marks": 1
            }]
        });
        fs::write(dir.join("invalid.json"), invalid.to_string()).expect("write invalid template");

        let bank = ExamBank::load(&dir).expect("load bank");

        assert_eq!(bank.len(), 1);
        assert!(bank.get(2024, "chemistry").is_some());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = std::env::temp_dir().join(format!("examprep-missing-{}", Uuid::new_v4()));
        assert!(ExamBank::load(&dir).is_err());
    }
}
