use std::collections::HashMap;
use std::time::Duration;

use tokio::time::sleep;

use crate::domain::models::{ExamResult, GradedFeedback, SectionScore};
use crate::domain::types::{GradeLetter, Section};
use crate::services::oracle::GradingOracle;
use crate::services::session::GradingJob;

/// Grades every question of a submitted attempt, strictly sequentially and
/// in authoring order. Sequencing is deliberate: the external scorer is rate
/// limited, and progress reporting counts whole questions. The oracle never
/// fails, so this loop carries no recovery logic of its own.
pub(crate) async fn grade_all<F>(
    oracle: &GradingOracle,
    job: &GradingJob,
    oracle_delay: Duration,
    mut on_progress: F,
) -> ExamResult
where
    F: FnMut(u8),
{
    let timer = std::time::Instant::now();
    let questions = job.instance.questions();
    let total_questions = questions.len();
    let max_score = job.instance.max_score();

    // Section capacities are fixed by the template; precompute them so the
    // subtotals always sum to max_score no matter what grading awards.
    let mut section_totals: HashMap<Section, SectionScore> = HashMap::new();
    for question in questions {
        section_totals.entry(question.section).or_default().total += question.marks;
    }

    let mut total_score = 0u32;
    let mut feedback = Vec::with_capacity(total_questions);

    for (index, question) in questions.iter().enumerate() {
        let answer = job.answers.get(&question.id).cloned().unwrap_or_default();

        // The delay goes before the call, not after it.
        if !question.is_mcq() && !oracle_delay.is_zero() {
            sleep(oracle_delay).await;
        }

        let graded = oracle.grade(question, &answer).await;

        total_score += graded.score;
        if let Some(entry) = section_totals.get_mut(&question.section) {
            entry.score += graded.score;
        }

        feedback.push(GradedFeedback {
            question_id: question.id.clone(),
            section: question.section,
            prompt: question.prompt.clone(),
            student_answer: answer,
            correct_answer: question.correct_answer.clone(),
            awarded: graded.score,
            marks: question.marks,
            feedback: graded.feedback,
            correct: graded.score == question.marks,
        });

        let percent = ((index + 1) as f64 / total_questions as f64 * 100.0).round() as u8;
        on_progress(percent);
    }

    let percentage = if max_score == 0 {
        0.0
    } else {
        f64::from(total_score) / f64::from(max_score) * 100.0
    };
    let grade = GradeLetter::from_percentage(percentage);

    metrics::counter!("grading_jobs_total", "status" => "success").increment(1);
    metrics::histogram!("grading_duration_seconds").record(timer.elapsed().as_secs_f64());

    tracing::info!(
        exam_id = %job.instance.exam.id,
        total_score,
        max_score,
        grade = grade.as_str(),
        "Grading pass completed"
    );

    ExamResult {
        exam_id: job.instance.exam.id.clone(),
        subject_key: job.instance.exam.subject_key.clone(),
        subject_label: job.instance.exam.subject_label.clone(),
        year: job.instance.exam.year,
        total_score,
        max_score,
        percentage,
        grade,
        feedback,
        section_totals,
        time_taken_seconds: job.time_taken_seconds,
    }
}
