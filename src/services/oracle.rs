use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::config::Settings;
use crate::domain::models::{normalize_answer, Question};

const SCORING_SYSTEM_PROMPT: &str = r#"You are a strict but fair examiner grading a single open-ended exam answer.
Compare the student answer against the reference answer and award a numeric score.

Rules:
1. Award the full mark for an answer equivalent in meaning to the reference answer.
2. Award partial credit for an incomplete but relevant answer.
3. Award zero for an empty, irrelevant or contradictory answer.
4. Never award more than the maximum mark.

Respond with strict JSON: {"score": <number>}
"#;

/// One question/answer pair sent to the external scorer.
#[derive(Debug, Clone)]
pub(crate) struct ScoreRequest {
    pub(crate) question: String,
    pub(crate) canonical_answer: String,
    pub(crate) student_answer: String,
    pub(crate) max_marks: u32,
}

#[async_trait]
pub(crate) trait TextScorer: Send + Sync {
    async fn score(&self, request: &ScoreRequest) -> Result<f64>;
}

/// OpenAI-compatible chat-completions scorer for open-ended answers.
#[derive(Debug, Clone)]
pub(crate) struct RemoteTextScorer {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl RemoteTextScorer {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.oracle().request_timeout);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: settings.oracle().api_key.clone(),
            base_url: settings.oracle().base_url.trim_end_matches('/').to_string(),
            model: settings.oracle().model.clone(),
            max_tokens: settings.oracle().max_tokens,
        })
    }
}

#[async_trait]
impl TextScorer for RemoteTextScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<f64> {
        let user_prompt = format!(
            "Question:\n{}\n\nReference answer:\n{}\n\nMaximum mark: {}\n\nStudent answer:\n{}\n\nGrade the student answer. Respond with the JSON format from the system prompt.",
            request.question, request.canonical_answer, request.max_marks, request.student_answer
        );

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SCORING_SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt}
            ],
            "max_completion_tokens": self.max_tokens,
            "temperature": 0.0,
            "response_format": {"type": "json_object"}
        });

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error = None;
        let mut body = Value::Null;

        for attempt in 0..=1 {
            let response =
                self.client.post(&url).bearer_auth(&self.api_key).json(&payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    body = resp.json().await.unwrap_or(Value::Null);
                    if status.is_success() {
                        last_error = None;
                        break;
                    }
                    last_error = Some(anyhow::anyhow!("scorer API error: {body}"));
                }
                Err(err) => {
                    last_error = Some(anyhow::anyhow!(err).context("Failed to call scorer API"));
                }
            }

            if attempt < 1 {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }

        if let Some(err) = last_error {
            return Err(err);
        }

        let content = body
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|value| value.as_str())
            .context("Missing scorer response content")?;

        parse_score(content).context("Failed to parse scorer response")
    }
}

/// Accepts {"score": N} or a bare number; the scorer contract is score-only,
/// feedback text is always synthesized locally.
fn parse_score(content: &str) -> Option<f64> {
    let parsed: Value = serde_json::from_str(content.trim()).ok()?;
    match &parsed {
        Value::Number(number) => number.as_f64(),
        Value::Object(map) => map.get("score").and_then(|value| value.as_f64()),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GradedAnswer {
    pub(crate) score: u32,
    pub(crate) feedback: String,
}

/// Scores one question/answer pair. Mcq grading is fully local; open-ended
/// answers go to the external scorer when one is configured, with the local
/// heuristic as the terminal error handler. `grade` never fails.
#[derive(Clone)]
pub(crate) struct GradingOracle {
    scorer: Option<Arc<dyn TextScorer>>,
}

impl GradingOracle {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        if settings.oracle().base_url.is_empty() {
            tracing::warn!(
                "No scorer endpoint configured; open-ended grading uses the local heuristic"
            );
            return Ok(Self::heuristic_only());
        }

        let scorer = RemoteTextScorer::from_settings(settings)?;
        Ok(Self::with_scorer(Arc::new(scorer)))
    }

    pub(crate) fn with_scorer(scorer: Arc<dyn TextScorer>) -> Self {
        Self { scorer: Some(scorer) }
    }

    pub(crate) fn heuristic_only() -> Self {
        Self { scorer: None }
    }

    pub(crate) async fn grade(&self, question: &Question, answer: &str) -> GradedAnswer {
        let score = if question.is_mcq() {
            self.grade_mcq(question, answer)
        } else {
            self.grade_text(question, answer).await
        };

        GradedAnswer { score, feedback: compose_feedback(question, score) }
    }

    fn grade_mcq(&self, question: &Question, answer: &str) -> u32 {
        if normalize_answer(answer) == normalize_answer(&question.correct_answer) {
            question.marks
        } else {
            0
        }
    }

    async fn grade_text(&self, question: &Question, answer: &str) -> u32 {
        let Some(scorer) = &self.scorer else {
            return fallback_score(question, answer);
        };

        let request = ScoreRequest {
            question: question.prompt.clone(),
            canonical_answer: question.correct_answer.clone(),
            student_answer: answer.to_string(),
            max_marks: question.marks,
        };

        match scorer.score(&request).await {
            Ok(raw) if raw.is_finite() => raw.clamp(0.0, f64::from(question.marks)).round() as u32,
            Ok(raw) => {
                tracing::warn!(question_id = %question.id, raw, "Scorer returned a non-finite score; using fallback");
                metrics::counter!("grading_fallback_total").increment(1);
                fallback_score(question, answer)
            }
            Err(err) => {
                tracing::warn!(question_id = %question.id, error = %err, "Scorer unavailable; using fallback");
                metrics::counter!("grading_fallback_total").increment(1);
                fallback_score(question, answer)
            }
        }
    }
}

/// Local heuristic for open-ended answers when the scorer is unreachable.
/// Exact/substring match of normalized strings earns full marks; otherwise
/// keyword overlap against the canonical answer's significant words decides
/// between full, half (rounded up), a single participation mark for a
/// non-trivial answer, or zero.
fn fallback_score(question: &Question, answer: &str) -> u32 {
    let student = normalize_answer(answer);
    let canonical = normalize_answer(&question.correct_answer);

    if student.is_empty() {
        return 0;
    }
    if student == canonical || student.contains(&canonical) || canonical.contains(&student) {
        return question.marks;
    }

    let significant: Vec<&str> =
        canonical.split_whitespace().filter(|word| word.len() > 3).collect();
    if !significant.is_empty() {
        let student_words: HashSet<&str> = student.split_whitespace().collect();
        let matched = significant.iter().filter(|word| student_words.contains(*word)).count();
        let overlap = matched as f64 / significant.len() as f64;

        if overlap >= 0.7 {
            return question.marks;
        }
        if overlap >= 0.4 {
            return question.marks.div_ceil(2);
        }
    }

    if answer.trim().chars().count() > 10 {
        1
    } else {
        0
    }
}

fn compose_feedback(question: &Question, score: u32) -> String {
    let label = if score == question.marks {
        "Correct."
    } else if score > 0 {
        "Partially correct."
    } else {
        "Incorrect."
    };

    let mut parts = vec![label.to_string()];
    let explanation = question.explanation.trim();
    if !explanation.is_empty() {
        parts.push(explanation.to_string());
    }
    parts.push(format!("Correct answer: {}.", question.correct_answer.trim()));

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::{parse_score, GradingOracle, ScoreRequest, TextScorer};
    use crate::domain::models::Question;
    use crate::domain::types::{QuestionKind, Section};

    struct FixedScorer(f64);

    #[async_trait]
    impl TextScorer for FixedScorer {
        async fn score(&self, _request: &ScoreRequest) -> anyhow::Result<f64> {
            Ok(self.0)
        }
    }

    struct FailingScorer;

    #[async_trait]
    impl TextScorer for FailingScorer {
        async fn score(&self, _request: &ScoreRequest) -> anyhow::Result<f64> {
            Err(anyhow!("connection refused"))
        }
    }

    fn mcq(marks: u32) -> Question {
        Question {
            id: "q1".to_string(),
            section: Section::Mcq,
            prompt: "Pick B".to_string(),
            kind: QuestionKind::Mcq,
            options: vec!["A".to_string(), "B".to_string()],
            correct_answer: "B".to_string(),
            marks,
            explanation: "B is the second letter.".to_string(),
            topic: None,
            diagram: None,
        }
    }

    fn text(marks: u32, correct: &str) -> Question {
        Question {
            id: "q2".to_string(),
            section: Section::ShortAnswer,
            prompt: "What is the capital of France?".to_string(),
            kind: QuestionKind::Text,
            options: Vec::new(),
            correct_answer: correct.to_string(),
            marks,
            explanation: String::new(),
            topic: None,
            diagram: None,
        }
    }

    #[tokio::test]
    async fn mcq_grading_is_deterministic_and_total() {
        let oracle = GradingOracle::heuristic_only();
        let question = mcq(3);

        assert_eq!(oracle.grade(&question, "B").await.score, 3);
        assert_eq!(oracle.grade(&question, "  b ").await.score, 3);
        assert_eq!(oracle.grade(&question, "A").await.score, 0);
        assert_eq!(oracle.grade(&question, "").await.score, 0);
    }

    #[tokio::test]
    async fn mcq_feedback_carries_label_explanation_and_answer() {
        let oracle = GradingOracle::heuristic_only();
        let question = mcq(1);

        let graded = oracle.grade(&question, "A").await;
        assert!(graded.feedback.starts_with("Incorrect."));
        assert!(graded.feedback.contains("B is the second letter."));
        assert!(graded.feedback.contains("Correct answer: B."));
    }

    #[tokio::test]
    async fn out_of_range_scorer_responses_are_clamped() {
        let question = text(5, "Paris");

        let oracle = GradingOracle::with_scorer(Arc::new(FixedScorer(999.0)));
        assert_eq!(oracle.grade(&question, "Paris").await.score, 5);

        let oracle = GradingOracle::with_scorer(Arc::new(FixedScorer(-5.0)));
        assert_eq!(oracle.grade(&question, "Paris").await.score, 0);

        let oracle = GradingOracle::with_scorer(Arc::new(FixedScorer(2.4)));
        assert_eq!(oracle.grade(&question, "Paris").await.score, 2);
    }

    #[tokio::test]
    async fn scorer_failure_falls_back_to_substring_match() {
        let oracle = GradingOracle::with_scorer(Arc::new(FailingScorer));
        let question = text(4, "Paris");

        let graded = oracle.grade(&question, "paris is the capital").await;
        assert_eq!(graded.score, 4);
    }

    #[tokio::test]
    async fn non_finite_scores_fall_back() {
        let oracle = GradingOracle::with_scorer(Arc::new(FixedScorer(f64::NAN)));
        let question = text(4, "Paris");

        assert_eq!(oracle.grade(&question, "Paris").await.score, 4);
    }

    #[tokio::test]
    async fn fallback_keyword_overlap_thresholds() {
        let oracle = GradingOracle::heuristic_only();
        // Five significant words: gravity, pulls, objects, toward, earth.
        let question = text(5, "gravity pulls objects toward earth");

        // 4/5 overlap >= 70% earns full marks.
        let graded = oracle.grade(&question, "gravity pulls objects toward the moon").await;
        assert_eq!(graded.score, 5);

        // 2/5 overlap >= 40% earns half marks rounded up.
        let graded = oracle.grade(&question, "magnetism moves objects via gravity").await;
        assert_eq!(graded.score, 3);

        // 1/5 overlap on a non-trivial answer earns the participation mark.
        let graded = oracle.grade(&question, "magnetism moves things because of gravity").await;
        assert_eq!(graded.score, 1);

        // A short unrelated answer earns nothing.
        assert_eq!(oracle.grade(&question, "no idea").await.score, 0);
        assert_eq!(oracle.grade(&question, "   ").await.score, 0);
    }

    #[test]
    fn parse_score_accepts_object_and_bare_number() {
        assert_eq!(parse_score("{\"score\": 3.5}"), Some(3.5));
        assert_eq!(parse_score("4"), Some(4.0));
        assert_eq!(parse_score("not json"), None);
        assert_eq!(parse_score("{\"grade\": 1}"), None);
    }
}
