use std::collections::HashMap;

use rand::Rng;
use thiserror::Error;

use crate::domain::models::{Exam, ExamInstance, ExamResult};
use crate::domain::types::SessionPhase;
use crate::services::instance::build_instance;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum SessionError {
    #[error("operation not allowed while the session is {phase}")]
    InvalidPhase { phase: &'static str },
    #[error("the current question must be answered first")]
    AnswerRequired,
    #[error("unknown question: {question_id}")]
    UnknownQuestion { question_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// The countdown is no longer active; the tick was a no-op.
    Idle,
    Running,
    /// Remaining time reached zero on this tick. The phase has already moved
    /// to `Grading`, so at most one `Expired` is ever observed per instance.
    Expired,
}

/// Everything the grading pipeline needs, snapshotted at submission time.
#[derive(Debug, Clone)]
pub(crate) struct GradingJob {
    pub(crate) instance: ExamInstance,
    pub(crate) answers: HashMap<String, String>,
    pub(crate) time_taken_seconds: u64,
}

/// State machine for one in-progress exam attempt.
///
/// Every transition is a method on this struct; the owning service holds it
/// behind a lock and drives `tick` from the timer task. The machine itself
/// never performs IO.
#[derive(Debug)]
pub(crate) struct ExamSession {
    instance: ExamInstance,
    answers: HashMap<String, String>,
    current: usize,
    duration_seconds: u64,
    remaining_seconds: u64,
    phase: SessionPhase,
    result: Option<ExamResult>,
}

impl ExamSession {
    /// Builds a fresh instance from the template and enters `InProgress`
    /// with a full clock and an empty answer set.
    pub(crate) fn start<R: Rng + ?Sized>(template: &Exam, rng: &mut R) -> Self {
        let duration_seconds = template.duration_seconds();
        Self {
            instance: build_instance(template, rng),
            answers: HashMap::new(),
            current: 0,
            duration_seconds,
            remaining_seconds: duration_seconds,
            phase: SessionPhase::InProgress,
            result: None,
        }
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub(crate) fn instance(&self) -> &ExamInstance {
        &self.instance
    }

    pub(crate) fn answers(&self) -> &HashMap<String, String> {
        &self.answers
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current
    }

    pub(crate) fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub(crate) fn result(&self) -> Option<&ExamResult> {
        self.result.as_ref()
    }

    /// One-second countdown step. Requesting submission does not stop the
    /// clock, so the countdown runs through the confirmation step too.
    /// Timeout behaves as a confirmed submit, bypassing confirmation; the
    /// phase change here is what guarantees exactly one auto-submit per
    /// instance.
    pub(crate) fn tick(&mut self) -> TickOutcome {
        if !matches!(self.phase, SessionPhase::InProgress | SessionPhase::ConfirmingSubmit) {
            return TickOutcome::Idle;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = SessionPhase::Grading;
            return TickOutcome::Expired;
        }

        TickOutcome::Running
    }

    /// Upserts the answer for a question; last write wins.
    pub(crate) fn record_answer(
        &mut self,
        question_id: &str,
        value: String,
    ) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::InProgress)?;

        if !self.instance.questions().iter().any(|question| question.id == question_id) {
            return Err(SessionError::UnknownQuestion { question_id: question_id.to_string() });
        }

        self.answers.insert(question_id.to_string(), value);
        Ok(())
    }

    /// Moves the current-question pointer by `delta`, clamped to the question
    /// range. Forward motion is gated on the displayed question having a
    /// non-empty answer; moving back is never gated.
    pub(crate) fn navigate(&mut self, delta: i64) -> Result<usize, SessionError> {
        self.require_phase(SessionPhase::InProgress)?;

        if delta > 0 && !self.current_answered() {
            return Err(SessionError::AnswerRequired);
        }

        let last = self.instance.questions().len().saturating_sub(1);
        let target = self.current as i64 + delta;
        self.current = target.clamp(0, last as i64) as usize;
        Ok(self.current)
    }

    /// Shows the submission confirmation step; the timer keeps running.
    pub(crate) fn request_submit(&mut self) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::InProgress)?;

        if !self.current_answered() {
            return Err(SessionError::AnswerRequired);
        }

        self.phase = SessionPhase::ConfirmingSubmit;
        Ok(())
    }

    pub(crate) fn cancel_submit(&mut self) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::ConfirmingSubmit)?;
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    /// Confirms the pending submission and enters `Grading`. The phase guard
    /// makes submission idempotent per attempt: a second confirm (or a
    /// confirm racing the timeout) fails instead of double-grading.
    pub(crate) fn confirm_submit(&mut self) -> Result<GradingJob, SessionError> {
        self.require_phase(SessionPhase::ConfirmingSubmit)?;
        self.phase = SessionPhase::Grading;
        Ok(self.grading_job())
    }

    /// Submission snapshot; valid once the session is in `Grading`.
    pub(crate) fn grading_job(&self) -> GradingJob {
        GradingJob {
            instance: self.instance.clone(),
            answers: self.answers.clone(),
            time_taken_seconds: self.duration_seconds - self.remaining_seconds,
        }
    }

    pub(crate) fn complete(&mut self, result: ExamResult) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::Grading)?;
        self.phase = SessionPhase::Completed;
        self.result = Some(result);
        Ok(())
    }

    /// Abandons the attempt. Only the owner may discard the session (and its
    /// answer set) afterwards; no result is produced or persisted.
    pub(crate) fn exit(&mut self) -> Result<(), SessionError> {
        self.require_phase(SessionPhase::InProgress)?;
        Ok(())
    }

    fn current_answered(&self) -> bool {
        self.instance
            .questions()
            .get(self.current)
            .and_then(|question| self.answers.get(&question.id))
            .map(|answer| !answer.trim().is_empty())
            .unwrap_or(false)
    }

    fn require_phase(&self, phase: SessionPhase) -> Result<(), SessionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SessionError::InvalidPhase { phase: self.phase.as_str() })
        }
    }
}
