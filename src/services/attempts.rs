use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::time::sleep;
use uuid::Uuid;

use crate::core::time::now_rfc3339;
use crate::domain::models::{Exam, ExamInstance, ExamResult, SavedResult};
use crate::domain::types::SessionPhase;
use crate::repositories::results::ResultStore;
use crate::services::oracle::GradingOracle;
use crate::services::pipeline;
use crate::services::session::{ExamSession, GradingJob, SessionError, TickOutcome};

#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("attempt not found")]
    NotFound,
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone)]
pub(crate) struct AttemptSnapshot {
    pub(crate) phase: SessionPhase,
    pub(crate) current_index: usize,
    pub(crate) remaining_seconds: u64,
    pub(crate) answers: HashMap<String, String>,
    pub(crate) grading_progress: u8,
}

#[derive(Debug)]
pub(crate) enum ResultState {
    /// Grading is still running; carries the last reported progress percent.
    Pending(u8),
    Ready(Box<ExamResult>),
}

struct Attempt {
    session: Mutex<ExamSession>,
    grading_progress: AtomicU8,
    timer_shutdown: watch::Sender<bool>,
}

/// Owns every live attempt: the session behind a lock, the per-attempt
/// one-second ticker, the spawned grading run, and the fire-and-forget
/// persistence of completed results. One logical actor mutates each session;
/// the ticker is the only asynchronous source of mutation outside direct
/// user actions and is cancelled whenever the session leaves `InProgress`.
#[derive(Clone)]
pub(crate) struct AttemptService {
    inner: Arc<AttemptsInner>,
}

struct AttemptsInner {
    attempts: RwLock<HashMap<Uuid, Arc<Attempt>>>,
    oracle: GradingOracle,
    results: Arc<dyn ResultStore>,
    oracle_delay: Duration,
}

impl AttemptService {
    pub(crate) fn new(
        oracle: GradingOracle,
        results: Arc<dyn ResultStore>,
        oracle_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(AttemptsInner {
                attempts: RwLock::new(HashMap::new()),
                oracle,
                results,
                oracle_delay,
            }),
        }
    }

    /// Starts a fresh attempt for the template and spawns its ticker.
    pub(crate) async fn start(&self, template: &Exam) -> Uuid {
        let session = ExamSession::start(template, &mut rand::thread_rng());
        let (timer_shutdown, timer_signal) = watch::channel(false);
        let attempt = Arc::new(Attempt {
            session: Mutex::new(session),
            grading_progress: AtomicU8::new(0),
            timer_shutdown,
        });

        let id = Uuid::new_v4();
        self.inner.attempts.write().await.insert(id, attempt);
        self.spawn_timer(id, timer_signal);

        tracing::info!(attempt_id = %id, exam_id = %template.id, "Attempt started");
        id
    }

    pub(crate) async fn snapshot(&self, id: Uuid) -> Option<AttemptSnapshot> {
        let attempt = self.attempt(id).await?;
        let session = attempt.session.lock().await;

        Some(AttemptSnapshot {
            phase: session.phase(),
            current_index: session.current_index(),
            remaining_seconds: session.remaining_seconds(),
            answers: session.answers().clone(),
            grading_progress: attempt.grading_progress.load(Ordering::Relaxed),
        })
    }

    pub(crate) async fn instance(&self, id: Uuid) -> Option<ExamInstance> {
        let attempt = self.attempt(id).await?;
        let session = attempt.session.lock().await;
        Some(session.instance().clone())
    }

    pub(crate) async fn record_answer(
        &self,
        id: Uuid,
        question_id: &str,
        value: String,
    ) -> Result<(), AttemptError> {
        let attempt = self.attempt(id).await.ok_or(AttemptError::NotFound)?;
        attempt.session.lock().await.record_answer(question_id, value)?;
        Ok(())
    }

    pub(crate) async fn navigate(&self, id: Uuid, delta: i64) -> Result<usize, AttemptError> {
        let attempt = self.attempt(id).await.ok_or(AttemptError::NotFound)?;
        let result = attempt.session.lock().await.navigate(delta)?;
        Ok(result)
    }

    pub(crate) async fn request_submit(&self, id: Uuid) -> Result<(), AttemptError> {
        let attempt = self.attempt(id).await.ok_or(AttemptError::NotFound)?;
        attempt.session.lock().await.request_submit()?;
        Ok(())
    }

    pub(crate) async fn cancel_submit(&self, id: Uuid) -> Result<(), AttemptError> {
        let attempt = self.attempt(id).await.ok_or(AttemptError::NotFound)?;
        attempt.session.lock().await.cancel_submit()?;
        Ok(())
    }

    /// Confirms the submission, stops the ticker and starts the grading run.
    pub(crate) async fn confirm_submit(&self, id: Uuid) -> Result<(), AttemptError> {
        let attempt = self.attempt(id).await.ok_or(AttemptError::NotFound)?;
        let job = { attempt.session.lock().await.confirm_submit()? };

        let _ = attempt.timer_shutdown.send(true);
        self.spawn_grading(id, job);
        Ok(())
    }

    /// Abandons an in-progress attempt. The session and answer set are
    /// discarded and the persistence collaborator is never called.
    pub(crate) async fn exit(&self, id: Uuid) -> Result<(), AttemptError> {
        let attempt = self.attempt(id).await.ok_or(AttemptError::NotFound)?;
        attempt.session.lock().await.exit()?;

        let _ = attempt.timer_shutdown.send(true);
        self.inner.attempts.write().await.remove(&id);
        tracing::info!(attempt_id = %id, "Attempt abandoned");
        Ok(())
    }

    pub(crate) async fn result(&self, id: Uuid) -> Result<ResultState, AttemptError> {
        let attempt = self.attempt(id).await.ok_or(AttemptError::NotFound)?;
        let session = attempt.session.lock().await;

        match session.phase() {
            SessionPhase::Completed => {
                let result = session.result().cloned().ok_or(AttemptError::NotFound)?;
                Ok(ResultState::Ready(Box::new(result)))
            }
            SessionPhase::Grading => {
                Ok(ResultState::Pending(attempt.grading_progress.load(Ordering::Relaxed)))
            }
            phase => Err(SessionError::InvalidPhase { phase: phase.as_str() }.into()),
        }
    }

    async fn attempt(&self, id: Uuid) -> Option<Arc<Attempt>> {
        self.inner.attempts.read().await.get(&id).cloned()
    }

    fn spawn_timer(&self, id: Uuid, mut shutdown: watch::Receiver<bool>) {
        let service = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = sleep(Duration::from_secs(1)) => {}
                }

                let Some(attempt) = service.attempt(id).await else { break };
                let outcome = { attempt.session.lock().await.tick() };

                match outcome {
                    TickOutcome::Running => {}
                    TickOutcome::Idle => break,
                    TickOutcome::Expired => {
                        tracing::info!(attempt_id = %id, "Exam time expired; auto-submitting");
                        let job = { attempt.session.lock().await.grading_job() };
                        service.spawn_grading(id, job);
                        break;
                    }
                }
            }
        });
    }

    fn spawn_grading(&self, id: Uuid, job: GradingJob) {
        let service = self.clone();
        tokio::spawn(async move {
            service.run_grading(id, job).await;
        });
    }

    async fn run_grading(&self, id: Uuid, job: GradingJob) {
        let Some(attempt) = self.attempt(id).await else { return };

        let result = pipeline::grade_all(&self.inner.oracle, &job, self.inner.oracle_delay, {
            let attempt = attempt.clone();
            move |percent| attempt.grading_progress.store(percent, Ordering::Relaxed)
        })
        .await;

        {
            let mut session = attempt.session.lock().await;
            if let Err(err) = session.complete(result.clone()) {
                tracing::error!(attempt_id = %id, error = %err, "Failed to complete graded attempt");
                return;
            }
        }

        self.persist(&result);
    }

    /// Persistence is fire-and-forget: `Completed` has already been reached
    /// and the result shown to the student does not depend on this outcome.
    fn persist(&self, result: &ExamResult) {
        let store = self.inner.results.clone();
        let record = SavedResult {
            exam_id: result.exam_id.clone(),
            subject: result.subject_key.clone(),
            year: result.year,
            score: result.total_score,
            max_score: result.max_score,
            grade: result.grade,
            date: now_rfc3339(),
        };

        tokio::spawn(async move {
            if let Err(err) = store.save(record).await {
                tracing::warn!(error = %err, "Failed to persist exam result; continuing");
            }
        });
    }
}
