use std::sync::Arc;

use crate::core::config::Settings;
use crate::repositories::exam_bank::ExamBank;
use crate::repositories::results::ResultStore;
use crate::services::attempts::AttemptService;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    bank: ExamBank,
    results: Arc<dyn ResultStore>,
    attempts: AttemptService,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        bank: ExamBank,
        results: Arc<dyn ResultStore>,
        attempts: AttemptService,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, bank, results, attempts }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn bank(&self) -> &ExamBank {
        &self.inner.bank
    }

    pub(crate) fn results(&self) -> &Arc<dyn ResultStore> {
        &self.inner.results
    }

    pub(crate) fn attempts(&self) -> &AttemptService {
        &self.inner.attempts
    }
}
