use serde::Serialize;

use crate::domain::models::{SavedResult, SubjectStats};

#[derive(Debug, Serialize)]
pub(crate) struct HistoryResponse {
    pub(crate) items: Vec<SavedResult>,
    pub(crate) total_count: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubjectStatsResponse {
    pub(crate) items: Vec<SubjectStats>,
}
