use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError};
use tokio::sync::RwLock;

use crate::domain::models::{SavedResult, SubjectStats};

const HISTORY_KEY: &str = "examprep:results";

/// Persistence collaborator for completed exam results. Saving is
/// fire-and-forget from the session's perspective: callers log failures and
/// the user-visible grading flow never depends on the outcome.
#[async_trait]
pub(crate) trait ResultStore: Send + Sync {
    async fn save(&self, result: SavedResult) -> anyhow::Result<()>;
    /// Saved results, newest first.
    async fn history(&self) -> anyhow::Result<Vec<SavedResult>>;
    async fn subject_stats(&self) -> anyhow::Result<Vec<SubjectStats>>;
    async fn health(&self) -> StoreHealth;
}

#[derive(Debug, Clone)]
pub(crate) enum StoreHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

/// Redis-backed result store. The handle starts disconnected and degrades
/// gracefully: operations against a disconnected store fail with an error
/// the caller can log without aborting anything user-visible.
#[derive(Clone)]
pub(crate) struct RedisResultStore {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

impl RedisResultStore {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        let mut guard = self.manager.write().await;
        *guard = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        let mut guard = self.manager.write().await;
        *guard = None;
    }

    async fn connection(&self) -> anyhow::Result<ConnectionManager> {
        let manager = { self.manager.read().await.clone() };
        manager.ok_or_else(|| anyhow::anyhow!("result store is not connected"))
    }
}

#[async_trait]
impl ResultStore for RedisResultStore {
    async fn save(&self, result: SavedResult) -> anyhow::Result<()> {
        let mut manager = self.connection().await?;
        let payload = serde_json::to_string(&result)?;
        cmd("LPUSH").arg(HISTORY_KEY).arg(payload).query_async::<_, ()>(&mut manager).await?;
        Ok(())
    }

    async fn history(&self) -> anyhow::Result<Vec<SavedResult>> {
        let mut manager = self.connection().await?;
        let raw: Vec<String> =
            cmd("LRANGE").arg(HISTORY_KEY).arg(0).arg(-1).query_async(&mut manager).await?;

        let mut results = Vec::with_capacity(raw.len());
        for entry in raw {
            match serde_json::from_str::<SavedResult>(&entry) {
                Ok(result) => results.push(result),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping malformed result history entry");
                }
            }
        }

        Ok(results)
    }

    async fn subject_stats(&self) -> anyhow::Result<Vec<SubjectStats>> {
        Ok(compute_subject_stats(&self.history().await?))
    }

    async fn health(&self) -> StoreHealth {
        let manager = { self.manager.read().await.clone() };
        let Some(mut manager) = manager else {
            return StoreHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => StoreHealth::Healthy,
            Err(err) => StoreHealth::Unhealthy(err.to_string()),
        }
    }
}

/// Per-subject average percentage and attempt count, folded from history.
pub(crate) fn compute_subject_stats(history: &[SavedResult]) -> Vec<SubjectStats> {
    let mut buckets: HashMap<&str, (f64, u64)> = HashMap::new();

    for result in history {
        if result.max_score == 0 {
            continue;
        }
        let percentage = f64::from(result.score) / f64::from(result.max_score) * 100.0;
        let bucket = buckets.entry(result.subject.as_str()).or_insert((0.0, 0));
        bucket.0 += percentage;
        bucket.1 += 1;
    }

    let mut stats: Vec<SubjectStats> = buckets
        .into_iter()
        .map(|(subject, (sum, attempts))| SubjectStats {
            subject: subject.to_string(),
            average: sum / attempts as f64,
            attempts,
        })
        .collect();

    stats.sort_by(|a, b| a.subject.cmp(&b.subject));
    stats
}

/// In-memory store recording every save; used as the persistence
/// collaborator in tests.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryResultStore {
    saved: tokio::sync::Mutex<Vec<SavedResult>>,
}

#[cfg(test)]
impl MemoryResultStore {
    pub(crate) async fn saved(&self) -> Vec<SavedResult> {
        self.saved.lock().await.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn save(&self, result: SavedResult) -> anyhow::Result<()> {
        self.saved.lock().await.push(result);
        Ok(())
    }

    async fn history(&self) -> anyhow::Result<Vec<SavedResult>> {
        let mut results = self.saved.lock().await.clone();
        results.reverse();
        Ok(results)
    }

    async fn subject_stats(&self) -> anyhow::Result<Vec<SubjectStats>> {
        Ok(compute_subject_stats(&self.history().await?))
    }

    async fn health(&self) -> StoreHealth {
        StoreHealth::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::{compute_subject_stats, MemoryResultStore, ResultStore};
    use crate::domain::models::SavedResult;
    use crate::domain::types::GradeLetter;

    fn saved(subject: &str, score: u32, max_score: u32) -> SavedResult {
        SavedResult {
            exam_id: format!("{subject}-2024"),
            subject: subject.to_string(),
            year: 2024,
            score,
            max_score,
            grade: GradeLetter::from_percentage(f64::from(score) / f64::from(max_score) * 100.0),
            date: "2024-06-01T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn subject_stats_average_per_subject() {
        let history = vec![
            saved("mathematics", 8, 10),
            saved("mathematics", 6, 10),
            saved("physics", 5, 10),
        ];

        let stats = compute_subject_stats(&history);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].subject, "mathematics");
        assert_eq!(stats[0].attempts, 2);
        assert!((stats[0].average - 70.0).abs() < f64::EPSILON);
        assert_eq!(stats[1].subject, "physics");
        assert_eq!(stats[1].attempts, 1);
        assert!((stats[1].average - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn subject_stats_skip_zero_max_scores() {
        let stats = compute_subject_stats(&[saved("empty", 0, 0)]);
        assert!(stats.is_empty());
    }

    #[tokio::test]
    async fn memory_store_returns_history_newest_first() {
        let store = MemoryResultStore::default();
        store.save(saved("mathematics", 8, 10)).await.expect("save");
        store.save(saved("physics", 5, 10)).await.expect("save");

        let history = store.history().await.expect("history");
        assert_eq!(history[0].subject, "physics");
        assert_eq!(history[1].subject, "mathematics");
    }
}
