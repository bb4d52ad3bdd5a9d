use std::sync::Arc;

use tracing::{debug, warn};

use super::model::Milestone;
use super::repository::ProgressStore;

/// Best-effort progress emitter used by the worker. Store failures are
/// logged and swallowed; they never change the outcome of a job.
#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<dyn ProgressStore>,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    pub async fn report(&self, correlation_id: &str, milestone: Milestone) {
        let percent = milestone.percent();
        match self.store.record(correlation_id, percent).await {
            Ok(stored) if stored > percent => {
                debug!(correlation_id, percent, stored, "Ignored out-of-order progress");
            }
            Ok(_) => debug!(correlation_id, percent, "Progress recorded"),
            Err(e) => warn!(correlation_id, percent, error = %e, "Failed to record progress"),
        }
    }

    pub async fn fail(&self, correlation_id: &str, message: &str) {
        if let Err(e) = self.store.fail(correlation_id, message).await {
            warn!(correlation_id, error = %e, "Failed to record job failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::progress::model::ProgressRecord;
    use crate::modules::progress::repository::{MemoryProgressStore, ProgressError};
    use async_trait::async_trait;
    use std::time::Duration;

    struct BrokenStore;

    #[async_trait]
    impl ProgressStore for BrokenStore {
        async fn record(&self, _: &str, _: u8) -> Result<u8, ProgressError> {
            Err(ProgressError::Backend("connection refused".to_string()))
        }

        async fn fail(&self, _: &str, _: &str) -> Result<(), ProgressError> {
            Err(ProgressError::Backend("connection refused".to_string()))
        }

        async fn status(&self, _: &str) -> Result<Option<ProgressRecord>, ProgressError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn store_errors_are_swallowed() {
        let reporter = ProgressReporter::new(Arc::new(BrokenStore));
        reporter.report("cid", Milestone::Started).await;
        reporter.fail("cid", "boom").await;
    }

    #[tokio::test]
    async fn milestones_map_to_fixed_percentages() {
        let store = Arc::new(MemoryProgressStore::new(Duration::from_secs(60)));
        let reporter = ProgressReporter::new(store.clone());

        reporter.report("cid", Milestone::Started).await;
        assert_eq!(store.status("cid").await.unwrap().unwrap().percent, 15);
        reporter.report("cid", Milestone::Fetched).await;
        assert_eq!(store.status("cid").await.unwrap().unwrap().percent, 80);
        reporter.report("cid", Milestone::Finished).await;
        assert_eq!(store.status("cid").await.unwrap().unwrap().percent, 100);
    }
}
