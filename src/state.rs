use std::sync::Arc;

use crate::infrastructure::queue::JobQueue;
use crate::modules::podcast::repository::ItemStore;
use crate::modules::podcast::service::IngestionCoordinator;
use crate::modules::progress::repository::ProgressStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub coordinator: IngestionCoordinator,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ItemStore>,
        queue: Arc<dyn JobQueue>,
        progress: Arc<dyn ProgressStore>,
        default_market: String,
    ) -> Self {
        let coordinator = IngestionCoordinator::new(store.clone(), queue, default_market);
        Self {
            store,
            progress,
            coordinator,
        }
    }
}
