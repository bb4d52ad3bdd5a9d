//! Test doubles for the pipeline collaborators.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Barrier;

use podcast_ingest::infrastructure::origin::{FetchError, OriginFetcher, RawItem};
use podcast_ingest::infrastructure::queue::MemoryQueue;
use podcast_ingest::modules::podcast::model::{Item, ItemKind};
use podcast_ingest::modules::podcast::repository::{ItemStore, StoreError};
use podcast_ingest::modules::podcast::service::IngestionCoordinator;
use podcast_ingest::modules::progress::model::ProgressRecord;
use podcast_ingest::modules::progress::repository::{
    MemoryProgressStore, ProgressError, ProgressStore,
};
use podcast_ingest::modules::progress::reporter::ProgressReporter;
use podcast_ingest::state::AppState;
use podcast_ingest::workers::ingestion::{IngestionWorker, JobReport, WorkerSettings};

/// Item store with the same uniqueness rule as the catalog tables.
#[derive(Default)]
pub struct MemoryItemStore {
    items: Mutex<HashMap<(ItemKind, String), Item>>,
    lookups: AtomicUsize,
    creates: AtomicUsize,
    duplicates: AtomicUsize,
    fail_lookups: AtomicBool,
    fail_creates: AtomicBool,
    race: Option<Arc<Barrier>>,
    race_remaining: AtomicUsize,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `parties` lookups read the store and then wait for each
    /// other, so concurrent jobs all miss.
    pub fn with_race(parties: usize) -> Self {
        Self {
            race: Some(Arc::new(Barrier::new(parties))),
            race_remaining: AtomicUsize::new(parties),
            ..Self::default()
        }
    }

    pub fn seed(&self, item: Item) {
        let key = (item.kind(), item.origin_id().to_string());
        self.items.lock().unwrap().insert(key, item);
    }

    pub fn get(&self, kind: ItemKind, origin_id: &str) -> Option<Item> {
        self.items
            .lock()
            .unwrap()
            .get(&(kind, origin_id.to_string()))
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates.load(Ordering::SeqCst)
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn find_by_origin_id(
        &self,
        kind: ItemKind,
        origin_id: &str,
    ) -> Result<Option<Item>, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::Io("connection reset".to_string()));
        }

        // Read first, then wait: every racer must observe the empty store.
        let found = self.get(kind, origin_id);
        if let Some(race) = &self.race {
            let joined = self
                .race_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if joined {
                race.wait().await;
            }
        }

        Ok(found)
    }

    async fn find_many(&self, kind: ItemKind, origin_ids: &[String]) -> Result<Vec<Item>, StoreError> {
        let items = self.items.lock().unwrap();
        Ok(origin_ids
            .iter()
            .filter_map(|id| items.get(&(kind, id.clone())).cloned())
            .collect())
    }

    async fn create(&self, item: &Item) -> Result<Item, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Io("disk full".to_string()));
        }

        let mut items = self.items.lock().unwrap();
        let key = (item.kind(), item.origin_id().to_string());
        if items.contains_key(&key) {
            self.duplicates.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::DuplicateKey);
        }
        items.insert(key, item.clone());
        Ok(item.clone())
    }
}

#[derive(Clone)]
pub enum StubResponse {
    Found(Value),
    NotFound,
    Transient,
}

/// Origin double answering from a script per origin id. Unknown ids are
/// not found. The last scripted answer repeats.
#[derive(Default)]
pub struct StubFetcher {
    scripts: Mutex<HashMap<String, VecDeque<StubResponse>>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, origin_id: &str, responses: Vec<StubResponse>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(origin_id.to_string(), responses.into());
        self
    }

    pub fn found(self, origin_id: &str, payload: Value) -> Self {
        self.script(origin_id, vec![StubResponse::Found(payload)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OriginFetcher for StubFetcher {
    async fn fetch(
        &self,
        kind: ItemKind,
        origin_id: &str,
        market: &str,
    ) -> Result<RawItem, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let response = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(origin_id) {
                Some(script) if script.len() > 1 => script.pop_front(),
                Some(script) => script.front().cloned(),
                None => None,
            }
        };

        match response {
            Some(StubResponse::Found(payload)) => Ok(RawItem {
                kind,
                origin_id: origin_id.to_string(),
                market: market.to_string(),
                payload,
            }),
            Some(StubResponse::Transient) => Err(FetchError::Transient("503 from origin".to_string())),
            Some(StubResponse::NotFound) | None => Err(FetchError::NotFound {
                kind,
                origin_id: origin_id.to_string(),
            }),
        }
    }
}

/// Progress store that remembers every percent it was asked to record.
pub struct RecordingProgress {
    inner: MemoryProgressStore,
    history: Mutex<Vec<(String, u8)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self {
            inner: MemoryProgressStore::new(Duration::from_secs(3600)),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn history(&self, correlation_id: &str) -> Vec<u8> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(cid, _)| cid == correlation_id)
            .map(|(_, percent)| *percent)
            .collect()
    }
}

#[async_trait]
impl ProgressStore for RecordingProgress {
    async fn record(&self, correlation_id: &str, percent: u8) -> Result<u8, ProgressError> {
        self.history
            .lock()
            .unwrap()
            .push((correlation_id.to_string(), percent));
        self.inner.record(correlation_id, percent).await
    }

    async fn fail(&self, correlation_id: &str, message: &str) -> Result<(), ProgressError> {
        self.inner.fail(correlation_id, message).await
    }

    async fn status(&self, correlation_id: &str) -> Result<Option<ProgressRecord>, ProgressError> {
        self.inner.status(correlation_id).await
    }
}

pub fn episode_payload(origin_id: &str, name: &str) -> Value {
    json!({
        "id": origin_id,
        "name": name,
        "description": "An episode about pollinators.",
        "release_date": "2022-09-07",
        "duration_ms": 643000,
        "explicit": false,
        "language": "en",
        "images": [{"url": "https://i.scdn.co/image/ab6765630000ba8a"}],
        "external_urls": {"spotify": format!("https://open.spotify.com/episode/{}", origin_id)},
        "show": {"name": "Short Wave", "publisher": "NPR"}
    })
}

pub fn show_payload(origin_id: &str, name: &str) -> Value {
    json!({
        "id": origin_id,
        "name": name,
        "publisher": "Bailingguo News",
        "total_episodes": 812,
        "media_type": "audio",
        "languages": ["zh-TW"],
        "external_urls": {"spotify": format!("https://open.spotify.com/show/{}", origin_id)}
    })
}

pub const POLL: Duration = Duration::from_millis(50);

/// One pipeline wired over in-memory collaborators.
pub struct Harness {
    pub store: Arc<MemoryItemStore>,
    pub fetcher: Arc<StubFetcher>,
    pub queue: Arc<MemoryQueue>,
    pub progress: Arc<RecordingProgress>,
    pub coordinator: IngestionCoordinator,
    pub worker: Arc<IngestionWorker>,
}

impl Harness {
    pub fn new(store: MemoryItemStore, fetcher: StubFetcher) -> Self {
        Self::with_visibility(store, fetcher, Duration::from_secs(30))
    }

    pub fn with_visibility(store: MemoryItemStore, fetcher: StubFetcher, visibility: Duration) -> Self {
        let store = Arc::new(store);
        let fetcher = Arc::new(fetcher);
        let queue = Arc::new(MemoryQueue::new(visibility));
        let progress = Arc::new(RecordingProgress::new());

        let coordinator = IngestionCoordinator::new(store.clone(), queue.clone(), "TW".to_string());
        let worker = Arc::new(IngestionWorker::new(
            store.clone(),
            fetcher.clone(),
            queue.clone(),
            ProgressReporter::new(progress.clone()),
            WorkerSettings {
                idle_timeout: POLL,
                concurrency: 2,
            },
        ));

        Self {
            store,
            fetcher,
            queue,
            progress,
            coordinator,
            worker,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.store.clone(),
            self.queue.clone(),
            self.progress.clone(),
            "TW".to_string(),
        )
    }

    /// Handles messages until the queue stays idle for one poll.
    pub async fn drain(&self) -> Vec<JobReport> {
        let mut reports = Vec::new();
        while let Some(report) = self.worker.run_once(POLL).await.expect("poll") {
            reports.push(report);
        }
        reports
    }
}
