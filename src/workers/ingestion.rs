use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::settings::AppConfig;
use crate::error::IngestError;
use crate::infrastructure::origin::OriginFetcher;
use crate::infrastructure::queue::{JobQueue, QueueError, QueueMessage};
use crate::modules::podcast::events::IngestionJob;
use crate::modules::podcast::mapper::map_raw;
use crate::modules::podcast::model::Item;
use crate::modules::podcast::repository::{ItemStore, StoreError};
use crate::modules::progress::model::Milestone;
use crate::modules::progress::reporter::ProgressReporter;

/// Steps one job walks through. `Failed` can follow any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    Lookup,
    Cached,
    Fetching,
    Mapping,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Received => "received",
            JobState::Lookup => "lookup",
            JobState::Cached => "cached",
            JobState::Fetching => "fetching",
            JobState::Mapping => "mapping",
            JobState::Persisting => "persisting",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What happens to the queue message once the job has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    /// Leave it for redelivery after the visibility window.
    Abandon,
    DeadLetter,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Disposition::Ack => "ack",
            Disposition::Abandon => "abandon",
            Disposition::DeadLetter => "dead_letter",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct JobReport {
    /// `None` when the payload could not be decoded.
    pub correlation_id: Option<String>,
    pub trail: Vec<JobState>,
    pub disposition: Disposition,
    pub item: Option<Item>,
    pub error: Option<String>,
}

impl JobReport {
    pub fn final_state(&self) -> JobState {
        self.trail.last().copied().unwrap_or(JobState::Received)
    }

    pub fn is_done(&self) -> bool {
        self.final_state() == JobState::Done
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub idle_timeout: Duration,
    pub concurrency: usize,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            concurrency: config.worker_concurrency.max(1),
        }
    }
}

/// Consumer half of the pipeline: fetches from the origin, maps and
/// persists. Safe to run many copies against the same queue and store.
pub struct IngestionWorker {
    store: Arc<dyn ItemStore>,
    fetcher: Arc<dyn OriginFetcher>,
    queue: Arc<dyn JobQueue>,
    progress: ProgressReporter,
    settings: WorkerSettings,
}

impl IngestionWorker {
    pub fn new(
        store: Arc<dyn ItemStore>,
        fetcher: Arc<dyn OriginFetcher>,
        queue: Arc<dyn JobQueue>,
        progress: ProgressReporter,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            fetcher,
            queue,
            progress,
            settings,
        }
    }

    /// Runs `concurrency` polling loops until `shutdown` fires. A job that
    /// is already running is finished before its loop exits.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(
            concurrency = self.settings.concurrency,
            idle_timeout_secs = self.settings.idle_timeout.as_secs(),
            "🎧 Ingestion worker starting"
        );

        let mut loops = JoinSet::new();
        for slot in 0..self.settings.concurrency {
            let worker = Arc::clone(&self);
            let shutdown = shutdown.clone();
            loops.spawn(async move { worker.poll_loop(slot, shutdown).await });
        }

        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Worker loop panicked");
            }
        }
        info!("Ingestion worker stopped");
    }

    async fn poll_loop(&self, slot: usize, shutdown: CancellationToken) {
        debug!(slot, "Polling loop started");
        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = self.queue.poll(self.settings.idle_timeout) => polled,
            };

            match polled {
                Ok(Some(message)) => {
                    self.handle(&message).await;
                }
                Ok(None) => continue,
                Err(e) => {
                    error!(slot, error = %e, "Queue poll failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }
        debug!(slot, "Polling loop stopped");
    }

    /// Polls once and handles what it gets. `Ok(None)` when the queue
    /// stayed empty for `idle_timeout`.
    pub async fn run_once(&self, idle_timeout: Duration) -> Result<Option<JobReport>, QueueError> {
        match self.queue.poll(idle_timeout).await? {
            Some(message) => Ok(Some(self.handle(&message).await)),
            None => Ok(None),
        }
    }

    /// Processes one leased message and settles it with the queue.
    pub async fn handle(&self, message: &QueueMessage) -> JobReport {
        if message.redelivered {
            debug!(message_id = %message.id, "Handling a redelivered message");
        }

        let report = self.process(&message.body).await;
        let cid = report.correlation_id.as_deref().unwrap_or("-");

        let settled = match report.disposition {
            Disposition::Ack => self.queue.ack(message).await,
            Disposition::Abandon => self.queue.abandon(message).await,
            Disposition::DeadLetter => self.queue.dead_letter(message).await,
        };
        if let Err(e) = settled {
            error!(
                correlation_id = cid,
                message_id = %message.id,
                disposition = %report.disposition,
                error = %e,
                "Failed to settle message"
            );
        }

        match &report.error {
            None => info!(
                correlation_id = cid,
                state = %report.final_state(),
                disposition = %report.disposition,
                "✅ Job handled"
            ),
            Some(e) => warn!(
                correlation_id = cid,
                state = %report.final_state(),
                disposition = %report.disposition,
                error = %e,
                "❌ Job failed"
            ),
        }
        report
    }

    /// Runs one job without touching the queue.
    pub async fn process(&self, body: &[u8]) -> JobReport {
        let mut trail = vec![JobState::Received];

        let job = match IngestionJob::decode(body) {
            Ok(job) => job,
            Err(e) => {
                trail.push(JobState::Failed);
                return JobReport {
                    correlation_id: None,
                    trail,
                    disposition: Disposition::DeadLetter,
                    item: None,
                    error: Some(IngestError::MalformedRequest(e).to_string()),
                };
            }
        };

        let cid = job.correlation_id.clone();
        self.progress.report(&cid, Milestone::Started).await;

        match self.execute(&job, &mut trail).await {
            Ok(item) => {
                self.progress.report(&cid, Milestone::Finished).await;
                trail.push(JobState::Done);
                JobReport {
                    correlation_id: Some(cid),
                    trail,
                    disposition: Disposition::Ack,
                    item: Some(item),
                    error: None,
                }
            }
            Err(e) => {
                trail.push(JobState::Failed);
                let disposition = if e.is_permanent() {
                    self.progress.fail(&cid, &e.to_string()).await;
                    Disposition::Ack
                } else {
                    Disposition::Abandon
                };
                JobReport {
                    correlation_id: Some(cid),
                    trail,
                    disposition,
                    item: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn execute(&self, job: &IngestionJob, trail: &mut Vec<JobState>) -> Result<Item, IngestError> {
        let cid = job.correlation_id.as_str();

        trail.push(JobState::Lookup);
        if let Some(existing) = self.store.find_by_origin_id(job.kind, &job.origin_id).await? {
            debug!(correlation_id = cid, origin_id = %job.origin_id, "Already stored");
            trail.push(JobState::Cached);
            return Ok(existing);
        }

        trail.push(JobState::Fetching);
        let raw = self
            .fetcher
            .fetch(job.kind, &job.origin_id, &job.market)
            .await?;
        self.progress.report(cid, Milestone::Fetched).await;

        trail.push(JobState::Mapping);
        let item = map_raw(&raw)?;

        trail.push(JobState::Persisting);
        match self.store.create(&item).await {
            Ok(stored) => Ok(stored),
            Err(StoreError::DuplicateKey) => {
                info!(correlation_id = cid, origin_id = %job.origin_id, "Lost the insert race, reading the stored record");
                self.store
                    .find_by_origin_id(job.kind, &job.origin_id)
                    .await?
                    .ok_or_else(|| {
                        IngestError::TransientIo(format!(
                            "{} {} reported as duplicate but not readable",
                            job.kind, job.origin_id
                        ))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }
}
