use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::{JobQueue, QueueError, QueueMessage};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: Vec<u8>,
    deliveries: u32,
}

struct Lease {
    message: StoredMessage,
    visible_at: Instant,
}

#[derive(Default)]
struct QueueState {
    next_receipt: u64,
    ready: VecDeque<StoredMessage>,
    in_flight: HashMap<u64, Lease>,
    dead: Vec<StoredMessage>,
}

impl QueueState {
    /// Returns expired leases to the ready queue.
    fn reclaim_expired(&mut self, now: Instant) {
        let expired: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, lease)| lease.visible_at <= now)
            .map(|(receipt, _)| *receipt)
            .collect();

        for receipt in expired {
            if let Some(lease) = self.in_flight.remove(&receipt) {
                debug!(message_id = %lease.message.id, "Lease expired, message visible again");
                self.ready.push_back(lease.message);
            }
        }
    }

    fn next_visible_at(&self) -> Option<Instant> {
        self.in_flight.values().map(|lease| lease.visible_at).min()
    }
}

/// In-process queue with visibility-timeout leasing. Used when the API
/// runs its own worker pool and by the test suite.
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl MemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            visibility_timeout,
        }
    }

    /// Messages not yet acknowledged or dead-lettered.
    pub async fn outstanding(&self) -> usize {
        let state = self.state.lock().await;
        state.ready.len() + state.in_flight.len()
    }

    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    pub async fn dead_letters(&self) -> Vec<Vec<u8>> {
        let state = self.state.lock().await;
        state.dead.iter().map(|m| m.body.clone()).collect()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, payload: &[u8]) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.ready.push_back(StoredMessage {
            id: Uuid::new_v4().to_string(),
            body: payload.to_vec(),
            deliveries: 0,
        });
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn poll(&self, idle_timeout: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let deadline = Instant::now() + idle_timeout;

        loop {
            // Registered before inspecting state so an enqueue in between
            // still wakes us.
            let notified = self.notify.notified();

            let next_visible = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                state.reclaim_expired(now);

                if let Some(mut message) = state.ready.pop_front() {
                    message.deliveries += 1;
                    state.next_receipt += 1;
                    let receipt = state.next_receipt;
                    let leased = QueueMessage {
                        id: message.id.clone(),
                        body: message.body.clone(),
                        receipt,
                        redelivered: message.deliveries > 1,
                    };
                    state.in_flight.insert(
                        receipt,
                        Lease {
                            message,
                            visible_at: now + self.visibility_timeout,
                        },
                    );
                    return Ok(Some(leased));
                }

                state.next_visible_at()
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }

            let wake_at = next_visible.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state
            .in_flight
            .remove(&message.receipt)
            .map(|_| ())
            .ok_or(QueueError::UnknownReceipt(message.receipt))
    }

    async fn abandon(&self, message: &QueueMessage) -> Result<(), QueueError> {
        // The lease simply runs out; the message reappears at `visible_at`.
        let state = self.state.lock().await;
        if state.in_flight.contains_key(&message.receipt) {
            Ok(())
        } else {
            Err(QueueError::UnknownReceipt(message.receipt))
        }
    }

    async fn dead_letter(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let lease = state
            .in_flight
            .remove(&message.receipt)
            .ok_or(QueueError::UnknownReceipt(message.receipt))?;
        state.dead.push(lease.message);
        Ok(())
    }
}
