//! Durable job queue between the API and the ingestion workers.
//!
//! Delivery is at-least-once and unordered. A polled message is leased to
//! one consumer until it is acknowledged, dead-lettered, or its visibility
//! window lapses, after which the transport hands it out again.

pub mod memory;
pub mod rabbitmq;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryQueue;
pub use rabbitmq::RabbitMqQueue;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("acknowledge error: {0}")]
    Ack(String),

    #[error("unknown receipt {0}")]
    UnknownReceipt(u64),
}

/// A leased message.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Transport message id, for logging.
    pub id: String,
    pub body: Vec<u8>,
    /// Handle used to settle this lease.
    pub receipt: u64,
    /// True when the transport has handed this message out before.
    pub redelivered: bool,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Durably enqueue one message.
    async fn enqueue(&self, payload: &[u8]) -> Result<(), QueueError>;

    /// Wait up to `idle_timeout` for a message. `Ok(None)` means the queue
    /// stayed empty and the caller should poll again.
    async fn poll(&self, idle_timeout: Duration) -> Result<Option<QueueMessage>, QueueError>;

    /// Processing finished; the message must not be delivered again.
    async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError>;

    /// Give the lease up without acknowledging; the message becomes
    /// available again once the visibility window has elapsed.
    async fn abandon(&self, message: &QueueMessage) -> Result<(), QueueError>;

    /// Move a message that can never be processed out of the work queue.
    async fn dead_letter(&self, message: &QueueMessage) -> Result<(), QueueError>;
}
