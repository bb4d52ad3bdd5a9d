use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    acker::Acker,
    options::*,
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties, Consumer,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{JobQueue, QueueError, QueueMessage};

/// RabbitMQ-backed job queue.
///
/// Topology for a queue named `q`:
/// - `q`: durable work queue, rejected messages dead-letter to `q.dead`
/// - `q.retry`: holds abandoned messages for the visibility window, then
///   dead-letters them back into `q`
/// - `q.dead`: poison messages, kept for inspection
#[derive(Clone)]
pub struct RabbitMqQueue {
    url: String,
    queue: String,
    visibility_timeout: Duration,
    prefetch: u16,
    conn: Arc<Mutex<Connection>>,
    channel: Arc<Mutex<Channel>>,
    consumer: Arc<Mutex<Option<Consumer>>>,
    /// Ackers of leased deliveries, by delivery tag.
    leases: Arc<Mutex<HashMap<u64, Acker>>>,
}

impl RabbitMqQueue {
    async fn connect(
        url: &str,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<(Connection, Channel), QueueError> {
        info!("Connecting to RabbitMQ at {}", url);
        let conn = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to connect to RabbitMQ: {}", e)))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to create channel: {}", e)))?;

        Self::declare_topology(&channel, queue, visibility_timeout).await?;

        info!(queue, "Connected to RabbitMQ");
        Ok((conn, channel))
    }

    pub async fn new(
        url: &str,
        queue: &str,
        visibility_timeout: Duration,
        prefetch: u16,
    ) -> Result<Self, QueueError> {
        let (conn, channel) = Self::connect(url, queue, visibility_timeout).await?;

        Ok(Self {
            url: url.to_string(),
            queue: queue.to_string(),
            visibility_timeout,
            prefetch: prefetch.max(1),
            conn: Arc::new(Mutex::new(conn)),
            channel: Arc::new(Mutex::new(channel)),
            consumer: Arc::new(Mutex::new(None)),
            leases: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn retry_queue(queue: &str) -> String {
        format!("{}.retry", queue)
    }

    fn dead_queue(queue: &str) -> String {
        format!("{}.dead", queue)
    }

    fn dead_letter_args(routing_key: &str) -> FieldTable {
        let mut args = FieldTable::default();
        args.insert(
            ShortString::from("x-dead-letter-exchange"),
            AMQPValue::LongString(LongString::from("")),
        );
        args.insert(
            ShortString::from("x-dead-letter-routing-key"),
            AMQPValue::LongString(LongString::from(routing_key)),
        );
        args
    }

    async fn declare_topology(
        channel: &Channel,
        queue: &str,
        visibility_timeout: Duration,
    ) -> Result<(), QueueError> {
        let durable = QueueDeclareOptions {
            durable: true,
            ..QueueDeclareOptions::default()
        };
        let dead = Self::dead_queue(queue);
        let retry = Self::retry_queue(queue);

        channel
            .queue_declare(&dead, durable, FieldTable::default())
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to declare queue {}: {}", dead, e)))?;

        channel
            .queue_declare(queue, durable, Self::dead_letter_args(&dead))
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to declare queue {}: {}", queue, e)))?;

        let mut retry_args = Self::dead_letter_args(queue);
        retry_args.insert(
            ShortString::from("x-message-ttl"),
            AMQPValue::LongLongInt(visibility_timeout.as_millis() as i64),
        );
        channel
            .queue_declare(&retry, durable, retry_args)
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to declare queue {}: {}", retry, e)))?;

        Ok(())
    }

    async fn reconnect(&self) -> Result<(), QueueError> {
        warn!("RabbitMQ connection dropped, reconnecting...");
        let (conn, channel) = Self::connect(&self.url, &self.queue, self.visibility_timeout).await?;
        *self.conn.lock().await = conn;
        *self.channel.lock().await = channel;
        // Delivery tags belong to the old channel; consume afresh.
        *self.consumer.lock().await = None;
        self.leases.lock().await.clear();
        Ok(())
    }

    async fn publish_internal(&self, routing_key: &str, payload: &[u8]) -> Result<(), QueueError> {
        let channel = self.channel.lock().await;

        channel
            .basic_publish(
                "",
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string())),
            )
            .await
            .map_err(|e| QueueError::Publish(format!("Failed to publish message: {}", e)))?
            .await
            .map_err(|e| QueueError::Publish(format!("Failed to confirm publication: {}", e)))?;

        Ok(())
    }

    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), QueueError> {
        if let Err(e) = self.publish_internal(routing_key, payload).await {
            warn!("RabbitMQ publish failed: {}. Retrying after reconnect.", e);
            self.reconnect().await?;
            self.publish_internal(routing_key, payload).await?;
        }

        Ok(())
    }

    async fn take_lease(&self, message: &QueueMessage) -> Result<Acker, QueueError> {
        self.leases
            .lock()
            .await
            .remove(&message.receipt)
            .ok_or(QueueError::UnknownReceipt(message.receipt))
    }

    async fn start_consumer(&self) -> Result<Consumer, QueueError> {
        let channel = self.channel.lock().await;

        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to set prefetch: {}", e)))?;

        let consumer = channel
            .basic_consume(
                &self.queue,
                "ingestion_worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| QueueError::Connection(format!("Failed to create consumer: {}", e)))?;

        info!(queue = %self.queue, prefetch = self.prefetch, "Consuming ingestion jobs");
        Ok(consumer)
    }
}

/// `Ok(false)` from an acker means the channel closed or the delivery was
/// already settled; the broker will hand the message out again.
fn settled(result: lapin::Result<bool>, action: &str, message_id: &str) -> Result<(), QueueError> {
    match result {
        Ok(true) => Ok(()),
        Ok(false) => Err(QueueError::Ack(format!(
            "Could not {} message {}: channel closed or already settled",
            action, message_id
        ))),
        Err(e) => Err(QueueError::Ack(format!("Failed to {} message {}: {}", action, message_id, e))),
    }
}

#[async_trait]
impl JobQueue for RabbitMqQueue {
    async fn enqueue(&self, payload: &[u8]) -> Result<(), QueueError> {
        self.publish(&self.queue, payload).await
    }

    async fn poll(&self, idle_timeout: Duration) -> Result<Option<QueueMessage>, QueueError> {
        let mut slot = self.consumer.lock().await;
        if slot.is_none() {
            *slot = Some(self.start_consumer().await?);
        }
        let Some(consumer) = slot.as_mut() else {
            return Ok(None);
        };

        match tokio::time::timeout(idle_timeout, consumer.next()).await {
            Err(_) => Ok(None),
            Ok(Some(Ok(delivery))) => {
                let id = delivery
                    .properties
                    .message_id()
                    .as_ref()
                    .map(|id| id.as_str().to_string())
                    .unwrap_or_else(|| delivery.delivery_tag.to_string());
                debug!(message_id = %id, redelivered = delivery.redelivered, "Received ingestion job");
                self.leases
                    .lock()
                    .await
                    .insert(delivery.delivery_tag, delivery.acker.clone());

                Ok(Some(QueueMessage {
                    id,
                    body: delivery.data.clone(),
                    receipt: delivery.delivery_tag,
                    redelivered: delivery.redelivered,
                }))
            }
            Ok(Some(Err(e))) => {
                *slot = None;
                drop(slot);
                self.reconnect().await?;
                Err(QueueError::Connection(format!("Consumer failed: {}", e)))
            }
            Ok(None) => {
                *slot = None;
                drop(slot);
                self.reconnect().await?;
                Err(QueueError::Connection("Consumer stream closed".to_string()))
            }
        }
    }

    async fn ack(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let acker = self.take_lease(message).await?;
        settled(acker.ack(BasicAckOptions::default()).await, "ack", &message.id)
    }

    async fn abandon(&self, message: &QueueMessage) -> Result<(), QueueError> {
        // Park a copy in the retry queue; its TTL stands in for the
        // visibility window. A crash between the two steps only yields a
        // duplicate delivery, which workers tolerate.
        self.publish(&Self::retry_queue(&self.queue), &message.body).await?;
        self.ack(message).await
    }

    async fn dead_letter(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let acker = self.take_lease(message).await?;
        settled(
            acker.reject(BasicRejectOptions { requeue: false }).await,
            "reject",
            &message.id,
        )
    }
}
