//! Durable job queue with consumer-group delivery and explicit acknowledgement.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

#[cfg(test)]
pub mod memory;
pub mod redis_stream;

/// A message delivered from a stream.
///
/// `id` is the queue-assigned entry id used for acknowledgement; `fields`
/// holds the raw message fields as written by the producer.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub fields: HashMap<String, Vec<u8>>,
}

impl Job {
    pub fn new(id: impl Into<String>, fields: HashMap<String, Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&[u8]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    /// Producer-assigned job id, falling back to the entry id.
    pub fn job_id(&self) -> String {
        self.field("id")
            .and_then(|raw| std::str::from_utf8(raw).ok())
            .map(str::to_string)
            .unwrap_or_else(|| self.id.clone())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue connection error: {0}")]
    Connection(String),

    #[error("queue command error: {0}")]
    Command(String),

    #[error("consumer group error: {0}")]
    ConsumerGroup(String),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn ping(&self) -> Result<(), QueueError>;

    /// Creates the stream and group when absent, reading from the start of
    /// history. An existing group is not an error.
    async fn init_consumer_group(&self, stream: &str, group: &str) -> Result<(), QueueError>;

    /// Appends a job and returns its entry id.
    async fn enqueue(&self, stream: &str, job_id: &str, payload: &str) -> Result<String, QueueError>;

    /// Reads up to `max_count` entries never delivered to `group`, waiting up
    /// to `block` when none are available. A timeout yields an empty batch.
    async fn consume(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<Job>, QueueError>;

    /// Marks an entry processed for `group`. Acking twice is harmless.
    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), QueueError>;

    /// Claims entries that have been pending in `group` for at least
    /// `min_idle` and hands them to `consumer`.
    async fn reclaim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<Job>, QueueError>;
}
