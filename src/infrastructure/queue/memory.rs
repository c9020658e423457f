//! In-process queue with consumer-group semantics, used by the worker tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{Job, JobQueue, QueueError};

#[derive(Default)]
struct GroupState {
    next_index: usize,
    pending: HashMap<String, (String, Instant)>,
}

#[derive(Default)]
struct Stream {
    entries: Vec<Job>,
    groups: HashMap<String, GroupState>,
}

#[derive(Default)]
pub struct MemoryQueue {
    streams: Mutex<HashMap<String, Stream>>,
    acks: Mutex<Vec<String>>,
    seq: Mutex<u64>,
    appended: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry with arbitrary raw fields.
    pub fn push_raw(&self, stream: &str, fields: HashMap<String, Vec<u8>>) -> String {
        let id = {
            let mut seq = self.seq.lock().unwrap();
            *seq += 1;
            format!("{}-0", *seq)
        };
        let mut streams = self.streams.lock().unwrap();
        streams
            .entry(stream.to_string())
            .or_default()
            .entries
            .push(Job::new(id.clone(), fields));
        drop(streams);
        self.appended.notify_waiters();
        id
    }

    /// Every ack call in order, duplicates included.
    pub fn acks(&self) -> Vec<String> {
        self.acks.lock().unwrap().clone()
    }

    pub fn pending_count(&self, stream: &str, group: &str) -> usize {
        self.streams
            .lock()
            .unwrap()
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.len())
            .unwrap_or(0)
    }

    fn take_new(&self, stream: &str, group: &str, consumer: &str, max_count: usize) -> Result<Vec<Job>, QueueError> {
        let mut streams = self.streams.lock().unwrap();
        let state = streams
            .get_mut(stream)
            .ok_or_else(|| QueueError::Command(format!("NOGROUP no such key '{}'", stream)))?;
        let group_state = state
            .groups
            .get_mut(group)
            .ok_or_else(|| QueueError::Command(format!("NOGROUP no such group '{}'", group)))?;

        let end = (group_state.next_index + max_count).min(state.entries.len());
        let batch: Vec<Job> = state.entries[group_state.next_index..end].to_vec();
        group_state.next_index = end;
        for job in &batch {
            group_state
                .pending
                .insert(job.id.clone(), (consumer.to_string(), Instant::now()));
        }
        Ok(batch)
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }

    async fn init_consumer_group(&self, stream: &str, group: &str) -> Result<(), QueueError> {
        let mut streams = self.streams.lock().unwrap();
        streams
            .entry(stream.to_string())
            .or_default()
            .groups
            .entry(group.to_string())
            .or_default();
        Ok(())
    }

    async fn enqueue(&self, stream: &str, job_id: &str, payload: &str) -> Result<String, QueueError> {
        let fields = HashMap::from([
            ("id".to_string(), job_id.as_bytes().to_vec()),
            ("payload".to_string(), payload.as_bytes().to_vec()),
        ]);
        Ok(self.push_raw(stream, fields))
    }

    async fn consume(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<Job>, QueueError> {
        let deadline = Instant::now() + block;
        loop {
            let notified = self.appended.notified();
            let batch = self.take_new(stream, group, consumer, max_count)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), QueueError> {
        self.acks.lock().unwrap().push(id.to_string());
        let mut streams = self.streams.lock().unwrap();
        if let Some(group_state) = streams.get_mut(stream).and_then(|s| s.groups.get_mut(group)) {
            group_state.pending.remove(id);
        }
        Ok(())
    }

    async fn reclaim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<Job>, QueueError> {
        let mut streams = self.streams.lock().unwrap();
        let Some(state) = streams.get_mut(stream) else {
            return Ok(Vec::new());
        };
        let Some(group_state) = state.groups.get_mut(group) else {
            return Ok(Vec::new());
        };

        let now = Instant::now();
        let mut claimed = Vec::new();
        for job in &state.entries {
            if claimed.len() >= count {
                break;
            }
            if let Some((owner, since)) = group_state.pending.get_mut(&job.id) {
                if now.duration_since(*since) >= min_idle {
                    *owner = consumer.to_string();
                    *since = now;
                    claimed.push(job.clone());
                }
            }
        }
        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acking_twice_is_harmless() {
        let queue = MemoryQueue::new();
        queue.init_consumer_group("upload_jobs", "worker").await.unwrap();
        let id = queue.enqueue("upload_jobs", "job-1", "{}").await.unwrap();

        queue.ack("upload_jobs", "worker", &id).await.unwrap();
        queue.ack("upload_jobs", "worker", &id).await.unwrap();
        assert_eq!(queue.acks(), vec![id.clone(), id]);
    }

    #[tokio::test]
    async fn creating_a_group_twice_keeps_its_position() {
        let queue = MemoryQueue::new();
        queue.init_consumer_group("s", "g").await.unwrap();
        queue.enqueue("s", "a", "{}").await.unwrap();
        let first = queue.consume("s", "g", "c1", 10, Duration::ZERO).await.unwrap();
        assert_eq!(first.len(), 1);

        queue.init_consumer_group("s", "g").await.unwrap();
        let again = queue.consume("s", "g", "c1", 10, Duration::ZERO).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(queue.pending_count("s", "g"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_go_to_one_consumer_per_group() {
        let queue = MemoryQueue::new();
        queue.init_consumer_group("s", "g").await.unwrap();
        queue.enqueue("s", "a", "{}").await.unwrap();
        queue.enqueue("s", "b", "{}").await.unwrap();

        let first = queue.consume("s", "g", "c1", 1, Duration::from_secs(1)).await.unwrap();
        let second = queue.consume("s", "g", "c2", 10, Duration::from_secs(1)).await.unwrap();
        let third = queue.consume("s", "g", "c1", 10, Duration::from_secs(1)).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].id, second[0].id);
        assert!(third.is_empty());
        assert_eq!(queue.pending_count("s", "g"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_entries_are_reclaimed() {
        let queue = MemoryQueue::new();
        queue.init_consumer_group("s", "g").await.unwrap();
        queue.enqueue("s", "a", "{}").await.unwrap();
        queue.consume("s", "g", "c1", 10, Duration::ZERO).await.unwrap();

        let early = queue.reclaim("s", "g", "c2", Duration::from_secs(60), 10).await.unwrap();
        assert!(early.is_empty());

        tokio::time::advance(Duration::from_secs(61)).await;
        let late = queue.reclaim("s", "g", "c2", Duration::from_secs(60), 10).await.unwrap();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].job_id(), "a");
    }
}
