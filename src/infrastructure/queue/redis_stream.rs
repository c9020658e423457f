//! Redis Streams-backed job queue (XADD / XREADGROUP / XACK / XAUTOCLAIM).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamReadOptions, StreamReadReply,
};
use redis::AsyncCommands;
use tracing::{debug, info, instrument, warn};

use super::{Job, JobQueue, QueueError};
use crate::infrastructure::redis::client::RedisService;

const BUSYGROUP: &str = "BUSYGROUP";

#[derive(Clone)]
pub struct RedisStreamQueue {
    redis: RedisService,
}

impl RedisStreamQueue {
    pub fn new(redis: RedisService) -> Self {
        Self { redis }
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, QueueError> {
        self.redis
            .get_conn()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))
    }

    async fn xadd(&self, stream: &str, job_id: &str, payload: &str) -> Result<String, QueueError> {
        let mut conn = self.conn().await?;
        conn.xadd(stream, "*", &[("id", job_id), ("payload", payload)])
            .await
            .map_err(|e| QueueError::Command(format!("XADD failed: {}", e)))
    }
}

fn is_busygroup(err: &redis::RedisError) -> bool {
    err.code() == Some(BUSYGROUP)
}

fn read_options(group: &str, consumer: &str, max_count: usize, block: Duration) -> StreamReadOptions {
    let options = StreamReadOptions::default().group(group, consumer).count(max_count);
    // BLOCK 0 would wait forever
    let block_ms = usize::try_from(block.as_millis()).unwrap_or(usize::MAX);
    if block_ms > 0 {
        options.block(block_ms)
    } else {
        options
    }
}

fn into_job(entry: StreamId) -> Job {
    let fields = entry
        .map
        .iter()
        .filter_map(|(name, value)| {
            redis::from_redis_value::<Vec<u8>>(value)
                .ok()
                .map(|raw| (name.clone(), raw))
        })
        .collect::<HashMap<_, _>>();

    Job::new(entry.id, fields)
}

#[async_trait]
impl JobQueue for RedisStreamQueue {
    async fn ping(&self) -> Result<(), QueueError> {
        self.redis
            .ping()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))
    }

    async fn init_consumer_group(&self, stream: &str, group: &str) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;

        let created: redis::RedisResult<()> = conn.xgroup_create_mkstream(stream, group, "0").await;
        match created {
            Ok(()) => {
                info!(stream, group, "Created consumer group");
                Ok(())
            }
            Err(e) if is_busygroup(&e) => {
                debug!(stream, group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(QueueError::ConsumerGroup(e.to_string())),
        }
    }

    #[instrument(skip(self, payload), err)]
    async fn enqueue(&self, stream: &str, job_id: &str, payload: &str) -> Result<String, QueueError> {
        match self.xadd(stream, job_id, payload).await {
            Ok(id) => Ok(id),
            Err(e) => {
                // a fresh multiplexed connection is opened on retry
                warn!("XADD failed: {}. Retrying once on a new connection.", e);
                self.xadd(stream, job_id, payload).await
            }
        }
    }

    async fn consume(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        max_count: usize,
        block: Duration,
    ) -> Result<Vec<Job>, QueueError> {
        let mut conn = self.conn().await?;

        let options = read_options(group, consumer, max_count, block);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[stream], &[">"], &options)
            .await
            .map_err(|e| QueueError::Command(format!("XREADGROUP failed: {}", e)))?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        Ok(reply
            .keys
            .into_iter()
            .filter(|key| key.key == stream)
            .flat_map(|key| key.ids)
            .map(into_job)
            .collect())
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<(), QueueError> {
        let mut conn = self.conn().await?;
        let _: i64 = conn
            .xack(stream, group, &[id])
            .await
            .map_err(|e| QueueError::Command(format!("XACK failed: {}", e)))?;
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
        let mut conn = self.conn().await?;

        let reply: StreamAutoClaimReply = conn
            .xautoclaim_options(
                stream,
                group,
                consumer,
                min_idle.as_millis() as u64,
                "0-0",
                StreamAutoClaimOptions::default().count(count),
            )
            .await
            .map_err(|e| QueueError::Command(format!("XAUTOCLAIM failed: {}", e)))?;

        if !reply.claimed.is_empty() {
            info!(stream, group, consumer, claimed = reply.claimed.len(), "Reclaimed idle entries");
        }

        Ok(reply.claimed.into_iter().map(into_job).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::{ToRedisArgs, Value};

    fn args(options: &StreamReadOptions) -> Vec<String> {
        options
            .to_redis_args()
            .into_iter()
            .map(|arg| String::from_utf8(arg).unwrap())
            .collect()
    }

    #[test]
    fn entry_fields_become_job_fields() {
        let entry = StreamId {
            id: "1700000000000-0".to_string(),
            map: HashMap::from([
                ("id".to_string(), Value::BulkString(b"job-1".to_vec())),
                ("payload".to_string(), Value::BulkString(br#"{"FilePath":"users/1.png"}"#.to_vec())),
            ]),
        };

        let job = into_job(entry);
        assert_eq!(job.id, "1700000000000-0");
        assert_eq!(job.job_id(), "job-1");
        assert_eq!(job.field("payload"), Some(br#"{"FilePath":"users/1.png"}"#.as_slice()));
    }

    #[test]
    fn entry_without_id_field_falls_back_to_entry_id() {
        let entry = StreamId {
            id: "5-0".to_string(),
            map: HashMap::from([("payload".to_string(), Value::BulkString(b"{}".to_vec()))]),
        };
        assert_eq!(into_job(entry).job_id(), "5-0");
    }

    #[test]
    fn zero_block_sends_no_block_argument() {
        let options = read_options("worker", "worker-1", 10, Duration::ZERO);
        let args = args(&options);
        assert!(!args.iter().any(|a| a == "BLOCK"));
        assert!(args.windows(2).any(|w| w[0] == "COUNT" && w[1] == "10"));
        assert!(args.windows(3).any(|w| w[0] == "GROUP" && w[1] == "worker" && w[2] == "worker-1"));
    }

    #[test]
    fn block_is_sent_in_milliseconds() {
        let options = read_options("worker", "worker-1", 10, Duration::from_secs(5));
        let args = args(&options);
        assert!(args.windows(2).any(|w| w[0] == "BLOCK" && w[1] == "5000"));
    }

    #[test]
    fn busygroup_replies_are_recognized() {
        // redis 0.27 does not re-export make_extension_error; the parser builds the same error.
        let busy = redis::parse_redis_value(b"-BUSYGROUP Consumer Group name already exists\r\n")
            .and_then(redis::Value::extract_error)
            .unwrap_err();
        assert!(is_busygroup(&busy));

        let other = redis::RedisError::from((redis::ErrorKind::ResponseError, "NOGROUP"));
        assert!(!is_busygroup(&other));
    }
}
