use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use crate::config::env::{self, EnvKey};

#[derive(Debug, thiserror::Error)]
#[error("missing required environment variable {0}")]
pub struct ConfigError(pub &'static str);

fn required(key: EnvKey) -> Result<String, ConfigError> {
    let name = key.as_str();
    env::get(key).map_err(|_| ConfigError(name))
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub app_env: String,
    pub server_port: u16,
    pub redis_url: String,
    pub staging_dir: PathBuf,
    pub upload_max_bytes: usize,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub worker: WorkerConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// URL segment that identifies the storage host when deriving folders.
    pub host_marker: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QueueConfig {
    pub stream: String,
    pub group: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            stream: "upload_jobs".to_string(),
            group: "worker".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorkerConfig {
    pub consumer: String,
    pub concurrency: usize,
    pub batch_size: usize,
    pub block: Duration,
    pub max_attempts: u32,
    pub backoff_unit: Duration,
    /// Entries idle longer than this are reclaimed; `None` disables reclaim.
    pub reclaim_idle: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            consumer: "worker".to_string(),
            concurrency: 1,
            batch_size: 10,
            block: Duration::from_secs(5),
            max_attempts: 5,
            backoff_unit: Duration::from_secs(1),
            reclaim_idle: None,
        }
    }
}

/// Poll block timeout; never zero, since a non-blocking read would spin.
fn poll_block(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let defaults = WorkerConfig::default();
        let reclaim_secs: u64 = env::get_parsed(EnvKey::WorkerReclaimIdleSecs, 0);

        Ok(Self {
            app_env: env::get_or(EnvKey::AppEnv, "dev"),
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            redis_url: required(EnvKey::RedisUrl)?,
            staging_dir: PathBuf::from(env::get_or(EnvKey::StagingDir, "tmp")),
            upload_max_bytes: env::get_parsed(EnvKey::UploadMaxBytes, 10 * 1024 * 1024),
            storage: StorageConfig {
                endpoint: env::get_or(EnvKey::S3Endpoint, "is3.cloudhost.id"),
                bucket: required(EnvKey::S3Bucket)?,
                region: env::get_or(EnvKey::S3Region, "us-west-2"),
                access_key: required(EnvKey::S3AccessKey)?,
                secret_key: required(EnvKey::S3SecretKey)?,
                host_marker: env::get_or(EnvKey::S3HostMarker, "is3"),
            },
            queue: QueueConfig {
                stream: env::get_or(EnvKey::UploadStream, "upload_jobs"),
                group: env::get_or(EnvKey::UploadGroup, "worker"),
            },
            worker: WorkerConfig {
                consumer: env::get_or(EnvKey::WorkerConsumer, &defaults.consumer),
                concurrency: env::get_parsed(EnvKey::WorkerConcurrency, defaults.concurrency).max(1),
                batch_size: env::get_parsed(EnvKey::WorkerBatchSize, defaults.batch_size).max(1),
                block: poll_block(env::get_parsed(EnvKey::WorkerBlockMs, 5000)),
                max_attempts: env::get_parsed(EnvKey::WorkerMaxAttempts, defaults.max_attempts).max(1),
                backoff_unit: Duration::from_millis(env::get_parsed(EnvKey::WorkerBackoffMs, 1000)),
                reclaim_idle: (reclaim_secs > 0).then(|| Duration::from_secs(reclaim_secs)),
            },
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("prod")
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_env: "test".to_string(),
            server_port: 0,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            staging_dir: staging_dir.into(),
            upload_max_bytes: 1024 * 1024,
            storage: StorageConfig {
                endpoint: "is3.example.com".to_string(),
                bucket: "bucket".to_string(),
                region: "us-west-2".to_string(),
                access_key: "key".to_string(),
                secret_key: "secret".to_string(),
                host_marker: "is3".to_string(),
            },
            queue: QueueConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}
