use std::env;
use std::str::FromStr;

pub enum EnvKey {
    AppEnv,
    ServerPort,
    RedisUrl,
    S3Endpoint,
    S3Bucket,
    S3Region,
    S3AccessKey,
    S3SecretKey,
    S3HostMarker,
    StagingDir,
    UploadStream,
    UploadGroup,
    UploadMaxBytes,
    WorkerConsumer,
    WorkerConcurrency,
    WorkerBatchSize,
    WorkerBlockMs,
    WorkerMaxAttempts,
    WorkerBackoffMs,
    WorkerReclaimIdleSecs,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::AppEnv => "APP_ENV",
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::RedisUrl => "REDIS_URL",
            EnvKey::S3Endpoint => "S3_ENDPOINT",
            EnvKey::S3Bucket => "S3_BUCKET",
            EnvKey::S3Region => "S3_REGION",
            EnvKey::S3AccessKey => "S3_ACCESS_KEY",
            EnvKey::S3SecretKey => "S3_SECRET_KEY",
            EnvKey::S3HostMarker => "S3_HOST_MARKER",
            EnvKey::StagingDir => "STAGING_DIR",
            EnvKey::UploadStream => "UPLOAD_STREAM",
            EnvKey::UploadGroup => "UPLOAD_GROUP",
            EnvKey::UploadMaxBytes => "UPLOAD_MAX_BYTES",
            EnvKey::WorkerConsumer => "WORKER_CONSUMER",
            EnvKey::WorkerConcurrency => "WORKER_CONCURRENCY",
            EnvKey::WorkerBatchSize => "WORKER_BATCH_SIZE",
            EnvKey::WorkerBlockMs => "WORKER_BLOCK_MS",
            EnvKey::WorkerMaxAttempts => "WORKER_MAX_ATTEMPTS",
            EnvKey::WorkerBackoffMs => "WORKER_BACKOFF_MS",
            EnvKey::WorkerReclaimIdleSecs => "WORKER_RECLAIM_IDLE_SECS",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    env::var(key.as_str()).unwrap_or_else(|_| default.to_string())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
