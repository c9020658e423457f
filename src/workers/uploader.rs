use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::common::error::JobError;
use crate::config::settings::{QueueConfig, WorkerConfig};
use crate::infrastructure::queue::{Job, JobQueue, QueueError};
use crate::modules::upload::model::{decode_job, DecodeFailure, UploadIntent};
use crate::modules::upload::pipeline::{PipelineError, UploadOptions, Uploader};
use crate::modules::upload::staging::StagingArea;

/// What happened to a single delivered job.
#[derive(Debug)]
pub enum JobOutcome {
    /// Uploaded. When the ack failed the staged file is kept for redelivery.
    Completed { url: String, acked: bool },
    /// Permanently invalid; left pending without retry.
    Skipped(DecodeFailure),
    /// Every attempt failed; left pending with its staged file.
    Exhausted(PipelineError),
    /// Shutdown interrupted the retry loop.
    Cancelled,
}

/// One consumer identity pulling upload jobs from the stream.
pub struct UploadWorker {
    queue: Arc<dyn JobQueue>,
    uploader: Arc<dyn Uploader>,
    queue_config: QueueConfig,
    config: WorkerConfig,
    host_marker: String,
    consumer: String,
}

impl UploadWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        uploader: Arc<dyn Uploader>,
        queue_config: QueueConfig,
        config: WorkerConfig,
        host_marker: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Self {
        Self {
            queue,
            uploader,
            queue_config,
            config,
            host_marker: host_marker.into(),
            consumer: consumer.into(),
        }
    }

    /// Polls until `cancel` fires. Queue errors never end the loop.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(consumer = %self.consumer, stream = %self.queue_config.stream, "🚀 Worker started. Listening for jobs");

        while !cancel.is_cancelled() {
            let batch = tokio::select! {
                _ = cancel.cancelled() => break,
                batch = self.next_batch() => batch,
            };

            let jobs = match batch {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!(consumer = %self.consumer, "Failed to consume job: {}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.backoff_unit) => {}
                    }
                    continue;
                }
            };

            if jobs.is_empty() {
                debug!(consumer = %self.consumer, "🗑️ no jobs found");
                continue;
            }

            for job in &jobs {
                if cancel.is_cancelled() {
                    break;
                }
                self.process_job(job, &cancel).await;
            }
        }

        info!(consumer = %self.consumer, "Worker stopped");
    }

    async fn next_batch(&self) -> Result<Vec<Job>, QueueError> {
        let QueueConfig { stream, group } = &self.queue_config;

        if let Some(min_idle) = self.config.reclaim_idle {
            let reclaimed = self
                .queue
                .reclaim(stream, group, &self.consumer, min_idle, self.config.batch_size)
                .await?;
            if !reclaimed.is_empty() {
                return Ok(reclaimed);
            }
        }

        self.queue
            .consume(stream, group, &self.consumer, self.config.batch_size, self.config.block)
            .await
    }

    /// Decodes, uploads with retry, acknowledges and cleans up one job.
    pub async fn process_job(&self, job: &Job, cancel: &CancellationToken) -> JobOutcome {
        let job_id = job.job_id();

        let intent = match decode_job(job).await {
            Ok(intent) => intent,
            Err(failure) => {
                error!(job_id = %job_id, entry_id = %job.id, "job skipped: {}", JobError::from(failure.clone()));
                return JobOutcome::Skipped(failure);
            }
        };

        info!(
            job_id = %job_id,
            file_path = %intent.destination_path,
            tmp = %intent.staged_file_ref.display(),
            compress = intent.compress_to_webp,
            "start processing"
        );

        let url = match self.upload_with_retry(&job_id, &intent, cancel).await {
            Ok(url) => url,
            Err(outcome) => return outcome,
        };

        if let Some(old) = intent.replace_of.as_deref().filter(|old| *old != url) {
            self.delete_stale(&job_id, old).await;
        }

        let QueueConfig { stream, group } = &self.queue_config;
        let acked = match self.queue.ack(stream, group, &job.id).await {
            Ok(()) => {
                info!(job_id = %job_id, "✅ Job done");
                match StagingArea::remove(&intent.staged_file_ref).await {
                    Ok(()) => info!(job_id = %job_id, tmp = %intent.staged_file_ref.display(), "tmp file removed"),
                    Err(e) => warn!(job_id = %job_id, tmp = %intent.staged_file_ref.display(), "failed to remove tmp file: {}", e),
                }
                true
            }
            Err(e) => {
                // still pending; keep the staged file for redelivery
                error!(job_id = %job_id, "ack error: {}", e);
                false
            }
        };

        JobOutcome::Completed { url, acked }
    }

    async fn upload_with_retry(
        &self,
        job_id: &str,
        intent: &UploadIntent,
        cancel: &CancellationToken,
    ) -> Result<String, JobOutcome> {
        let options = UploadOptions::for_intent(intent, &self.host_marker);
        let max_attempts = self.config.max_attempts;

        let mut attempt = 1;
        loop {
            let err = match self.uploader.upload(&intent.staged_file_ref, &options).await {
                Ok(url) => return Ok(url),
                Err(err) => err,
            };

            if attempt >= max_attempts || !JobError::from(&err).is_retryable() {
                error!(job_id = %job_id, "failed to upload file after {} attempts: {}", attempt, err);
                return Err(JobOutcome::Exhausted(err));
            }

            warn!(job_id = %job_id, attempt, "upload attempt failed: {}", err);

            if let Some(old) = intent.replace_of.as_deref() {
                self.delete_stale(job_id, old).await;
            }

            let backoff = self.config.backoff_unit * attempt;
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(job_id = %job_id, attempt, "shutdown during backoff, leaving job pending");
                    return Err(JobOutcome::Cancelled);
                }
                _ = tokio::time::sleep(backoff) => {}
            }

            attempt += 1;
        }
    }

    async fn delete_stale(&self, job_id: &str, url: &str) {
        match self.uploader.delete(url).await {
            Ok(()) => info!(job_id = %job_id, old_file = url, "old file deleted"),
            Err(e) => error!(job_id = %job_id, old_file = url, "failed to delete old file: {}", e),
        }
    }
}

/// Creates the consumer group and runs `config.concurrency` consumer
/// identities until `cancel` fires.
pub async fn start_upload_workers(
    queue: Arc<dyn JobQueue>,
    uploader: Arc<dyn Uploader>,
    queue_config: QueueConfig,
    config: WorkerConfig,
    host_marker: String,
    cancel: CancellationToken,
) -> Result<(), JobError> {
    queue
        .init_consumer_group(&queue_config.stream, &queue_config.group)
        .await
        .map_err(|e| JobError::Fatal(format!("failed to initialize consumer group: {}", e)))?;

    let mut handles = Vec::with_capacity(config.concurrency);
    for n in 1..=config.concurrency {
        let worker = UploadWorker::new(
            queue.clone(),
            uploader.clone(),
            queue_config.clone(),
            config.clone(),
            host_marker.clone(),
            format!("{}-{}", config.consumer, n),
        );
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move { worker.run(cancel).await }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Worker task panicked: {}", e);
        }
    }

    Ok(())
}
