use crate::api::error::AppError;
use crate::config::UploadConfig;
use crate::models::{FailureKind, RequestResult, UploadFailure, UploadOutcome, UploadRequest};
use crate::services::part_writer::PartWriter;
use crate::services::receiver;
use axum::extract::Multipart;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::Instrument;

/// Drives one upload request from parsed parts to a single request-level result.
///
/// Every part gets its own task, but tasks queue on a semaphore shared by all
/// requests so at most `max_concurrent_writes` writers touch the disk at once.
/// Outcomes flow back through a channel sized to the part count and are read
/// only after every task has terminated.
pub struct UploadCoordinator {
    config: Arc<UploadConfig>,
    writer: Arc<PartWriter>,
    permits: Arc<Semaphore>,
}

impl UploadCoordinator {
    pub fn new(config: Arc<UploadConfig>) -> Self {
        let writer = Arc::new(PartWriter::from_config(&config));
        let permits = Arc::new(Semaphore::new(config.max_concurrent_writes.max(1)));
        Self {
            config,
            writer,
            permits,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Full pipeline for an incoming multipart body
    pub async fn handle(&self, multipart: Multipart) -> Result<RequestResult, AppError> {
        let request = self.receive(multipart).await?;
        self.handle_request(request).await
    }

    pub async fn receive(&self, multipart: Multipart) -> Result<UploadRequest, AppError> {
        receiver::receive_parts(multipart, &self.config).await
    }

    /// Writes an already parsed request and reduces the outcomes.
    ///
    /// The writers, rollback, and reduction run in one spawned task. Dropping
    /// this future detaches that task, so every launched writer still runs to
    /// completion.
    pub async fn handle_request(&self, request: UploadRequest) -> Result<RequestResult, AppError> {
        if request.is_empty() {
            return Err(AppError::BadRequest(
                "request contains no file parts".to_string(),
            ));
        }

        self.ensure_root().await?;

        let writer = self.writer.clone();
        let permits = self.permits.clone();
        let rollback_on_failure = self.config.rollback_on_failure;

        let batch = tokio::spawn(
            async move {
                let outcomes = write_parts(writer, permits, request).await;
                if rollback_on_failure && outcomes.iter().any(UploadOutcome::is_failure) {
                    rollback(&outcomes).await;
                }
                RequestResult::reduce(outcomes)
            }
            .in_current_span(),
        );

        batch.await.map_err(|e| {
            tracing::error!("Upload batch terminated abnormally: {}", e);
            AppError::Internal(format!("upload batch terminated abnormally: {}", e))
        })
    }

    pub async fn ensure_root(&self) -> Result<(), AppError> {
        let root = &self.config.upload_root;

        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o755);

        builder.create(root).await.map_err(|e| {
            tracing::error!("Error creating upload directory {}: {}", root.display(), e);
            AppError::StorageUnavailable(format!(
                "upload directory {} is unavailable: {}",
                root.display(),
                e
            ))
        })
    }

    /// Runs one writer task per part and returns once all of them have finished.
    /// A failing part does not stop its siblings, and dropping this future does
    /// not stop the writers.
    pub async fn dispatch(&self, request: UploadRequest) -> Vec<UploadOutcome> {
        let part_count = request.len();
        let batch = tokio::spawn(
            write_parts(self.writer.clone(), self.permits.clone(), request).in_current_span(),
        );

        match batch.await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                tracing::error!("Upload batch of {} parts terminated abnormally: {}", part_count, e);
                vec![UploadOutcome::Failure(UploadFailure::new(
                    FailureKind::Aborted,
                    format!("Upload batch terminated abnormally: {}", e),
                ))]
            }
        }
    }
}

async fn write_parts(
    writer: Arc<PartWriter>,
    permits: Arc<Semaphore>,
    request: UploadRequest,
) -> Vec<UploadOutcome> {
    let parts = request.into_parts();
    let part_count = parts.len();

    let (tx, mut rx) = mpsc::channel::<UploadOutcome>(part_count.max(1));
    let mut tasks = JoinSet::new();

    for part in parts {
        let tx = tx.clone();
        let writer = writer.clone();
        let permits = permits.clone();
        let span = tracing::info_span!("part_writer", file = %part.name);

        tasks.spawn(
            async move {
                let outcome = match permits.acquire_owned().await {
                    Ok(_permit) => writer.write(part).await,
                    Err(e) => UploadOutcome::Failure(UploadFailure::new(
                        FailureKind::Aborted,
                        format!("Error scheduling file {}: {}", part.name, e),
                    )),
                };
                // Capacity equals the part count, so this never waits
                let _ = tx.send(outcome).await;
            }
            .instrument(span),
        );
    }
    drop(tx);

    let mut aborted = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Part writer task terminated abnormally: {}", e);
            aborted.push(UploadOutcome::Failure(UploadFailure::new(
                FailureKind::Aborted,
                format!("Part writer task terminated abnormally: {}", e),
            )));
        }
    }

    let mut outcomes = Vec::with_capacity(part_count);
    while let Some(outcome) = rx.recv().await {
        outcomes.push(outcome);
    }
    outcomes.extend(aborted);

    tracing::info!(
        "Collected {} outcomes for {} parts ({} failed)",
        outcomes.len(),
        part_count,
        outcomes.iter().filter(|o| o.is_failure()).count()
    );

    outcomes
}

/// Removes every file this request wrote successfully
async fn rollback(outcomes: &[UploadOutcome]) {
    for outcome in outcomes {
        if let UploadOutcome::Success(file) = outcome {
            match tokio::fs::remove_file(&file.destination).await {
                Ok(()) => tracing::info!("Rolled back {}", file.name),
                Err(e) => tracing::warn!("Failed to roll back {}: {}", file.name, e),
            }
        }
    }
}
