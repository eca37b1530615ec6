use crate::config::UploadConfig;
use crate::models::{FailureKind, UploadFailure, UploadOutcome, UploadPart, WrittenFile};
use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Read-once byte source backing an upload part
#[async_trait]
pub trait PartSource: Send + Sync {
    async fn open(&self) -> io::Result<Box<dyn AsyncRead + Unpin + Send>>;
}

/// Streams one part to its destination through a fixed-size buffer
#[derive(Debug, Clone)]
pub struct PartWriter {
    buffer_size: usize,
    file_mode: u32,
}

impl PartWriter {
    pub fn new(buffer_size: usize, file_mode: u32) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
            file_mode,
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.copy_buffer_size, config.file_mode)
    }

    /// Copies the part and reports the outcome. Partially written files are left in place.
    pub async fn write(&self, part: UploadPart) -> UploadOutcome {
        match self.copy(&part).await {
            Ok(bytes_written) => {
                self.fix_permissions(&part.destination).await;
                tracing::info!("Uploaded file: {} ({} bytes)", part.name, bytes_written);
                UploadOutcome::Success(WrittenFile {
                    name: part.name,
                    destination: part.destination,
                    bytes_written,
                })
            }
            Err(failure) => {
                tracing::error!("Upload of {} failed at {}: {}", part.name, failure.kind, failure.message);
                UploadOutcome::Failure(failure)
            }
        }
    }

    async fn copy(&self, part: &UploadPart) -> Result<u64, UploadFailure> {
        let mut source = part.source.open().await.map_err(|e| {
            UploadFailure::new(
                FailureKind::OpenSource,
                format!("Error opening file {}: {}", part.name, e),
            )
        })?;

        let mut destination = File::create(&part.destination).await.map_err(|e| {
            UploadFailure::new(
                FailureKind::CreateDestination,
                format!("Error creating destination file {}: {}", part.name, e),
            )
        })?;

        let copy_error = |e: io::Error| {
            UploadFailure::new(
                FailureKind::Copy,
                format!("Error copying file {}: {}", part.name, e),
            )
        };

        let mut buffer = vec![0u8; self.buffer_size];
        let mut total: u64 = 0;

        loop {
            let n = source.read(&mut buffer).await.map_err(copy_error)?;
            if n == 0 {
                break;
            }
            destination.write_all(&buffer[..n]).await.map_err(copy_error)?;
            total += n as u64;
        }

        destination.flush().await.map_err(copy_error)?;
        destination.sync_all().await.map_err(copy_error)?;

        Ok(total)
    }

    #[cfg(unix)]
    async fn fix_permissions(&self, path: &Path) {
        use std::os::unix::fs::PermissionsExt;

        let permissions = std::fs::Permissions::from_mode(self.file_mode);
        if let Err(e) = tokio::fs::set_permissions(path, permissions).await {
            tracing::warn!("Error setting file permissions on {}: {}", path.display(), e);
        }
    }

    #[cfg(not(unix))]
    async fn fix_permissions(&self, path: &Path) {
        tracing::debug!("Skipping mode {:o} for {} on this platform", self.file_mode, path.display());
    }
}
