use crate::api::error::AppError;
use crate::config::UploadConfig;
use crate::models::{UploadPart, UploadRequest, duplicate_destination};
use crate::services::part_writer::PartSource;
use crate::utils::validation::{resolve_destination, validate_upload_size};
use async_trait::async_trait;
use axum::extract::Multipart;
use axum::extract::multipart::{Field, MultipartError};
use axum::http::StatusCode;
use futures::TryStreamExt;
use std::io;
use tempfile::{NamedTempFile, TempPath};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

/// A part spooled to a staging file; the file is removed when this is dropped.
/// Only the path is held, so a request keeps no descriptor open per part.
#[derive(Debug)]
pub struct SpooledPart {
    path: TempPath,
    size: u64,
}

impl SpooledPart {
    pub fn size(&self) -> u64 {
        self.size
    }
}

#[async_trait]
impl PartSource for SpooledPart {
    async fn open(&self) -> io::Result<Box<dyn AsyncRead + Unpin + Send>> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}

/// Parses the whole multipart body into an `UploadRequest`.
///
/// Every file part is sanitized and spooled before any writer runs, so a
/// malformed or oversized body never leaves anything under the upload root.
/// Fields without a filename are skipped.
pub async fn receive_parts(
    mut multipart: Multipart,
    config: &UploadConfig,
) -> Result<UploadRequest, AppError> {
    let mut request = UploadRequest::new();
    let mut total_size: u64 = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| parse_error(&e, config))?
    {
        let field_name = field.name().unwrap_or_default().to_string();

        let Some(original_filename) = field.file_name().map(str::to_string) else {
            tracing::debug!("Skipping non-file field '{}'", field_name);
            continue;
        };

        let (name, destination) = resolve_destination(&config.upload_root, &original_filename)?;
        if request.contains(&destination) {
            return Err(duplicate_destination(&original_filename, &name));
        }

        let spooled = spool_field(field, config, &mut total_size).await?;
        tracing::debug!(
            "Received part '{}' as {} ({} bytes)",
            field_name,
            name,
            spooled.size()
        );

        request.push(UploadPart::new(
            field_name,
            original_filename,
            name,
            destination,
            Box::new(spooled),
        ))?;
    }

    Ok(request)
}

async fn spool_field(
    field: Field<'_>,
    config: &UploadConfig,
    total_size: &mut u64,
) -> Result<SpooledPart, AppError> {
    let staged = match &config.staging_dir {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .map_err(|e| AppError::StorageUnavailable(format!("Failed to create staging file: {}", e)))?;

    let mut staging = tokio::fs::File::from_std(
        staged
            .reopen()
            .map_err(|e| AppError::StorageUnavailable(format!("Failed to open staging file: {}", e)))?,
    );

    let body_with_io_error = field.map_err(io::Error::other);
    let mut reader = StreamReader::new(body_with_io_error);

    let mut buffer = vec![0u8; config.copy_buffer_size.max(1)];
    let mut size: u64 = 0;

    loop {
        let n = reader
            .read(&mut buffer)
            .await
            .map_err(|e| read_error(e, config))?;
        if n == 0 {
            break;
        }

        size += n as u64;
        *total_size += n as u64;
        validate_upload_size(*total_size, config.max_upload_size)?;

        staging
            .write_all(&buffer[..n])
            .await
            .map_err(|e| AppError::StorageUnavailable(format!("Failed to spool part: {}", e)))?;
    }

    staging
        .flush()
        .await
        .map_err(|e| AppError::StorageUnavailable(format!("Failed to spool part: {}", e)))?;
    drop(staging);

    Ok(SpooledPart {
        path: staged.into_temp_path(),
        size,
    })
}

fn parse_error(e: &MultipartError, config: &UploadConfig) -> AppError {
    let message = e.body_text();
    tracing::warn!("Error parsing form: {}", message);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE || message.contains("length limit exceeded") {
        AppError::BadRequest(format!(
            "request body exceeds the maximum allowed size of {} bytes",
            config.max_upload_size
        ))
    } else {
        AppError::BadRequest(message)
    }
}

fn read_error(e: io::Error, config: &UploadConfig) -> AppError {
    match e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<MultipartError>())
    {
        Some(multipart_error) => parse_error(multipart_error, config),
        None => {
            tracing::warn!("Error reading part: {}", e);
            AppError::BadRequest(e.to_string())
        }
    }
}
