use crate::api::error::AppError;
use crate::services::part_writer::PartSource;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// One file part of a multipart request, ready to be handed to a writer task
pub struct UploadPart {
    pub field_name: String,
    pub original_filename: String,
    /// Sanitized path relative to the upload root, '/'-separated
    pub name: String,
    pub destination: PathBuf,
    pub source: Box<dyn PartSource>,
}

impl UploadPart {
    pub fn new(
        field_name: impl Into<String>,
        original_filename: impl Into<String>,
        name: impl Into<String>,
        destination: PathBuf,
        source: Box<dyn PartSource>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            original_filename: original_filename.into(),
            name: name.into(),
            destination,
            source,
        }
    }
}

impl fmt::Debug for UploadPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadPart")
            .field("field_name", &self.field_name)
            .field("original_filename", &self.original_filename)
            .field("destination", &self.destination)
            .finish_non_exhaustive()
    }
}

/// Ordered parts of a single request; destinations are unique within it
#[derive(Debug, Default)]
pub struct UploadRequest {
    parts: Vec<UploadPart>,
    destinations: HashSet<PathBuf>,
}

impl UploadRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, destination: &Path) -> bool {
        self.destinations.contains(destination)
    }

    /// Adds a part, rejecting a second part that targets the same destination
    pub fn push(&mut self, part: UploadPart) -> Result<(), AppError> {
        if !self.destinations.insert(part.destination.clone()) {
            return Err(duplicate_destination(&part.original_filename, &part.name));
        }
        self.parts.push(part);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn into_parts(self) -> Vec<UploadPart> {
        self.parts
    }
}

pub(crate) fn duplicate_destination(original: &str, name: &str) -> AppError {
    AppError::InvalidFilename(format!(
        "filename '{}' collides with another part in this request (both map to '{}')",
        original, name
    ))
}

/// Stage of the copy at which a part failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    OpenSource,
    CreateDestination,
    Copy,
    /// The writer task panicked or was cancelled
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            FailureKind::OpenSource => "open_source",
            FailureKind::CreateDestination => "create_destination",
            FailureKind::Copy => "copy",
            FailureKind::Aborted => "aborted",
        };
        f.write_str(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl UploadFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub name: String,
    pub destination: PathBuf,
    pub bytes_written: u64,
}

/// Result of a single part writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success(WrittenFile),
    Failure(UploadFailure),
}

impl UploadOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, UploadOutcome::Failure(_))
    }
}

/// Request-level reduction of every part outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestResult {
    AllSucceeded(Vec<WrittenFile>),
    Failed(UploadFailure),
}

impl RequestResult {
    /// Failed iff at least one outcome failed; the first failure seen wins
    pub fn reduce(outcomes: impl IntoIterator<Item = UploadOutcome>) -> Self {
        let mut written = Vec::new();
        for outcome in outcomes {
            match outcome {
                UploadOutcome::Success(file) => written.push(file),
                UploadOutcome::Failure(failure) => return RequestResult::Failed(failure),
            }
        }
        RequestResult::AllSucceeded(written)
    }
}
