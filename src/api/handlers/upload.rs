use crate::AppState;
use crate::api::error::AppError;
use crate::models::{RequestResult, WrittenFile};
use axum::extract::{Multipart, State};

#[utoipa::path(
    post,
    path = "/upload",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "One or more file parts under any field names"
    ),
    responses(
        (status = 200, description = "Every part was written", body = String),
        (status = 400, description = "Malformed, oversized, or conflicting upload"),
        (status = 500, description = "A part could not be written or storage is unavailable")
    ),
    tag = "upload"
)]
pub async fn upload_files(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<String, AppError> {
    match state.coordinator.handle(multipart).await? {
        RequestResult::AllSucceeded(files) => Ok(render_success(&files)),
        RequestResult::Failed(failure) => Err(AppError::Upload(failure.message)),
    }
}

fn render_success(files: &[WrittenFile]) -> String {
    let mut body = String::new();
    for file in files {
        body.push_str("Uploaded file: ");
        body.push_str(&file.name);
        body.push('\n');
    }
    body.push_str("all files uploaded successfully");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_success() {
        let files = vec![
            WrittenFile {
                name: "a.txt".to_string(),
                destination: PathBuf::from("uploads/a.txt"),
                bytes_written: 1,
            },
            WrittenFile {
                name: "docs_b.txt".to_string(),
                destination: PathBuf::from("uploads/docs_b.txt"),
                bytes_written: 2,
            },
        ];

        assert_eq!(
            render_success(&files),
            "Uploaded file: a.txt\nUploaded file: docs_b.txt\nall files uploaded successfully"
        );
    }
}
