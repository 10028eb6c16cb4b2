//! Reading a single uploaded file out of a multipart request.

use axum::extract::Multipart;
use tracing::info;

use crate::error::ApiError;

/// Name of the multipart field carrying the upload.
pub const FILE_FIELD: &str = "file";

/// A file as received from the client. Lives for the duration of one request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Pull the `file` field out of the form. Other fields are skipped.
    pub async fn from_multipart(multipart: &mut Multipart) -> Result<Self, ApiError> {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Multipart error: {}", e)))?
        {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }

            let filename = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(|s| s.to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?
                .to_vec();

            info!(
                "Received file: {} ({} bytes, content_type={})",
                filename,
                data.len(),
                content_type.as_deref().unwrap_or("<none>")
            );

            return Ok(Self {
                filename,
                content_type,
                data,
            });
        }

        Err(ApiError::bad_request(format!(
            "Missing multipart field '{}'",
            FILE_FIELD
        )))
    }

    pub fn content_type_str(&self) -> &str {
        self.content_type.as_deref().unwrap_or("")
    }
}
