//! HTTP routes and handlers.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection,
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::StatusCode,
    response::{Html, Json, Redirect},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::documentai::{DocumentProcessor, DocumentSummary, ProcessRequest, DEFAULT_LOCATION};
use crate::error::ApiError;
use crate::image_info::{inspect_image, is_image_content_type};
use crate::pdf_info::{inspect_pdf, is_pdf_content_type};
use crate::upload::UploadedFile;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<dyn DocumentProcessor>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(root))
        .route("/docs", get(docs))
        .route("/favicon.ico", get(favicon))
        .route("/process-image", post(process_image))
        .route("/process-pdf", post(process_pdf))
        .route("/documentai/process", post(documentai_process))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn root() -> Redirect {
    Redirect::temporary("/docs")
}

async fn docs() -> Html<&'static str> {
    Html(DOCS_PAGE)
}

/// Browsers ask for this on every page load; answer with no content instead of 404.
async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
struct ImageResponse {
    filename: String,
    content_type: String,
    width: u32,
    height: u32,
    mode: String,
}

/// Decode an uploaded image and report its size and pixel mode.
async fn process_image(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageResponse>, ApiError> {
    let mut multipart = multipart?;
    let file = UploadedFile::from_multipart(&mut multipart).await?;

    if !is_image_content_type(file.content_type_str()) {
        return Err(ApiError::bad_request("Uploaded file is not an image"));
    }

    let info = inspect_image(&file.data)
        .map_err(|e| ApiError::bad_request(format!("Failed to open image: {:#}", e)))?;

    info!(
        "Image {}: {}x{} {}",
        file.filename, info.width, info.height, info.mode
    );

    Ok(Json(ImageResponse {
        content_type: file.content_type_str().to_string(),
        filename: file.filename,
        width: info.width,
        height: info.height,
        mode: info.mode,
    }))
}

#[derive(Debug, Serialize)]
struct PdfResponse {
    filename: String,
    pages: usize,
    first_page_text_preview: String,
}

/// Parse an uploaded PDF and report its page count and a first-page preview.
async fn process_pdf(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PdfResponse>, ApiError> {
    let mut multipart = multipart?;
    let file = UploadedFile::from_multipart(&mut multipart).await?;

    if !is_pdf_content_type(file.content_type_str()) {
        return Err(ApiError::bad_request("Uploaded file is not a PDF"));
    }

    let info = inspect_pdf(&file.data)
        .map_err(|e| ApiError::bad_request(format!("Failed to read PDF: {:#}", e)))?;

    info!("PDF {}: {} pages", file.filename, info.pages);

    Ok(Json(PdfResponse {
        filename: file.filename,
        pages: info.pages,
        first_page_text_preview: info.first_page_text_preview,
    }))
}

#[derive(Debug, Deserialize)]
struct DocumentAiQuery {
    #[serde(default)]
    project_id: String,
    #[serde(default = "default_location")]
    location: String,
    #[serde(default)]
    processor_id: String,
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

/// Forward an upload to a Document AI processor and return its name and text.
async fn documentai_process(
    State(state): State<AppState>,
    query: Result<Query<DocumentAiQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DocumentSummary>, ApiError> {
    let Query(query) = query?;
    if query.project_id.is_empty() || query.processor_id.is_empty() {
        return Err(ApiError::bad_request(
            "project_id and processor_id are required as query params",
        ));
    }

    let mut request = ProcessRequest {
        project_id: query.project_id,
        location: query.location,
        processor_id: query.processor_id,
        content: Vec::new(),
        mime_type: None,
    };
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut multipart = multipart?;
    let file = UploadedFile::from_multipart(&mut multipart).await?;
    request.content = file.data;
    request.mime_type = file.content_type;

    let response = state
        .processor
        .process(request)
        .await
        .map_err(|e| ApiError::internal(format!("Document AI processing failed: {:#}", e)))?;

    Ok(Json(DocumentSummary::from(response)))
}

const DOCS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Document AI Example</title></head>
<body>
<h1>Document AI Example</h1>
<ul>
  <li><code>GET /health</code> &mdash; liveness check, returns <code>{"status": "ok"}</code></li>
  <li><code>POST /process-image</code> &mdash; multipart field <code>file</code> (image/*); returns filename, content_type, width, height, mode</li>
  <li><code>POST /process-pdf</code> &mdash; multipart field <code>file</code> (application/pdf); returns filename, pages, first_page_text_preview</li>
  <li><code>POST /documentai/process?project_id=&amp;location=us&amp;processor_id=</code> &mdash; multipart field <code>file</code>; returns name, document_text. Requires <code>GOOGLE_APPLICATION_CREDENTIALS</code>.</li>
</ul>
</body>
</html>
"#;
