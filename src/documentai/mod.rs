//! Document AI processor abstraction.
//!
//! Defines the [`DocumentProcessor`] trait and the request/response types so the HTTP
//! layer can talk to the real [`DocumentAiClient`] or to a stub in tests.

mod client;
mod credentials;

pub use client::DocumentAiClient;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MIME type assumed when the upload did not declare one.
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

/// Location used when the caller does not pick one.
pub const DEFAULT_LOCATION: &str = "us";

/// One `process` call: which processor, and the raw document to send it.
#[derive(Debug, Clone)]
pub struct ProcessRequest {
    pub project_id: String,
    pub location: String,
    pub processor_id: String,
    pub content: Vec<u8>,
    pub mime_type: Option<String>,
}

impl ProcessRequest {
    /// Check that the identifiers are plain resource-name segments.
    ///
    /// `location` ends up in the endpoint host and all three end up in the path,
    /// so anything outside `[A-Za-z0-9_-]` is refused.
    pub fn validate(&self) -> Result<(), InvalidIdentifier> {
        for (field, value) in [
            ("project_id", &self.project_id),
            ("location", &self.location),
            ("processor_id", &self.processor_id),
        ] {
            if !is_resource_segment(value) {
                return Err(InvalidIdentifier {
                    field,
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Fully qualified processor resource name.
    pub fn resource_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/processors/{}",
            self.project_id, self.location, self.processor_id
        )
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE)
    }
}

#[derive(Debug, Error)]
#[error("invalid {field}: {value:?}")]
pub struct InvalidIdentifier {
    pub field: &'static str,
    pub value: String,
}

fn is_resource_segment(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Response of `processors.process`. Only the fields the gateway reads are typed;
/// everything is optional so a sparse response still decodes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessResponse {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub text: Option<String>,
}

/// The two fields returned to HTTP clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub name: Option<String>,
    pub document_text: Option<String>,
}

impl From<ProcessResponse> for DocumentSummary {
    fn from(response: ProcessResponse) -> Self {
        Self {
            name: response.name,
            document_text: response.document.and_then(|d| d.text),
        }
    }
}

/// Async trait implemented by anything that can run a document through a processor.
#[async_trait::async_trait]
pub trait DocumentProcessor: Send + Sync {
    async fn process(&self, request: ProcessRequest) -> anyhow::Result<ProcessResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mime_type: Option<&str>) -> ProcessRequest {
        ProcessRequest {
            project_id: "my-project".to_string(),
            location: "eu".to_string(),
            processor_id: "abc123".to_string(),
            content: b"%PDF".to_vec(),
            mime_type: mime_type.map(str::to_string),
        }
    }

    #[test]
    fn test_resource_name() {
        assert_eq!(
            request(None).resource_name(),
            "projects/my-project/locations/eu/processors/abc123"
        );
    }

    #[test]
    fn test_mime_type_defaults_to_pdf() {
        assert_eq!(request(None).mime_type(), "application/pdf");
        assert_eq!(request(Some("image/tiff")).mime_type(), "image/tiff");
    }

    #[test]
    fn test_validate_accepts_resource_segments() {
        assert!(request(None).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_host_and_path_injection() {
        for (project, location, processor) in [
            ("p", "attacker.example/#", "x"),
            ("p", "us.evil", "x"),
            ("p", "", "x"),
            ("p/../q", "us", "x"),
            ("p", "us", "x:process?"),
            ("p", "us", "x y"),
        ] {
            let mut req = request(None);
            req.project_id = project.to_string();
            req.location = location.to_string();
            req.processor_id = processor.to_string();
            assert!(req.validate().is_err(), "accepted {:?}", req.resource_name());
        }

        let mut req = request(None);
        req.location = "attacker.example/#".to_string();
        let err = req.validate().unwrap_err();
        assert_eq!(err.field, "location");
    }

    #[test]
    fn test_summary_from_full_response() {
        let response: ProcessResponse = serde_json::from_str(
            r#"{
                "name": "projects/p/locations/us/processors/x",
                "document": {"text": "Invoice 42\n", "mimeType": "application/pdf", "pages": [{}]},
                "humanReviewStatus": {"state": "SKIPPED"}
            }"#,
        )
        .unwrap();

        let summary = DocumentSummary::from(response);
        assert_eq!(
            summary.name.as_deref(),
            Some("projects/p/locations/us/processors/x")
        );
        assert_eq!(summary.document_text.as_deref(), Some("Invoice 42\n"));
    }

    #[test]
    fn test_summary_tolerates_missing_fields() {
        let summary = DocumentSummary::from(serde_json::from_str::<ProcessResponse>("{}").unwrap());
        assert_eq!(
            summary,
            DocumentSummary {
                name: None,
                document_text: None
            }
        );

        let no_text: ProcessResponse =
            serde_json::from_str(r#"{"document": {"mimeType": "image/png"}}"#).unwrap();
        assert_eq!(DocumentSummary::from(no_text).document_text, None);
    }
}
