//! Lazily connected Document AI REST client.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::credentials::ServiceAccountCredentials;
use super::{DocumentProcessor, ProcessRequest, ProcessResponse};

/// Environment variable naming the service-account key file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Document AI client is not configured: {0}")]
    Configuration(String),
}

/// Where the service-account key comes from.
#[derive(Debug, Clone)]
enum CredentialsSource {
    Env,
    File(PathBuf),
}

/// Connection state created on first use.
struct Connection {
    http: Client,
    credentials: ServiceAccountCredentials,
}

/// Document AI client that defers loading credentials until the first `process` call.
///
/// The connection is built at most once. A failed attempt leaves the client
/// unconnected and the next call tries again; concurrent first calls wait on a
/// single attempt instead of racing.
pub struct DocumentAiClient {
    source: CredentialsSource,
    connection: OnceCell<Connection>,
}

impl Default for DocumentAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAiClient {
    /// Client that reads `GOOGLE_APPLICATION_CREDENTIALS` when it first connects.
    pub fn new() -> Self {
        Self {
            source: CredentialsSource::Env,
            connection: OnceCell::new(),
        }
    }

    /// Client that loads the key from an explicit path.
    #[cfg(test)]
    pub fn with_credentials_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: CredentialsSource::File(path.into()),
            ..Self::new()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.initialized()
    }

    async fn connection(&self) -> Result<&Connection> {
        self.connection
            .get_or_try_init(|| async { self.connect() })
            .await
    }

    fn connect(&self) -> Result<Connection> {
        let path = match &self.source {
            CredentialsSource::File(path) => path.clone(),
            CredentialsSource::Env => std::env::var_os(CREDENTIALS_ENV)
                .map(PathBuf::from)
                .ok_or_else(|| {
                    ClientError::Configuration(format!("{} is not set", CREDENTIALS_ENV))
                })?,
        };

        let credentials = ServiceAccountCredentials::from_file(&path)
            .map_err(|e| ClientError::Configuration(format!("{:#}", e)))?;

        info!(
            "Document AI client initialized for {}",
            credentials.client_email()
        );

        Ok(Connection {
            http: Client::new(),
            credentials,
        })
    }

    /// Regional `:process` endpoint. Refuses identifiers that could leave the
    /// `*-documentai.googleapis.com` host or the processor path.
    fn process_url(request: &ProcessRequest) -> Result<String> {
        request.validate()?;
        Ok(format!(
            "https://{}-documentai.googleapis.com/v1/{}:process",
            request.location,
            request.resource_name()
        ))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequestBody<'a> {
    raw_document: RawDocument<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument<'a> {
    content: String,
    mime_type: &'a str,
}

#[async_trait::async_trait]
impl DocumentProcessor for DocumentAiClient {
    async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse> {
        let url = Self::process_url(&request)?;

        if !self.is_connected() {
            debug!("Document AI client not connected yet, connecting");
        }
        let connection = self.connection().await?;
        let token = connection.credentials.access_token(&connection.http).await?;

        let body = ProcessRequestBody {
            raw_document: RawDocument {
                content: BASE64.encode(&request.content),
                mime_type: request.mime_type(),
            },
        };

        debug!(
            "Calling Document AI: {} ({} bytes, {})",
            request.resource_name(),
            request.content.len(),
            request.mime_type()
        );

        let response = connection
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Document AI")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Document AI API error ({}): {}", status, error_text);
        }

        let parsed: ProcessResponse = response
            .json()
            .await
            .context("Failed to parse Document AI response")?;

        info!(
            "Document AI processed {} ({} chars of text)",
            request.resource_name(),
            parsed
                .document
                .as_ref()
                .and_then(|d| d.text.as_ref())
                .map(|t| t.len())
                .unwrap_or(0)
        );

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documentai::credentials::tests::service_account_json;
    use std::io::Write;

    fn request(location: &str) -> ProcessRequest {
        ProcessRequest {
            project_id: "proj".to_string(),
            location: location.to_string(),
            processor_id: "proc".to_string(),
            content: b"%PDF-1.4".to_vec(),
            mime_type: None,
        }
    }

    fn client_with_test_key() -> (DocumentAiClient, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(service_account_json().as_bytes()).unwrap();
        (DocumentAiClient::with_credentials_file(file.path()), file)
    }

    #[test]
    fn test_regional_process_url() {
        assert_eq!(
            DocumentAiClient::process_url(&request("us")).unwrap(),
            "https://us-documentai.googleapis.com/v1/projects/proj/locations/us/processors/proc:process"
        );
        assert_eq!(
            DocumentAiClient::process_url(&request("eu")).unwrap(),
            "https://eu-documentai.googleapis.com/v1/projects/proj/locations/eu/processors/proc:process"
        );
    }

    #[test]
    fn test_process_url_keeps_google_host() {
        for location in ["attacker.example/#", "attacker.example/%23", "us.evil.com", "us@evil"] {
            assert!(DocumentAiClient::process_url(&request(location)).is_err());
        }
    }

    #[tokio::test]
    async fn test_invalid_location_rejected_before_connecting() {
        let (client, _key) = client_with_test_key();
        let err = client
            .process(request("attacker.example/#"))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("invalid location"));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_connection_is_built_once_and_reused() {
        let (client, _key) = client_with_test_key();
        assert!(!client.is_connected());

        let (first, second) = tokio::join!(client.connection(), client.connection());
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(std::ptr::eq(first, second));
        assert!(client.is_connected());

        let third = client.connection().await.unwrap();
        assert!(std::ptr::eq(first, third));
        assert_eq!(
            third.credentials.client_email(),
            "gateway@test-project.iam.gserviceaccount.com"
        );
    }

    #[tokio::test]
    async fn test_failed_attempt_then_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        let client = DocumentAiClient::with_credentials_file(&path);

        assert!(client.connection().await.is_err());
        assert!(!client.is_connected());

        std::fs::write(&path, service_account_json()).unwrap();
        assert!(client.connection().await.is_ok());
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_construction_failure_is_not_cached() {
        let client = DocumentAiClient::with_credentials_file("/nonexistent/service-account.json");

        for _ in 0..2 {
            let err = client.process(request("us")).await.err().unwrap();
            assert!(matches!(
                err.downcast_ref::<ClientError>(),
                Some(ClientError::Configuration(_))
            ));
            assert!(!client.is_connected());
        }
    }

    #[tokio::test]
    async fn test_invalid_key_is_a_configuration_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"client_email": "svc@example.com", "private_key": "garbage"}"#)
            .unwrap();

        let client = DocumentAiClient::with_credentials_file(file.path());
        let err = client.process(request("us")).await.err().unwrap();
        assert!(err.to_string().starts_with("Document AI client is not configured"));
        assert!(!client.is_connected());
    }

    #[test]
    fn test_request_body_shape() {
        let body = ProcessRequestBody {
            raw_document: RawDocument {
                content: BASE64.encode(b"hi"),
                mime_type: "application/pdf",
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "rawDocument": {"content": "aGk=", "mimeType": "application/pdf"}
            })
        );
    }
}
