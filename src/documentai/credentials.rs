//! Service-account credentials and OAuth2 access tokens for Google APIs.
//!
//! Tokens are minted with the JWT bearer grant (RS256 assertion signed with the
//! service account's private key) and cached until a minute before they expire.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion.
const ASSERTION_TTL_SECS: u64 = 3600;
/// Seconds before expiry at which a cached token is considered stale.
const REFRESH_MARGIN_SECS: u64 = 60;

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Single-slot access token cache. Concurrent refreshes are harmless: last write wins.
#[derive(Default)]
struct TokenCache {
    slot: Mutex<Option<(String, u64)>>,
}

impl TokenCache {
    /// Cached token if it is still fresh at `now`.
    fn fresh(&self, now: u64) -> Option<String> {
        let slot = self.slot.lock().unwrap();
        match slot.as_ref() {
            Some((token, expires_at)) if now < expires_at.saturating_sub(REFRESH_MARGIN_SECS) => {
                Some(token.clone())
            }
            _ => None,
        }
    }

    fn store(&self, token: String, expires_at: u64) {
        *self.slot.lock().unwrap() = Some((token, expires_at));
    }
}

pub struct ServiceAccountCredentials {
    client_email: String,
    token_uri: String,
    encoding_key: jsonwebtoken::EncodingKey,
    cache: TokenCache,
}

impl ServiceAccountCredentials {
    /// Load a service-account JSON key file and validate its private key.
    pub fn from_file(path: &Path) -> Result<Self> {
        let key_json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file {:?}", path))?;
        Self::from_json(&key_json)
            .with_context(|| format!("Invalid credentials file {:?}", path))
    }

    fn from_json(key_json: &str) -> Result<Self> {
        let key: ServiceAccountKey =
            serde_json::from_str(key_json).context("Failed to parse service account key")?;

        let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .context("Invalid RSA private key in service account JSON")?;

        Ok(Self {
            client_email: key.client_email,
            token_uri: key
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            encoding_key,
            cache: TokenCache::default(),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Access token for the cloud-platform scope, from cache or a fresh exchange.
    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String> {
        let now = now_secs();
        if let Some(token) = self.cache.fresh(now) {
            return Ok(token);
        }

        debug!("Exchanging JWT for access token ({})", self.client_email);
        let assertion = self.assertion(now)?;

        let resp: TokenResponse = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .context("Token exchange request failed")?
            .error_for_status()
            .context("Token exchange returned error")?
            .json()
            .await
            .context("Failed to parse token response")?;

        self.cache
            .store(resp.access_token.clone(), now + resp.expires_in);
        Ok(resp.access_token)
    }

    /// Signed RS256 assertion issued at `now`.
    fn assertion(&self, now: u64) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.token_uri,
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        jsonwebtoken::encode(&header, &claims, &self.encoding_key).context("Failed to encode JWT")
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
