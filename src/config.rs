//! Server configuration loaded from the environment.
//!
//! The Document AI credentials are not part of this struct: they are read lazily
//! by [`crate::documentai::DocumentAiClient`] on the first call that needs them.

use anyhow::{Context, Result};
use std::net::SocketAddr;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_MAX_UPLOAD_MB: usize = 100;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Upper bound for a whole request body, in bytes.
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Read `BIND_ADDR` and `MAX_UPLOAD_MB`, falling back to defaults when unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .with_context(|| format!("Invalid BIND_ADDR: {}", bind_addr))?;

        let max_upload_mb = match lookup("MAX_UPLOAD_MB") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid MAX_UPLOAD_MB: {}", raw))?,
            None => DEFAULT_MAX_UPLOAD_MB,
        };

        if max_upload_mb == 0 {
            anyhow::bail!("MAX_UPLOAD_MB must be greater than zero");
        }

        Ok(Self {
            bind_addr,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }
}
