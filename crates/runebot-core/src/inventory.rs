//! Inventory service client.
//!
//! Builds shared as links like `https://er-inventory.example/build?b=<id>`
//! are fetched from the service's JSON API and turned into [`Build`]s. The
//! client sits behind the [`InventoryClient`] trait so the bot can be driven
//! with canned records in tests.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use zeroize::Zeroizing;

use runebot_config::InventoryConfig;

use crate::BoxFuture;
use crate::build::{Build, BuildError};

/// Errors from talking to the inventory service.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("not an inventory build link: {0:?}")]
    InvalidLink(String),

    #[error("inventory service is not configured")]
    NotConfigured,

    #[error("network error: {0}")]
    Network(String),

    #[error("inventory service returned HTTP {status}")]
    Status { status: u16 },

    #[error("response parse error: {0}")]
    Decode(String),
}

/// Source of inventory build records.
pub trait InventoryClient: Send + Sync {
    /// Fetch the raw JSON record for `record_id`.
    fn fetch<'a>(&'a self, record_id: &'a str) -> BoxFuture<'a, Result<Value, FetchError>>;
}

/// Extract the record id from a build link (the `b` query parameter).
pub fn record_id_from_link(link: &str) -> Result<&str, FetchError> {
    let invalid = || FetchError::InvalidLink(link.to_string());
    let (_, query) = link.split_once("?b=").ok_or_else(invalid)?;
    let id = query.split(['&', '#']).next().unwrap_or_default();
    let well_formed = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if well_formed { Ok(id) } else { Err(invalid()) }
}

/// Parse the arguments of `!addbuild` (a build link) and fetch the build.
pub async fn fetch_build(client: &dyn InventoryClient, args: &str) -> Result<Build, BuildError> {
    let link = args.split_whitespace().next().unwrap_or_default();
    let record_id = record_id_from_link(link)?;
    let record = client.fetch(record_id).await?;
    Build::from_record(&record, link)
}

/// HTTP client for the inventory service's JSON API.
pub struct HttpInventoryClient {
    client: Client,
    api_url: String,
    auth_token: Zeroizing<String>,
}

impl HttpInventoryClient {
    /// Create a client for `api_url`; record ids are appended as a path
    /// segment.
    pub fn new(
        api_url: impl Into<String>,
        auth_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            auth_token: Zeroizing::new(auth_token.into()),
        })
    }

    pub fn from_config(config: &InventoryConfig) -> Result<Self, FetchError> {
        Self::new(
            config.api_url.clone(),
            config.auth_token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn record_url(&self, record_id: &str) -> String {
        format!("{}/{}", self.api_url, record_id)
    }
}

impl InventoryClient for HttpInventoryClient {
    fn fetch<'a>(&'a self, record_id: &'a str) -> BoxFuture<'a, Result<Value, FetchError>> {
        Box::pin(async move {
            if self.api_url.is_empty() {
                return Err(FetchError::NotConfigured);
            }
            let url = self.record_url(record_id);
            debug!(url = %url, "Inventory record request");

            let resp = self
                .client
                .get(&url)
                .header("authorization", self.auth_token.as_str())
                .header("content-type", "application/json; charset=utf-8")
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                });
            }

            resp.json::<Value>()
                .await
                .map_err(|e| FetchError::Decode(e.to_string()))
        })
    }
}
