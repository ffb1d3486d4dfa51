//! Have I Been Pwned breach lookup.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use peat_core::constants::USER_AGENT;
use peat_core::error::{PeatError, Result};
use peat_core::traits::BreachLookup;
use peat_core::types::{sort_breaches, BreachRecord};

const SOURCE: &str = "hibp";

/// HIBP client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HibpConfig {
    /// API base URL
    pub base_url: String,
    /// API key sent as `hibp-api-key`
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for HibpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://haveibeenpwned.com/api/v3".into(),
            api_key: None,
            timeout_seconds: 30,
        }
    }
}

impl HibpConfig {
    /// Creates a config for the public API with the given key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Overrides the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Breach lookup over the HIBP v3 API.
pub struct HibpClient {
    config: HibpConfig,
    http_client: reqwest::Client,
}

impl HibpClient {
    /// Creates a client with the given config.
    pub fn new(config: HibpConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PeatError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn breached_account_url(&self, email: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| PeatError::ConfigError(format!("Invalid HIBP base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PeatError::ConfigError("HIBP base URL cannot have a path".into()))?
            .pop_if_empty()
            .push("breachedaccount")
            .push(email);
        url.query_pairs_mut().append_pair("truncateResponse", "false");
        Ok(url)
    }
}

#[async_trait]
impl BreachLookup for HibpClient {
    #[instrument(skip(self, email))]
    async fn lookup(&self, email: &str) -> Result<Vec<BreachRecord>> {
        let url = self.breached_account_url(email)?;

        let mut request = self.http_client.get(url);
        if let Some(key) = &self.config.api_key {
            request = request.header("hibp-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PeatError::HttpError(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("no breaches on record");
                return Ok(Vec::new());
            }
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("HIBP breach lookup rate limited");
                return Ok(Vec::new());
            }
            status if !status.is_success() => {
                let text = response.text().await.unwrap_or_default();
                return Err(PeatError::source_failed(
                    SOURCE,
                    format!("HTTP {}: {}", status, text),
                ));
            }
            _ => {}
        }

        let raw: Vec<HibpBreach> = response
            .json()
            .await
            .map_err(|e| PeatError::source_failed(SOURCE, format!("invalid response body: {}", e)))?;

        let mut breaches: Vec<BreachRecord> = raw.into_iter().map(HibpBreach::into_record).collect();
        sort_breaches(&mut breaches);

        debug!(count = breaches.len(), "breaches found");
        Ok(breaches)
    }
}

/// Breach as returned by the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HibpBreach {
    #[serde(default)]
    name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    breach_date: Option<String>,
    #[serde(default)]
    data_classes: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    pwn_count: u64,
    #[serde(default)]
    is_verified: bool,
}

impl HibpBreach {
    fn into_record(self) -> BreachRecord {
        let date = self
            .breach_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        let title = self.title.filter(|t| !t.is_empty()).unwrap_or(self.name);

        let mut record = BreachRecord::new(title, self.domain, date, self.data_classes)
            .with_pwn_count(self.pwn_count, self.is_verified);
        record.description = self.description;
        record
    }
}
