use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::record::CertificateRecord;
use crate::config::{ConfigError, RegistryConfig, RegistryCredentials};

/// Upstream certificate registry contract. Both operations return the raw
/// candidate rows; selection happens in the resolver.
#[async_trait]
pub trait CertificateRegistry: Send + Sync {
    async fn search_by_identifier(
        &self,
        property_ref: &str,
    ) -> Result<Vec<CertificateRecord>, RegistryError>;

    async fn search_by_postcode(
        &self,
        postcode: &str,
        max_results: usize,
    ) -> Result<Vec<CertificateRecord>, RegistryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("certificate registry returned status {0}")]
    Status(u16),
    #[error("certificate registry request failed")]
    Transport(#[source] reqwest::Error),
    #[error("certificate registry response could not be decoded")]
    Decode(#[source] serde_json::Error),
    #[error("certificate registry still failing after {0} retries")]
    RetriesExhausted(u32),
}

/// Bounded retry schedule for transient upstream failures (429 and 5xx).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(300),
        }
    }
}

/// Registry client speaking the domestic-certificate search API.
pub struct HttpCertificateRegistry {
    client: reqwest::Client,
    base_url: String,
    auth_header: String,
    retry: RetryPolicy,
}

impl HttpCertificateRegistry {
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ConfigError> {
        let auth_header = match &config.credentials {
            Some(RegistryCredentials::BasicToken(token)) => token.clone(),
            Some(RegistryCredentials::UserPassword { username, password }) => {
                format!("Basic {}", BASE64.encode(format!("{username}:{password}")))
            }
            None => return Err(ConfigError::MissingRegistryCredentials),
        };

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn search(
        &self,
        query: &[(&str, String)],
    ) -> Result<Vec<CertificateRecord>, RegistryError> {
        let url = format!("{}/search", self.base_url);

        for attempt in 0..=self.retry.max_retries {
            let response = self
                .client
                .get(&url)
                .query(query)
                .header(reqwest::header::AUTHORIZATION, &self.auth_header)
                .header(reqwest::header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(RegistryError::Transport)?;

            let status = response.status();
            if status.is_success() {
                let body = response.text().await.map_err(RegistryError::Transport)?;
                // The upstream answers a no-result search with an empty body.
                if body.trim().is_empty() {
                    return Ok(Vec::new());
                }
                let parsed: SearchBody =
                    serde_json::from_str(&body).map_err(RegistryError::Decode)?;
                return Ok(parsed.into_rows());
            }

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                let delay = self.retry.delay(attempt);
                debug!(%status, attempt, ?delay, "transient registry failure, backing off");
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(RegistryError::Status(status.as_u16()));
        }

        Err(RegistryError::RetriesExhausted(self.retry.max_retries))
    }
}

#[async_trait]
impl CertificateRegistry for HttpCertificateRegistry {
    async fn search_by_identifier(
        &self,
        property_ref: &str,
    ) -> Result<Vec<CertificateRecord>, RegistryError> {
        self.search(&[("uprn", property_ref.to_string())]).await
    }

    async fn search_by_postcode(
        &self,
        postcode: &str,
        max_results: usize,
    ) -> Result<Vec<CertificateRecord>, RegistryError> {
        self.search(&[
            ("postcode", postcode.to_string()),
            ("size", max_results.to_string()),
        ])
        .await
    }
}

/// The registry emits either a bare array of rows or a `rows` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum SearchBody {
    Envelope { rows: Vec<CertificateRecord> },
    Bare(Vec<CertificateRecord>),
}

impl SearchBody {
    fn into_rows(self) -> Vec<CertificateRecord> {
        match self {
            SearchBody::Envelope { rows } => rows,
            SearchBody::Bare(rows) => rows,
        }
    }
}
