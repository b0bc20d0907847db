//! External API fetcher for enrichment data.
//!
//! Performs the single bounded-timeout GET per job and validates that the
//! response is a non-empty JSON list of objects. Retry policy, if any, is
//! the caller's concern; a failed fetch fails the job.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// One record from the external API: a flat field-name-to-value mapping.
pub type ApiRecord = serde_json::Map<String, Value>;

/// Errors raised by the external fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("external API unreachable: {0}")]
    Unreachable(String),

    #[error("external API response has invalid shape: {0}")]
    InvalidShape(String),
}

/// HTTP client wrapper for the enrichment fetch.
#[derive(Clone)]
pub struct ExternalFetcher {
    client: Client,
}

impl ExternalFetcher {
    /// Build a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Fetch and validate the enrichment records from `url`.
    pub async fn fetch(&self, url: &str) -> Result<Vec<ApiRecord>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unreachable(format!(
                "HTTP status {status} from {url}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let value: Value = serde_json::from_slice(&body)
            .map_err(|_| FetchError::InvalidShape("response body is not valid JSON".to_string()))?;

        let records = validate_payload(value)?;
        debug!(url, records = records.len(), "Fetched enrichment records");
        Ok(records)
    }
}

/// Validate that a parsed response body is a non-empty list of objects.
///
/// Rejects empty lists, lists of scalars, and lists of lists.
pub fn validate_payload(value: Value) -> Result<Vec<ApiRecord>, FetchError> {
    let Value::Array(items) = value else {
        return Err(FetchError::InvalidShape(
            "response must be a JSON list of objects".to_string(),
        ));
    };

    if items.is_empty() {
        return Err(FetchError::InvalidShape(
            "response list is empty".to_string(),
        ));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(FetchError::InvalidShape(format!(
                "element {position} is not an object"
            ))),
        })
        .collect()
}
