//! Utility functions for common operations

use crate::error::FetchError;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Build the shared HTTP client with a per-request timeout
pub fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("energy-factbook/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Download a text body via HTTP
pub async fn http_get(client: &Client, url: &str) -> Result<String, FetchError> {
    debug!("Downloading from {}", url);

    let response = client.get(url).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let text = response.text().await?;
    info!("Downloaded {} bytes", text.len());
    Ok(text)
}

/// GET with query parameters and decode the JSON body
pub async fn fetch_json(
    client: &Client,
    url: &str,
    params: &[(&str, &str)],
) -> Result<serde_json::Value, FetchError> {
    debug!("Querying {} with {:?}", url, params);

    let response = client.get(url).query(params).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// First `max` characters of a body, for error messages
pub fn snippet(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("Failed to get table", 6), "Failed");
        assert_eq!(snippet("é1", 5), "é1");
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(Duration::from_secs(5)).is_ok());
    }
}
