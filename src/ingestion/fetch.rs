//! Fetch functions - retrieve StatCan tables, page text and ArcGIS JSON

use crate::error::FetchError;
use crate::ingestion::table::Table;
use crate::ingestion::utils::{http_get, snippet};
use reqwest::Client;
use tracing::{info, warn};

pub use crate::ingestion::utils::fetch_json;

const TRANSLATED: &str = "downloadDbLoadingData.action";
const NON_TRANSLATED: &str = "downloadDbLoadingData-nonTraduit.action";

/// Reject bodies that are StatCan error pages rather than CSV
pub fn validate_body(text: &str) -> Result<(), FetchError> {
    if text.contains("Failed to get") || text.to_lowercase().contains("<html") {
        return Err(FetchError::ErrorPage(snippet(text, 200)));
    }
    Ok(())
}

/// Fetch one URL and parse it as a CSV table of at least 3 columns
pub async fn fetch_table(client: &Client, url: &str) -> Result<Table, FetchError> {
    let text = http_get(client, url).await?;
    validate_body(&text)?;

    let table = Table::from_csv(&text)?;
    if table.headers.len() < 3 {
        return Err(FetchError::TooFewColumns(table.headers.len()));
    }

    Ok(table)
}

/// The translated/non-translated twin of a StatCan download URL
pub fn alternate_url(url: &str) -> Option<String> {
    if url.contains(NON_TRANSLATED) {
        Some(url.replace(NON_TRANSLATED, TRANSLATED))
    } else if url.contains(TRANSLATED) {
        Some(url.replace(TRANSLATED, NON_TRANSLATED))
    } else {
        None
    }
}

/// Fetch a StatCan table, retrying once against the alternate endpoint
pub async fn fetch_statcan_table(client: &Client, url: &str) -> Result<Table, FetchError> {
    info!("Fetching data from StatCan...");

    let first = match fetch_table(client, url).await {
        Ok(table) => return Ok(table),
        Err(e) => e,
    };

    if let Some(alt) = alternate_url(url) {
        warn!("Primary URL failed ({}), trying alternative...", first);
        match fetch_table(client, &alt).await {
            Ok(table) => return Ok(table),
            Err(e) => warn!("Alternative URL failed: {}", e),
        }
    }

    Err(FetchError::Exhausted {
        url: url.to_string(),
        source: Box::new(first),
    })
}

/// Fetch a plain-text or HTML body
pub async fn fetch_text(client: &Client, url: &str) -> Result<String, FetchError> {
    http_get(client, url).await
}
