//! Shared GET-with-retries helper for the JSON service clients.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::errors::{CatalogProviderError, CatalogResult};

/// Number of attempts for transport-level failures.
pub const CONNECTION_ATTEMPTS: usize = 3;

/// Builds a client with JSON `Accept` header and the configured timeout.
pub fn build_client(
    timeout: Duration,
    identity: Option<reqwest::Identity>,
    extra_headers: HeaderMap,
) -> CatalogResult<reqwest::Client> {
    let mut headers = extra_headers;
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(headers);
    if let Some(identity) = identity {
        builder = builder.identity(identity);
    }
    Ok(builder.build()?)
}

/// Escapes characters that break request paths (`#` in workflow and dataset names).
pub fn escape_path(url: &str) -> String {
    url.replace('#', "%23")
}

/// GETs `url` and decodes the body.
///
/// Transport errors are retried up to [`CONNECTION_ATTEMPTS`] times. A non-200
/// answer is logged and reported as `Ok(None)`.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> CatalogResult<Option<T>> {
    let url = escape_path(url);
    let mut last_err = None;

    for attempt in 1..=CONNECTION_ATTEMPTS {
        debug!(attempt, "GET {}", url);
        let resp = match client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(attempt, error = %e, "request to {} failed", url);
                last_err = Some(e);
                continue;
            }
        };

        let status = resp.status();
        if status.as_u16() != 200 {
            let body = resp.text().await.unwrap_or_default();
            info!(status = status.as_u16(), "problems with GET {}: {}", url, body.trim());
            return Ok(None);
        }

        let bytes = resp.bytes().await?;
        let value = serde_json::from_slice::<T>(&bytes)?;
        return Ok(Some(value));
    }

    error!(
        "connection to {} failed after {} attempts",
        url, CONNECTION_ATTEMPTS
    );
    Err(match last_err {
        Some(e) => CatalogProviderError::from(e).into(),
        None => CatalogProviderError::Network(format!("no attempt made for {url}")).into(),
    })
}
