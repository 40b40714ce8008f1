//! Rucio replication rule lookups.

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::errors::{CatalogProviderError, CatalogResult};
use crate::http;

const AUTH_HEADER: &str = "X-Rucio-Auth-Token";

#[derive(Debug, Deserialize)]
struct RuleDoc {
    #[serde(default)]
    state: String,
}

/// Token-authenticated Rucio REST client.
#[derive(Debug, Clone)]
pub struct RucioClient {
    client: reqwest::Client,
    base: String,
}

impl RucioClient {
    /// Builds a client when both `RUCIO_URL` and `RUCIO_AUTH_TOKEN` are configured.
    pub fn from_config(cfg: &ClientConfig) -> CatalogResult<Option<Self>> {
        let (Some(url), Some(token)) = (&cfg.rucio_url, &cfg.rucio_token) else {
            return Ok(None);
        };

        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(token).map_err(|e| {
            CatalogProviderError::InvalidResponse(format!("bad rucio token header: {e}"))
        })?;
        headers.insert(AUTH_HEADER, value);

        let client = http::build_client(cfg.timeout, None, headers)?;
        debug!("Creating RucioClient for {}", url);
        Ok(Some(Self {
            client,
            base: url.clone(),
        }))
    }

    /// Upper-cased state of a replication rule.
    #[instrument(skip(self))]
    pub async fn rule_state(&self, rule_id: &str) -> CatalogResult<String> {
        let url = format!("{}/rules/{}", self.base, rule_id);
        let rule: RuleDoc = http::get_json(&self.client, &url)
            .await?
            .ok_or_else(|| CatalogProviderError::InvalidResponse(format!("no rule {rule_id}")))?;
        Ok(rule.state.to_uppercase())
    }
}
