//! Request management (McM) REST client.

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::errors::{CatalogProviderError, CatalogResult};
use crate::http;

#[derive(Debug, Deserialize)]
struct McmEnvelope<T> {
    results: Option<T>,
}

/// Read-only McM client.
#[derive(Debug, Clone)]
pub struct McmClient {
    client: reqwest::Client,
    base: String,
}

impl McmClient {
    pub fn new(cfg: &ClientConfig) -> CatalogResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &cfg.mcm_cookie {
            let value = HeaderValue::from_str(cookie).map_err(|e| {
                CatalogProviderError::InvalidResponse(format!("bad MCM_COOKIE header: {e}"))
            })?;
            headers.insert(COOKIE, value);
        } else {
            warn!("MCM_COOKIE not set, McM requests are anonymous");
        }

        let client = http::build_client(cfg.timeout, None, headers)?;
        debug!("Creating McmClient for {}", cfg.mcm_url);
        Ok(Self {
            client,
            base: cfg.mcm_url.clone(),
        })
    }

    /// All objects of `database` matching `query` (e.g. `prepid=*GEN*&dataset_name=/A/B/C`).
    #[instrument(skip(self))]
    pub async fn search<T: DeserializeOwned>(
        &self,
        database: &str,
        query: &str,
    ) -> CatalogResult<Vec<T>> {
        let url = format!("{}/search/?db_name={}&page=-1&{}", self.base, database, query);
        let resp: Option<McmEnvelope<Vec<T>>> = http::get_json(&self.client, &url).await?;
        Ok(resp.and_then(|r| r.results).unwrap_or_default())
    }

    /// Single object by prepid, `None` if McM does not know it.
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(
        &self,
        database: &str,
        prepid: &str,
    ) -> CatalogResult<Option<T>> {
        let url = format!("{}/public/restapi/{}/get/{}", self.base, database, prepid);
        let resp: Option<McmEnvelope<serde_json::Value>> =
            http::get_json(&self.client, &url).await?;
        match resp.and_then(|r| r.results) {
            // McM answers `{"results": {}}` for unknown prepids
            Some(serde_json::Value::Object(map)) if map.is_empty() => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::McmRequest;

    #[test]
    fn envelope_with_results_list() {
        let env: McmEnvelope<Vec<McmRequest>> = serde_json::from_str(
            r#"{"results": [{"prepid": "HIG-RunIISummer20UL18GEN-00001", "member_of_chain": ["c1"]}]}"#,
        )
        .unwrap();
        let reqs = env.results.unwrap();
        assert_eq!(reqs[0].member_of_chain, vec!["c1"]);
        assert_eq!(reqs[0].total_events, 0);
    }

    #[test]
    fn invalid_cookie_is_rejected() {
        let cfg = ClientConfig {
            mcm_cookie: Some("bad\ncookie".into()),
            ..ClientConfig::default()
        };
        assert!(McmClient::new(&cfg).is_err());
    }
}
