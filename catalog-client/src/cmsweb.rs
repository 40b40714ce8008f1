//! cmsweb client authenticated with the user grid certificate.
//!
//! - `GET /couchdb/reqmgr_workload_cache/<workflow>`: run/lumi whitelist of a workload
//! - `GET /ms-transferor/data/info?request=<workflow>`: input transfer document

use std::fs;

use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::{CertPair, ClientConfig};
use crate::errors::{CatalogConfigError, CatalogResult};
use crate::http;
use crate::types::{ReqMgrWorkload, TransferorInfo};

/// HTTPS client for cmsweb services.
#[derive(Debug, Clone)]
pub struct CmswebClient {
    client: reqwest::Client,
    base: String,
}

#[derive(Debug, Deserialize)]
struct TransferorResponse {
    #[serde(default)]
    result: Vec<TransferorInfo>,
}

impl CmswebClient {
    /// Creates a client presenting the configured certificate.
    ///
    /// # Errors
    /// - [`CatalogConfigError::MissingCertificate`] if no certificate was configured
    /// - [`CatalogConfigError::InvalidCertificate`] if the PEM files are unreadable
    pub fn new(cfg: &ClientConfig) -> CatalogResult<Self> {
        let pair = cfg
            .cert
            .as_ref()
            .ok_or(CatalogConfigError::MissingCertificate)?;
        let identity = load_identity(pair)?;
        let client = http::build_client(cfg.timeout, Some(identity), HeaderMap::new())?;
        debug!("Creating CmswebClient for {}", cfg.cmsweb_url);
        Ok(Self {
            client,
            base: cfg.cmsweb_url.clone(),
        })
    }

    /// Workload document of a request, `None` if cmsweb did not answer 200.
    #[instrument(skip(self))]
    pub async fn reqmgr_workload(&self, workflow: &str) -> CatalogResult<Option<ReqMgrWorkload>> {
        let url = format!("{}/couchdb/reqmgr_workload_cache/{}", self.base, workflow);
        http::get_json(&self.client, &url).await
    }

    /// First transferor record of a workflow, `None` when absent.
    #[instrument(skip(self))]
    pub async fn transferor_info(&self, workflow: &str) -> CatalogResult<Option<TransferorInfo>> {
        let url = format!(
            "{}/ms-transferor/data/info?request={}",
            self.base,
            urlencoding::encode(workflow)
        );
        let resp: Option<TransferorResponse> = http::get_json(&self.client, &url).await?;
        Ok(resp.and_then(|r| r.result.into_iter().next()))
    }
}

/// Reads certificate and key PEM files into one identity.
fn load_identity(pair: &CertPair) -> CatalogResult<reqwest::Identity> {
    let read = |path: &std::path::Path| {
        fs::read(path).map_err(|e| CatalogConfigError::InvalidCertificate {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    };

    let mut pem = read(&pair.cert)?;
    if pair.key != pair.cert {
        pem.push(b'\n');
        pem.extend(read(&pair.key)?);
    }

    reqwest::Identity::from_pem(&pem).map_err(|e| {
        CatalogConfigError::InvalidCertificate {
            path: pair.cert.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}
