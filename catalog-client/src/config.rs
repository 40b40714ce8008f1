//! Client configuration loaded from environment variables.
//!
//! # Environment variables
//!
//! - `DASGOCLIENT`         = path of the dataset catalog CLI (default `dasgoclient`)
//! - `CMSWEB_URL`          = cmsweb base URL (default `https://cmsweb.cern.ch`)
//! - `USERCRT` / `USERKEY` = user certificate and key (PEM)
//! - `X509_USER_PROXY`     = proxy file used for both when the pair above is unset
//! - `STATS2_URL`          = processing status CouchDB (default `http://vocms074:5984`)
//! - `MCM_URL`             = request management REST root
//! - `MCM_COOKIE`          = optional SSO cookie header for McM
//! - `RUCIO_URL` + `RUCIO_AUTH_TOKEN` = optional Rucio REST access
//! - `HTTP_TIMEOUT_SECS`   = request timeout (default 60)

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{CatalogConfigError, CatalogResult};

pub const DEFAULT_DASGOCLIENT: &str = "dasgoclient";
pub const DEFAULT_CMSWEB_URL: &str = "https://cmsweb.cern.ch";
pub const DEFAULT_STATS2_URL: &str = "http://vocms074:5984";
pub const DEFAULT_MCM_URL: &str = "https://cms-pdmv-prod.web.cern.ch/mcm";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Certificate and key files presented to cmsweb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPair {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Everything the service clients need to connect.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub das_binary: PathBuf,
    pub cmsweb_url: String,
    pub cert: Option<CertPair>,
    pub stats2_url: String,
    pub mcm_url: String,
    pub mcm_cookie: Option<String>,
    pub rucio_url: Option<String>,
    pub rucio_token: Option<String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            das_binary: PathBuf::from(DEFAULT_DASGOCLIENT),
            cmsweb_url: DEFAULT_CMSWEB_URL.to_string(),
            cert: None,
            stats2_url: DEFAULT_STATS2_URL.to_string(),
            mcm_url: DEFAULT_MCM_URL.to_string(),
            mcm_cookie: None,
            rucio_url: None,
            rucio_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`CatalogConfigError`] for malformed URLs or numbers.
    pub fn from_env() -> CatalogResult<Self> {
        let timeout_secs = match env_opt("HTTP_TIMEOUT_SECS") {
            Some(v) => v
                .parse::<u64>()
                .map_err(|_| CatalogConfigError::InvalidNumber {
                    var: "HTTP_TIMEOUT_SECS",
                    value: v.clone(),
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let cfg = Self {
            das_binary: PathBuf::from(env_or("DASGOCLIENT", DEFAULT_DASGOCLIENT)),
            cmsweb_url: http_url("CMSWEB_URL", env_or("CMSWEB_URL", DEFAULT_CMSWEB_URL))?,
            cert: cert_from_env(),
            stats2_url: http_url("STATS2_URL", env_or("STATS2_URL", DEFAULT_STATS2_URL))?,
            mcm_url: http_url("MCM_URL", env_or("MCM_URL", DEFAULT_MCM_URL))?,
            mcm_cookie: env_opt("MCM_COOKIE"),
            rucio_url: env_opt("RUCIO_URL")
                .map(|u| http_url("RUCIO_URL", u))
                .transpose()?,
            rucio_token: env_opt("RUCIO_AUTH_TOKEN"),
            timeout: Duration::from_secs(timeout_secs),
        };
        Ok(cfg)
    }
}

/// Resolves the certificate pair: `USERCRT`/`USERKEY` first, then the proxy.
fn cert_from_env() -> Option<CertPair> {
    resolve_cert(
        env_opt("USERCRT"),
        env_opt("USERKEY"),
        env_opt("X509_USER_PROXY"),
    )
}

fn resolve_cert(
    cert: Option<String>,
    key: Option<String>,
    proxy: Option<String>,
) -> Option<CertPair> {
    match (cert, key) {
        (Some(cert), Some(key)) => Some(CertPair {
            cert: cert.into(),
            key: key.into(),
        }),
        _ => proxy.map(|p| CertPair {
            cert: PathBuf::from(&p),
            key: PathBuf::from(p),
        }),
    }
}

/// Reads an optional, non-empty environment variable.
pub fn env_opt(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Reads an environment variable with a fallback.
pub fn env_or(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

/// Validates that a base URL uses an HTTP scheme and strips a trailing slash.
fn http_url(var: &'static str, value: String) -> CatalogResult<String> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(CatalogConfigError::InvalidBaseUrl { var, value }.into())
    }
}
