//! Crate-wide error hierarchy for catalog-client.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Root error type for the catalog-client crate.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP service (cmsweb, Stats2, McM, Rucio) related failure.
    #[error(transparent)]
    Provider(#[from] CatalogProviderError),

    /// Dataset catalog command-line client failure.
    #[error(transparent)]
    Das(#[from] DasError),

    /// Configuration problems (missing certificate, bad URL, etc.).
    #[error(transparent)]
    Config(#[from] CatalogConfigError),

    /// JSON decoding failure of a service payload.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP-level errors shared by all service clients.
#[derive(Debug, Error)]
pub enum CatalogProviderError {
    /// Timeout at transport level.
    #[error("timeout")]
    Timeout,

    /// Network/transport failure without HTTP status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// Unexpected/invalid shape of a service response.
    #[error("invalid service response: {0}")]
    InvalidResponse(String),
}

/// Errors of the `dasgoclient` shell-out.
#[derive(Debug, Error)]
pub enum DasError {
    /// The binary could not be started.
    #[error("cannot run dataset catalog client: {0}")]
    Spawn(#[from] std::io::Error),

    /// The client exited with a non-zero status.
    #[error("query `{query}` failed (exit {code:?}): {stderr}")]
    Exit {
        query: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The output could not be interpreted for the query.
    #[error("unexpected output for `{query}`: {output}")]
    Parse { query: String, output: String },
}

/// Configuration and setup errors.
#[derive(Debug, Error)]
pub enum CatalogConfigError {
    /// No user certificate/key pair could be resolved from the environment.
    #[error("missing USERCRT/USERKEY or X509_USER_PROXY environment variables")]
    MissingCertificate,

    /// Certificate files could not be read or parsed.
    #[error("invalid certificate {path}: {reason}")]
    InvalidCertificate { path: String, reason: String },

    /// A number in the environment failed to parse.
    #[error("invalid number in {var}: {value}")]
    InvalidNumber { var: &'static str, value: String },

    /// Invalid base URL.
    #[error("invalid base url in {var}: {value}")]
    InvalidBaseUrl { var: &'static str, value: String },
}

// ===== Conversions for `?` ergonomics at the crate root =====

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        CatalogError::Provider(CatalogProviderError::from(e))
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        CatalogError::Das(DasError::Spawn(e))
    }
}

// ===== Mapping from reqwest::Error into CatalogProviderError =====

impl From<reqwest::Error> for CatalogProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return CatalogProviderError::Timeout;
        }

        CatalogProviderError::Network(e.to_string())
    }
}
