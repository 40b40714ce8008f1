//! Clients for the services the dataset reports are built from.
//!
//! - [`das::DasClient`]: dataset catalog CLI shell-out
//! - [`stats2::Stats2Client`]: processing-status CouchDB views
//! - [`cmsweb::CmswebClient`]: request manager workloads, transferor documents
//! - [`mcm::McmClient`]: request management REST
//! - [`rucio::RucioClient`]: replication rule states
//!
//! The hierarchy walks only depend on the traits in [`catalog`].

pub mod catalog;
pub mod cmsweb;
pub mod config;
pub mod das;
pub mod errors;
mod http;
pub mod mcm;
pub mod rucio;
pub mod stats2;
pub mod types;

pub use catalog::{DatasetCatalog, WorkflowDirectory, WorkflowSource};
pub use cmsweb::CmswebClient;
pub use config::ClientConfig;
pub use das::DasClient;
pub use errors::{CatalogError, CatalogResult};
pub use mcm::McmClient;
pub use rucio::RucioClient;
pub use stats2::Stats2Client;
