//! Monte-Carlo request chain report.
//!
//! For every dataset of the input list, the UL GEN requests producing it are
//! looked up and each of their NanoAOD chains becomes a row with the MiniAOD
//! and NanoAOD request status.

pub mod errors;
pub mod report;
pub mod source;

pub use errors::{ChainError, ChainResult};
pub use report::{ChainReport, ChainRow, write_chain_report};
pub use source::RequestSource;
