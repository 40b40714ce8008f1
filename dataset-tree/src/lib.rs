//! Dataset hierarchy resolution for the production reports.
//!
//! RAW datasets are expanded into their AOD, MINIAOD and NANOAOD descendants
//! either through request-tracking workflows ([`WorkflowWalker`]) or through
//! catalog name patterns ([`CatalogWalker`]).

pub mod accounting;
pub mod blacklist;
pub mod cache;
pub mod catalog_walk;
pub mod config;
pub mod errors;
pub mod name;
pub mod records;
pub mod reports;
pub mod runs;
pub mod workflow_walk;

#[cfg(test)]
mod fakes;

pub use blacklist::Blacklist;
pub use cache::{CachedCatalog, MemoCache};
pub use catalog_walk::CatalogWalker;
pub use config::{Year, YearsConfig};
pub use errors::{TreeError, TreeResult};
pub use name::DatasetName;
pub use records::{ChildRecord, RawRecord, WhitelistAccounting};
pub use reports::{ReportOptions, Run3Report};
pub use runs::{LumiMask, RunSet};
pub use workflow_walk::WorkflowWalker;
