//! Stuck-transfer report: completion history of the input transfers of
//! workflows waiting in `staging`, with replication rule states.

pub mod errors;
pub mod progress;
pub mod report;
pub mod source;

pub use errors::{TransferError, TransferResult};
pub use progress::TransferProgress;
pub use report::{MonitorOptions, TransferRow, write_transfer_report};
pub use source::{TransferServices, TransferSource};
