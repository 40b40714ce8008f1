//! Dashboard tables derived from the report trees, and the JSON/timestamp writers.

pub mod errors;
pub mod full_table;
pub mod original_table;
pub mod writer;

pub use errors::{TableError, TableResult};
pub use full_table::write_full_table;
pub use original_table::{TableLayout, write_original_table};
pub use writer::{write_json, write_timestamp};
