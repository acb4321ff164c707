//! `rowscope-io`: storage and files.
//!
//! SQLite record store, CSV import and export, and the saved-filter
//! document store.

pub mod csv;
pub mod export;
pub mod filters;
pub mod store;

pub use self::csv::{parse_csv, read_csv, CsvTable};
pub use export::{write_csv, DEFAULT_EXPORT_DELIMITER};
pub use filters::FilterStore;
pub use store::{
    LoadSummary, QueryPage, Store, StoreError, TableStats, DEFAULT_DISTINCT_LIMIT,
};
