pub mod config;
pub mod export;
pub mod fetch;
pub mod gats;
pub mod table;
pub mod write;

#[cfg(test)]
mod testutil;

pub use config::Config;
pub use export::{ExportSummary, Exporter};
pub use fetch::{FetchError, FetchErrorKind, Fetcher};
pub use table::Table;
