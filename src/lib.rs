pub mod config;
pub mod error;
pub mod load;
pub mod process;
pub mod store;

pub use config::Settings;
pub use error::IngestError;
pub use process::{ingest_workbook, run, IngestReport};
