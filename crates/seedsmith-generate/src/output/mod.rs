//! Writers for generated rows.

pub mod csv;

pub use self::csv::{CsvFile, write_model_csv, write_store_csv};
