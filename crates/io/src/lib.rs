// File I/O: the machine table on disk and sales report documents

pub mod csv;
pub mod document;

pub use crate::csv::CsvTableStore;
pub use document::{load_report, SalesDocument};
