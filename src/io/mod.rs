//! Spreadsheet interchange: each sheet travels as one CSV file.

pub mod export;
pub mod import;
mod sheet;

pub use export::*;
pub use import::*;
pub use sheet::*;
