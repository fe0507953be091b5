//! Export of evaluated sheets.

pub mod csv;

pub use csv::{to_csv, write_csv};
