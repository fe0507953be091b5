//! cellflow-core - the cell grid, change propagation and export.

pub mod document;
pub mod error;
pub mod storage;

pub use document::{DEFAULT_HEIGHT, DEFAULT_WIDTH, Document};
pub use error::{CellflowError, EvalError, Result};

pub use cellflow_engine::engine::CellRef;
