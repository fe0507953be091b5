//! Error types for Cellflow core.

use cellflow_engine::engine::{CellRef, ParseError};
use thiserror::Error;

/// Failures detected while propagating a change through the sheet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("Circular reference at {cell}: {}", format_path(.path))]
    CircularReference { cell: CellRef, path: Vec<CellRef> },
}

fn format_path(path: &[CellRef]) -> String {
    path.iter()
        .map(CellRef::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors that can occur in a Cellflow document
#[derive(Error, Debug)]
pub enum CellflowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("Cell {0} is outside the sheet")]
    OutOfBounds(CellRef),

    #[error("{dimension} {index} is outside the sheet")]
    IndexOutOfBounds { dimension: &'static str, index: usize },

    #[error("Cannot delete {cell}: referenced by {dependent}")]
    ReferencedCell { cell: CellRef, dependent: CellRef },

    #[error("Unknown listener")]
    UnknownListener,
}

pub type Result<T> = std::result::Result<T, CellflowError>;
