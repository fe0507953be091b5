//! Document state and change propagation.

mod eval;
mod ops;
mod state;

pub use state::{CellArena, DEFAULT_HEIGHT, DEFAULT_WIDTH, Document};
