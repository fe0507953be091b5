//! cellflow_engine - Formula parsing, evaluation and cell primitives.

pub mod engine;
