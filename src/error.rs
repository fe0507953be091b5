//! Error types for the Cellflow command line

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running a batch script
#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Script error at line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("Config error in {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, CliError>;
