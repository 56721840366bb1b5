//! CLI error type.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the terminal with a non-zero exit code.
#[derive(Debug, Error)]
pub enum CliError {
    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Input arguments or file contents did not parse.
    #[error("invalid input: {0}")]
    Parse(String),

    /// Tile grid math rejected the input.
    #[error(transparent)]
    Coord(#[from] mapedit::coord::CoordError),
}
