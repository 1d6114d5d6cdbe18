//! Error types for the toolkit

use thiserror::Error;

/// Main error type for toolkit operations
///
/// Solver outcomes (divergence, stagnation, iteration bound) are *not*
/// errors; they are reported through [`crate::solver::SolverStatus`].
#[derive(Error, Debug)]
pub enum FemError {
    #[error("Size mismatch: expected {expected}, got {got}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Band offset {offset} does not fit a {rows}x{columns} matrix")]
    InvalidOffset {
        offset: i64,
        rows: usize,
        columns: usize,
    },

    #[error("Parse error in line {line}: {msg}")]
    ParseError { line: usize, msg: String },

    #[error("Section '{0}' not found in configuration")]
    SectionNotFound(String),

    #[error("Key '{key}' not found in section '{section}'")]
    KeyNotFound { section: String, key: String },

    #[error("Unknown solver type '{0}'")]
    UnknownSolverType(String),

    #[error("Solver configuration contains a reference cycle through section '{0}'")]
    ConfigCycle(String),

    #[error("Mesh part '{0}' not found")]
    MeshPartNotFound(String),

    #[error("Chart '{0}' not found")]
    ChartNotFound(String),

    #[error("Mesh deteriorated: minimum angle {angle} below floor {floor}")]
    MeshDeteriorated { angle: f64, floor: f64 },

    #[error("Collective communication failure: {0}")]
    CollectiveFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("File format error: {0}")]
    FileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for toolkit operations
pub type FemResult<T> = Result<T, FemError>;

/// Checks that two logical sizes agree, the common guard at operation entry.
#[inline]
pub fn check_sizes(expected: usize, got: usize) -> FemResult<()> {
    if expected != got {
        Err(FemError::SizeMismatch { expected, got })
    } else {
        Ok(())
    }
}
