use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to acquire {path}: {reason}")]
    Resource { path: PathBuf, reason: String },
    #[error("{what}: expected shape {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("{what} has a zero-sized dimension")]
    ZeroDimension { what: &'static str },
    #[error("invalid block dimensions {rows}x{cols}")]
    InvalidBlockDims { rows: usize, cols: usize },
    #[error("accelerator did not clear the status word within {timeout:?} (call {calls})")]
    HandshakeTimeout { timeout: Duration, calls: usize },
    #[error("concurrent engine access: {0}")]
    ConcurrentAccess(String),
    #[error("invalid configuration value for {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
