//! Parallel per-item derivation with failures reported as values

pub mod pool;
pub mod report;

pub use pool::*;
pub use report::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("Worker pool error: {0}")]
    Pool(String),
}

pub type Result<T> = std::result::Result<T, DeriveError>;
