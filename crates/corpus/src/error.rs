use artifacts::ArtifactError;
use derivation::DeriveError;
use thiserror::Error;

use crate::Split;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Derivation error: {0}")]
    Derive(#[from] DeriveError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Split '{0}' contains no items")]
    EmptySplit(Split),

    #[error("Malformed corpus: {0}")]
    Malformed(String),

    #[error("Serialization error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, CorpusError>;
