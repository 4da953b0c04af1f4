//! Disk-backed artifact storage
//!
//! Provides the plumbing used to persist derived datasets: a fast binary
//! array codec, nested-key flattening, a flat archive format and a lazy
//! build-or-fetch artifact cache.

mod types;
mod codec;
mod keytree;
mod archive;
mod fetch;
mod cache;

pub use types::{DType, Element, NdArray, ArrayHeader};
pub use codec::{encode, decode, MAGIC};
pub use keytree::{Node, Tree, FlatRecord, flatten, unflatten, SEPARATOR};
pub use archive::{write_archive, read_archive, gzip, gunzip, pack_record, unpack_record, ENTRY_SUFFIX};
pub use fetch::{Fetcher, HttpFetcher, InMemoryFetcher};
pub use cache::{Artifact, ArtifactCache};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Conflicting path: {0}")]
    ConflictingPath(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Fetch failed for {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ArtifactError>;
