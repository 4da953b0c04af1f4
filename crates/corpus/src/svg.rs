//! SVG corpus artifact: every raw plan as gzip-compressed JSON.

use artifacts::{ArtifactCache, Fetcher};
use tracing::{info, warn};

use crate::{open_source, svg_records, CorpusError, CorpusSources, Result, SvgRecord};

/// Load the SVG corpus, rebuilding it from the raw corpus when `regenerate`
/// is set and fetching the prebuilt copy when it is missing.
pub fn svg_corpus<F: Fetcher>(
    cache: &ArtifactCache<F>,
    sources: &CorpusSources,
    regenerate: bool,
) -> Result<Vec<SvgRecord>> {
    let bytes = cache.materialize(&sources.svg_artifact(), regenerate, || {
        warn!("regenerating SVG corpus from the raw dataset; this needs the full raw download");
        let raw = cache.fetch(&sources.raw_artifact())?;
        let source = open_source(&raw)?;
        encode_svg_corpus(&svg_records(source.as_ref())?)
    })?;

    let records = decode_svg_corpus(&bytes)?;
    info!(records = records.len(), "svg corpus loaded");
    Ok(records)
}

pub fn encode_svg_corpus(records: &[SvgRecord]) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(records).map_err(|e| CorpusError::Json(e.to_string()))?;
    Ok(artifacts::gzip(&json)?)
}

pub fn decode_svg_corpus(bytes: &[u8]) -> Result<Vec<SvgRecord>> {
    let json = artifacts::gunzip(bytes)?;
    serde_json::from_slice(&json).map_err(|e| CorpusError::Json(e.to_string()))
}
