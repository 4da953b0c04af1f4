//! Geometry corpus artifact
//!
//! Regeneration maps a caller-supplied extractor over the SVG corpus, nests
//! each result under its item ID and stores the flattened arrays as one
//! gzip-compressed archive.

use std::collections::BTreeMap;
use std::fmt::Display;

use artifacts::{flatten, pack_record, unflatten, unpack_record, ArtifactCache, Fetcher, Node, Tree};
use derivation::{derive, Derivation};
use tracing::{info, warn};

use crate::{svg_corpus, CorpusError, CorpusSources, ItemId, Result, SvgRecord};

pub type GeometryCorpus = BTreeMap<ItemId, Tree>;

/// Load the geometry corpus, regenerating it from the SVG corpus with
/// `extractor` when `regenerate` is set.
pub fn geometry_corpus<F, X, E>(
    cache: &ArtifactCache<F>,
    sources: &CorpusSources,
    regenerate: bool,
    extractor: X,
    workers: usize,
) -> Result<GeometryCorpus>
where
    F: Fetcher,
    X: Fn(&ItemId, SvgRecord) -> std::result::Result<Tree, E> + Sync,
    E: Display,
{
    let bytes = cache.materialize(&sources.geometry_artifact(), regenerate, || {
        info!("regenerating geometry corpus from SVG corpus");
        let svgs = svg_corpus(cache, sources, false)?;
        let derived = derive_geometry(svgs, extractor, workers)?;
        encode_geometry_corpus(&derived.results)
    })?;
    decode_geometry_corpus(&bytes)
}

/// Cached or remote geometry corpus; never regenerates.
pub fn load_geometry_corpus<F: Fetcher>(
    cache: &ArtifactCache<F>,
    sources: &CorpusSources,
) -> Result<GeometryCorpus> {
    let bytes = cache.fetch(&sources.geometry_artifact())?;
    decode_geometry_corpus(&bytes)
}

/// Run `extractor` over every record, keyed by item ID. Failed items are
/// reported, not fatal.
pub fn derive_geometry<X, E>(
    svgs: Vec<SvgRecord>,
    extractor: X,
    workers: usize,
) -> Result<Derivation<ItemId, Tree>>
where
    X: Fn(&ItemId, SvgRecord) -> std::result::Result<Tree, E> + Sync,
    E: Display,
{
    let mut by_id: BTreeMap<ItemId, SvgRecord> = BTreeMap::new();
    for record in svgs {
        let id = record.id.clone();
        if let Some(prev) = by_id.insert(id.clone(), record) {
            warn!(id = %id, replaced = %prev.path, "duplicate item id; keeping the later record");
        }
    }

    Ok(derive(by_id, extractor, workers)?)
}

pub fn encode_geometry_corpus(items: &GeometryCorpus) -> Result<Vec<u8>> {
    let mut nested = Tree::new();
    for (id, fields) in items {
        if fields.is_empty() {
            warn!(id = %id, "item has no fields and will not be stored");
            continue;
        }
        nested.insert(id.clone(), Node::Branch(fields.clone()));
    }
    Ok(pack_record(&flatten(&nested))?)
}

pub fn decode_geometry_corpus(bytes: &[u8]) -> Result<GeometryCorpus> {
    let tree = unflatten(unpack_record(bytes)?)?;
    tree.into_iter()
        .map(|(id, node)| match node {
            Node::Branch(fields) => Ok((id, fields)),
            Node::Leaf(_) => Err(CorpusError::Malformed(format!(
                "top-level entry '{id}' is an array, expected an item"
            ))),
        })
        .collect()
}
