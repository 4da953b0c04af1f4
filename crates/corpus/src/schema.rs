use artifacts::{Artifact, NdArray, Node, Tree, SEPARATOR};
use serde::{Deserialize, Serialize};

pub type ItemId = String;

pub const RAW_CORPUS_FILE: &str = "cubicasa5k.zip";
pub const SVG_CORPUS_FILE: &str = "cubicasa-svgs.json.gz";
pub const GEOMETRY_CORPUS_FILE: &str = "cubicasa-geometry.tar.gz";

/// One floor plan from the raw corpus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvgRecord {
    pub path: String,        // entry name inside the raw archive
    pub category: String,
    pub id: ItemId,
    pub filename: String,    // without the .svg extension
    pub svg: String,
}

/// Where each artifact's prebuilt copy lives, if anywhere.
#[derive(Clone, Debug, Default)]
pub struct CorpusSources {
    pub raw_url: Option<String>,
    pub svg_url: Option<String>,
    pub geometry_url: Option<String>,
}

impl CorpusSources {
    pub fn raw_artifact(&self) -> Artifact {
        Artifact::new("raw corpus", RAW_CORPUS_FILE).with_remote(self.raw_url.clone())
    }

    pub fn svg_artifact(&self) -> Artifact {
        Artifact::new("svg corpus", SVG_CORPUS_FILE).with_remote(self.svg_url.clone())
    }

    pub fn geometry_artifact(&self) -> Artifact {
        Artifact::new("geometry corpus", GEOMETRY_CORPUS_FILE).with_remote(self.geometry_url.clone())
    }
}

/// A materialized geometry item. The ID is fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct DatasetItem {
    id: ItemId,
    fields: Tree,
}

impl DatasetItem {
    pub fn new(id: impl Into<ItemId>, fields: Tree) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &Tree {
        &self.fields
    }

    /// Walk a `/`-joined path, e.g. `"lines/vals"`.
    pub fn get(&self, path: &str) -> Option<&Node> {
        let mut segments = path.split(SEPARATOR);
        let mut node = self.fields.get(segments.next()?)?;
        for seg in segments {
            node = node.as_branch()?.get(seg)?;
        }
        Some(node)
    }

    pub fn array(&self, path: &str) -> Option<&NdArray> {
        self.get(path)?.as_leaf()
    }
}
