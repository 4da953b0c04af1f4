//! Nested-key flattening
//!
//! A flat archive can only hold `name -> blob` pairs, so nested per-item
//! records are stored under `/`-joined paths (`"lines/vals"`) and rebuilt on
//! read. Raw keys are assumed not to contain the separator; this is not
//! checked.

use std::collections::BTreeMap;

use crate::{ArtifactError, NdArray, Result};

pub const SEPARATOR: char = '/';

/// Either a leaf array or a nested mapping.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Leaf(NdArray),
    Branch(Tree),
}

pub type Tree = BTreeMap<String, Node>;

pub type FlatRecord = BTreeMap<String, NdArray>;

impl Node {
    pub fn as_leaf(&self) -> Option<&NdArray> {
        match self {
            Node::Leaf(a) => Some(a),
            Node::Branch(_) => None,
        }
    }

    pub fn as_branch(&self) -> Option<&Tree> {
        match self {
            Node::Branch(t) => Some(t),
            Node::Leaf(_) => None,
        }
    }
}

impl From<NdArray> for Node {
    fn from(a: NdArray) -> Self {
        Node::Leaf(a)
    }
}

impl From<Tree> for Node {
    fn from(t: Tree) -> Self {
        Node::Branch(t)
    }
}

/// Empty branches have no leaves and therefore vanish.
pub fn flatten(tree: &Tree) -> FlatRecord {
    let mut flat = FlatRecord::new();
    flatten_into(tree, None, &mut flat);
    flat
}

fn flatten_into(tree: &Tree, prefix: Option<&str>, flat: &mut FlatRecord) {
    for (key, node) in tree {
        let path = match prefix {
            Some(p) => format!("{p}{SEPARATOR}{key}"),
            None => key.clone(),
        };
        match node {
            Node::Leaf(a) => {
                flat.insert(path, a.clone());
            }
            Node::Branch(sub) => flatten_into(sub, Some(&path), flat),
        }
    }
}

pub fn unflatten(flat: FlatRecord) -> Result<Tree> {
    let mut tree = Tree::new();

    for (path, array) in flat {
        let mut segments: Vec<&str> = path.split(SEPARATOR).collect();
        // split always yields at least one segment
        let last = segments.pop().unwrap_or_default();

        let mut node = &mut tree;
        for (depth, seg) in segments.iter().enumerate() {
            let entry = node
                .entry((*seg).to_string())
                .or_insert_with(|| Node::Branch(Tree::new()));
            node = match entry {
                Node::Branch(sub) => sub,
                Node::Leaf(_) => {
                    return Err(ArtifactError::ConflictingPath(format!(
                        "'{}' is both a leaf and a prefix of '{path}'",
                        segments[..=depth].join("/")
                    )))
                }
            };
        }

        if node.contains_key(last) {
            return Err(ArtifactError::ConflictingPath(format!(
                "'{path}' is both a leaf and a prefix of another key"
            )));
        }
        node.insert(last.to_string(), Node::Leaf(array));
    }

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(v: f64) -> Node {
        Node::Leaf(NdArray::scalar(v))
    }

    fn sample_tree() -> Tree {
        let mut lines = Tree::new();
        lines.insert("vals".into(), Node::Leaf(NdArray::from_slice(&[1.0f32, 2.0, 3.0])));
        lines.insert("idxs".into(), Node::Leaf(NdArray::from_slice(&[0i64, 3])));

        let mut item = Tree::new();
        item.insert("lines".into(), Node::Branch(lines));
        item.insert("area".into(), leaf(12.5));

        let mut tree = Tree::new();
        tree.insert("1001".into(), Node::Branch(item));
        tree.insert("top".into(), leaf(1.0));
        tree
    }

    #[test]
    fn test_flatten_joins_paths() {
        let flat = flatten(&sample_tree());
        let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["1001/area", "1001/lines/idxs", "1001/lines/vals", "top"]);
    }

    #[test]
    fn test_unflatten_inverts_flatten() {
        let tree = sample_tree();
        assert_eq!(unflatten(flatten(&tree)).unwrap(), tree);
    }

    #[test]
    fn test_flatten_inverts_unflatten() {
        let mut flat = FlatRecord::new();
        flat.insert("a/b/c".into(), NdArray::scalar(1u8));
        flat.insert("a/d".into(), NdArray::scalar(2u8));
        flat.insert("e".into(), NdArray::scalar(3u8));
        assert_eq!(flatten(&unflatten(flat.clone()).unwrap()), flat);
    }

    #[test]
    fn test_unflatten_rejects_leaf_used_as_prefix() {
        let mut flat = FlatRecord::new();
        flat.insert("a".into(), NdArray::scalar(1u8));
        flat.insert("a/b".into(), NdArray::scalar(2u8));
        assert!(matches!(unflatten(flat), Err(ArtifactError::ConflictingPath(_))));

        let mut flat = FlatRecord::new();
        flat.insert("x/y".into(), NdArray::scalar(1u8));
        flat.insert("x/y/z".into(), NdArray::scalar(2u8));
        assert!(matches!(unflatten(flat), Err(ArtifactError::ConflictingPath(_))));
    }

    #[test]
    fn test_empty_branch_vanishes() {
        let mut tree = Tree::new();
        tree.insert("empty".into(), Node::Branch(Tree::new()));
        assert!(flatten(&tree).is_empty());
    }
}
