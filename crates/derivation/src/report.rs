use std::collections::BTreeMap;
use std::fmt::{Debug, Display};

use thiserror::Error;

/// One item whose transform returned an error. Contained at the item
/// boundary; never escalated to a batch failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("derivation failed for item {key}: {reason}")]
pub struct ItemFailure<K: Debug + Display> {
    pub key: K,
    pub reason: String,
}

/// Outcome of a batch: successes keyed by input key, plus the skipped items.
#[derive(Clone, Debug)]
pub struct Derivation<K: Ord + Debug + Display, O> {
    pub results: BTreeMap<K, O>,
    pub failures: Vec<ItemFailure<K>>,
}

impl<K: Ord + Debug + Display, O> Derivation<K, O> {
    pub fn new() -> Self {
        Self {
            results: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn failed_keys(&self) -> Vec<&K> {
        self.failures.iter().map(|f| &f.key).collect()
    }

    pub fn into_results(self) -> BTreeMap<K, O> {
        self.results
    }
}

impl<K: Ord + Debug + Display, O> Default for Derivation<K, O> {
    fn default() -> Self {
        Self::new()
    }
}
