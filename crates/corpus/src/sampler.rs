//! Deterministic sampling over the materialized geometry corpus
//!
//! All IDs are sorted, then shuffled by MT19937 with a fixed seed using the
//! NumPy legacy `RandomState.shuffle` draw sequence, so the permutation is
//! the same in every process and matches `RandomState(1).permutation`. The
//! first 90% of the permutation is the training split and the rest is the
//! test split. Samples index a split cyclically, so any count can be
//! requested.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use artifacts::{ArtifactCache, Fetcher};
use once_cell::sync::OnceCell;
use rand_mt::Mt;
use tracing::info;

use crate::{load_geometry_corpus, CorpusError, CorpusSources, DatasetItem, GeometryCorpus, ItemId, Result};

/// Permutation seed. Changing it reshuffles every split.
pub const PERMUTATION_SEED: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Split {
    Training,
    Test,
    All,
}

impl FromStr for Split {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "training" => Ok(Split::Training),
            "test" => Ok(Split::Test),
            "all" => Ok(Split::All),
            other => Err(CorpusError::InvalidArgument(format!(
                "split must be training/test/all, got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Split::Training => "training",
            Split::Test => "test",
            Split::All => "all",
        })
    }
}

/// Sorted `ids` shuffled by MT19937 seeded with `seed`.
pub fn permutation(ids: impl IntoIterator<Item = ItemId>, seed: u32) -> Vec<ItemId> {
    let mut ids: Vec<ItemId> = ids.into_iter().collect();
    ids.sort_unstable();
    let mut rng = Mt::new(seed);
    for i in (1..ids.len()).rev() {
        let j = bounded(&mut rng, i as u64) as usize;
        ids.swap(i, j);
    }
    ids
}

/// Uniform draw from `0..=max` by masked rejection, consuming the same
/// words as NumPy's `random_interval`.
fn bounded(rng: &mut Mt, max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let mask = u64::MAX >> max.leading_zeros();
    loop {
        let value = if max <= u64::from(u32::MAX) {
            u64::from(rng.next_u32()) & mask
        } else {
            ((u64::from(rng.next_u32()) << 32) | u64::from(rng.next_u32())) & mask
        };
        if value <= max {
            return value;
        }
    }
}

/// `floor(0.9 * n)`
pub fn training_cutoff(n: usize) -> usize {
    n * 9 / 10
}

/// Every item of the corpus, ID-augmented and laid out in permutation order.
pub struct SampleCache {
    ordered: Vec<Arc<DatasetItem>>,
    cutoff: usize,
}

impl SampleCache {
    pub fn build(mut corpus: GeometryCorpus) -> Self {
        let order = permutation(corpus.keys().cloned(), PERMUTATION_SEED);
        let ordered: Vec<Arc<DatasetItem>> = order
            .into_iter()
            .filter_map(|id| {
                let fields = corpus.remove(&id)?;
                Some(Arc::new(DatasetItem::new(id, fields)))
            })
            .collect();
        let cutoff = training_cutoff(ordered.len());
        Self { ordered, cutoff }
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn split(&self, split: Split) -> &[Arc<DatasetItem>] {
        match split {
            Split::Training => &self.ordered[..self.cutoff],
            Split::Test => &self.ordered[self.cutoff..],
            Split::All => &self.ordered,
        }
    }
}

/// Lazily builds its [`SampleCache`] on the first request. Concurrent first
/// requests block on a single initialization; a failed load leaves the cache
/// empty so a later call can retry.
pub struct DatasetSampler<L> {
    loader: L,
    cache: OnceCell<SampleCache>,
}

impl<L> DatasetSampler<L>
where
    L: Fn() -> Result<GeometryCorpus>,
{
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    pub fn cache(&self) -> Result<&SampleCache> {
        self.cache.get_or_try_init(|| {
            let corpus = (self.loader)()?;
            let cache = SampleCache::build(corpus);
            info!(items = cache.len(), cutoff = cache.cutoff, "sample cache built");
            Ok(cache)
        })
    }

    /// `count` items of the named split, cycling through it as needed.
    pub fn sample(&self, count: usize, split: &str) -> Result<Vec<Arc<DatasetItem>>> {
        let split: Split = split.parse()?;
        self.sample_split(count, split)
    }

    pub fn sample_split(&self, count: usize, split: Split) -> Result<Vec<Arc<DatasetItem>>> {
        let items = self.cache()?.split(split);
        if count == 0 {
            return Ok(Vec::new());
        }
        if items.is_empty() {
            return Err(CorpusError::EmptySplit(split));
        }
        Ok((0..count).map(|i| items[i % items.len()].clone()).collect())
    }
}

/// Sampler over the cached (or remotely fetched) geometry corpus.
pub fn geometry_sampler<F: Fetcher>(
    cache: Arc<ArtifactCache<F>>,
    sources: CorpusSources,
) -> DatasetSampler<impl Fn() -> Result<GeometryCorpus>> {
    DatasetSampler::new(move || load_geometry_corpus(&cache, &sources))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_parsing() {
        assert_eq!("training".parse::<Split>().unwrap(), Split::Training);
        assert_eq!("test".parse::<Split>().unwrap(), Split::Test);
        assert_eq!("all".parse::<Split>().unwrap(), Split::All);
        assert!(matches!("train".parse::<Split>(), Err(CorpusError::InvalidArgument(_))));
        assert!(matches!("Training".parse::<Split>(), Err(CorpusError::InvalidArgument(_))));
    }

    #[test]
    fn test_cutoff_is_floor_of_ninety_percent() {
        assert_eq!(training_cutoff(0), 0);
        assert_eq!(training_cutoff(1), 0);
        assert_eq!(training_cutoff(9), 8);
        assert_eq!(training_cutoff(10), 9);
        assert_eq!(training_cutoff(4999), 4499);
    }

    #[test]
    fn test_permutation_ignores_input_order() {
        let ids: Vec<String> = (0..50).map(|i| format!("{i}")).collect();
        let mut reversed = ids.clone();
        reversed.reverse();

        let a = permutation(ids.clone(), PERMUTATION_SEED);
        let b = permutation(reversed, PERMUTATION_SEED);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        let mut expected = ids;
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_permutation_matches_numpy_random_state() {
        let digits: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(
            permutation(digits.clone(), PERMUTATION_SEED),
            ["2", "9", "6", "4", "0", "3", "1", "7", "8", "5"]
        );
        assert_eq!(
            permutation(digits, 2),
            ["4", "1", "5", "0", "7", "2", "3", "6", "9", "8"]
        );

        let padded: Vec<String> = (0..25).map(|i| format!("{i:02}")).collect();
        assert_eq!(
            permutation(padded, PERMUTATION_SEED),
            [
                "14", "13", "17", "03", "21", "10", "18", "19", "04", "02", "20", "06", "07",
                "22", "01", "16", "00", "15", "24", "23", "09", "08", "12", "11", "05",
            ]
        );
    }

    #[test]
    fn test_bounded_stays_in_range() {
        let mut rng = Mt::new(7);
        assert_eq!(bounded(&mut rng, 0), 0);
        for max in [1u64, 2, 3, 255, 256, 1 << 40] {
            assert!((0..50).all(|_| bounded(&mut rng, max) <= max));
        }
    }

    #[test]
    fn test_permutation_depends_on_seed() {
        let ids: Vec<String> = (0..50).map(|i| format!("{i:03}")).collect();
        assert_ne!(permutation(ids.clone(), 1), permutation(ids, 2));
    }
}
