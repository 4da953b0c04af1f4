//! Bounded, partial-failure-tolerant batch derivation

use std::fmt::{Debug, Display};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::{DeriveError, Derivation, ItemFailure, Result};

/// Apply `transform` to every item on a pool of `workers` threads
/// (at least one) and block until all items have been processed.
///
/// An item whose transform errors is logged and left out of
/// `results`; it shows up in `failures` instead. The pool lives only for
/// the duration of the call. Keys are expected to be unique; on
/// duplicates the later item wins.
pub fn derive<K, I, O, E, F>(
    items: impl IntoIterator<Item = (K, I)>,
    transform: F,
    workers: usize,
) -> Result<Derivation<K, O>>
where
    K: Ord + Debug + Display + Send,
    I: Send,
    O: Send,
    E: Display,
    F: Fn(&K, I) -> std::result::Result<O, E> + Sync,
{
    let items: Vec<(K, I)> = items.into_iter().collect();
    let total = items.len();
    let workers = workers.max(1);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("derive-{i}"))
        .build()
        .map_err(|e| DeriveError::Pool(e.to_string()))?;

    info!(total, workers, "derivation started");

    let outcomes: Vec<(K, std::result::Result<O, String>)> = pool.install(|| {
        items
            .into_par_iter()
            .map(|(key, item)| {
                let outcome = transform(&key, item).map_err(|e| e.to_string());
                (key, outcome)
            })
            .collect()
    });
    drop(pool);

    let mut report = Derivation::new();
    for (key, outcome) in outcomes {
        match outcome {
            Ok(value) => {
                report.results.insert(key, value);
            }
            Err(reason) => {
                warn!(key = %key, %reason, "derivation failed; skipping item");
                report.failures.push(ItemFailure { key, reason });
            }
        }
    }

    let skipped: Vec<String> = report.failures.iter().map(|f| f.key.to_string()).collect();
    info!(
        total,
        succeeded = report.succeeded(),
        failed = report.failed(),
        ?skipped,
        "derivation complete"
    );

    Ok(report)
}
