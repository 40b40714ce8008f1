//! Run-scoped memoization of catalog lookups.
//!
//! Run-list keys: SHA256("{dataset}___{json run list or lumi mask}").
//! Entries live for one report run, nothing is written to disk.

use std::collections::{BTreeMap, HashMap};

use catalog_client::DatasetCatalog;
use catalog_client::types::DatasetSummary;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::runs::{LumiMask, RunSet, chunk_runs};

/// Concurrent key/value memo shared by the report workers.
#[derive(Debug)]
pub struct MemoCache<V> {
    store: DashMap<String, V>,
}

impl<V: Clone> MemoCache<V> {
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.store.get(key).map(|v| v.value().clone())
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.store.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl<V: Clone> Default for MemoCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable cache key for a dataset and a serialized run selection.
pub fn selection_key(dataset: &str, selection_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{dataset}___{selection_json}"));
    format!("{:x}", hasher.finalize())
}

/// Memoizing facade over a [`DatasetCatalog`].
///
/// Lookup failures are logged and degrade to `0` or an empty set so that one
/// broken dataset never aborts a report. A failed event or run lookup is not
/// memoized. Run and lumi selection sums are memoized once computed, even
/// when some or all of their chunks failed.
#[derive(Debug)]
pub struct CachedCatalog<C> {
    inner: C,
    events: MemoCache<u64>,
    runs: MemoCache<RunSet>,
    selection_events: MemoCache<u64>,
}

impl<C: DatasetCatalog> CachedCatalog<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            events: MemoCache::new(),
            runs: MemoCache::new(),
            selection_events: MemoCache::new(),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Dataset names for a wildcard pattern, empty on failure.
    pub async fn names(&self, pattern: &str) -> Vec<String> {
        match self.inner.dataset_names(pattern).await {
            Ok(names) => names,
            Err(e) => {
                warn!(pattern, error = %e, "dataset name query failed");
                Vec::new()
            }
        }
    }

    /// Usable dataset summary; failures count as "not usable".
    pub async fn summary(&self, dataset: &str) -> Option<DatasetSummary> {
        match self.inner.dataset_summary(dataset).await {
            Ok(s) => s,
            Err(e) => {
                warn!(dataset, error = %e, "dataset summary query failed");
                None
            }
        }
    }

    pub async fn events(&self, dataset: &str) -> u64 {
        if dataset.is_empty() {
            return 0;
        }
        if let Some(v) = self.events.get(dataset) {
            return v;
        }

        match self.inner.dataset_events(dataset).await {
            Ok(v) => {
                self.events.insert(dataset, v);
                v
            }
            Err(e) => {
                warn!(dataset, error = %e, "error getting events");
                0
            }
        }
    }

    pub async fn runs(&self, dataset: &str) -> RunSet {
        if dataset.is_empty() {
            return RunSet::new();
        }
        if let Some(v) = self.runs.get(dataset) {
            return v;
        }

        match self.inner.dataset_runs(dataset).await {
            Ok(runs) => {
                debug!(dataset, runs = runs.len(), "got runs");
                self.runs.insert(dataset, runs.clone());
                runs
            }
            Err(e) => {
                warn!(dataset, error = %e, "error getting runs");
                RunSet::new()
            }
        }
    }

    /// Events of `dataset` in `runs`, retried in chunks when the one-shot query fails.
    pub async fn events_of_runs(&self, dataset: &str, runs: &RunSet) -> u64 {
        if dataset.is_empty() || runs.is_empty() {
            return 0;
        }

        let runs: Vec<u32> = runs.iter().copied().collect();
        let key = selection_key(dataset, &serde_json::to_string(&runs).unwrap_or_default());
        if let Some(v) = self.selection_events.get(&key) {
            debug!(dataset, "cache hit for events of runs");
            return v;
        }

        debug!(dataset, runs = runs.len(), "getting events of runs");
        let events = match self.inner.events_in_runs(dataset, &runs).await {
            Ok(v) => v,
            Err(e) => {
                warn!(dataset, runs = runs.len(), error = %e, "events of runs failed, chunking");
                let mut total = 0;
                for chunk in chunk_runs(&runs) {
                    match self.inner.events_in_runs(dataset, chunk).await {
                        Ok(v) => total += v,
                        Err(e) => warn!(dataset, chunk = chunk.len(), error = %e, "chunk failed"),
                    }
                }
                total
            }
        };

        self.selection_events.insert(key, events);
        events
    }

    /// Events of `dataset` inside the lumi ranges of `mask`.
    ///
    /// Per (run, lumi) the largest event count reported by any file is used.
    pub async fn events_of_lumis(&self, dataset: &str, mask: &LumiMask) -> u64 {
        if dataset.is_empty() || mask.is_empty() {
            return 0;
        }

        let key = selection_key(dataset, &serde_json::to_string(mask).unwrap_or_default());
        if let Some(v) = self.selection_events.get(&key) {
            debug!(dataset, "cache hit for events of lumis");
            return v;
        }

        let runs: Vec<u32> = mask.runs().into_iter().collect();
        debug!(dataset, runs = runs.len(), "getting events of runs with lumis");
        let mut per_lumi: HashMap<u32, BTreeMap<u32, u64>> = HashMap::new();
        for chunk in chunk_runs(&runs) {
            let rows = match self.inner.lumi_events(dataset, chunk).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!(dataset, chunk = chunk.len(), error = %e, "events of lumis failed");
                    continue;
                }
            };
            for row in rows {
                let run_lumis = per_lumi.entry(row.run).or_default();
                for (lumi, ev) in row.lumis.iter().zip(row.events.iter()) {
                    let slot = run_lumis.entry(*lumi).or_insert(0);
                    *slot = (*slot).max(*ev);
                }
            }
        }

        let events = sum_in_mask(&per_lumi, mask);
        self.selection_events.insert(key, events);
        events
    }
}

fn sum_in_mask(per_lumi: &HashMap<u32, BTreeMap<u32, u64>>, mask: &LumiMask) -> u64 {
    mask.iter()
        .filter_map(|(run, ranges)| per_lumi.get(run).map(|lumis| (lumis, ranges)))
        .map(|(lumis, ranges)| {
            ranges
                .iter()
                .filter(|[first, last]| first <= last)
                .map(|[first, last]| lumis.range(*first..=*last).map(|(_, ev)| *ev).sum::<u64>())
                .sum::<u64>()
        })
        .sum()
}
