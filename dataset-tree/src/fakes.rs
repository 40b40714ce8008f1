//! In-memory fakes of the catalog capabilities for unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use catalog_client::errors::{CatalogResult, DasError};
use catalog_client::types::{DatasetSummary, LumiEventsRow, ReqMgrWorkload, Stats2Workflow};
use catalog_client::{DatasetCatalog, WorkflowSource};

/// In-memory catalog for walk and cache tests.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    pub names: BTreeMap<String, Vec<String>>,
    pub events: BTreeMap<String, u64>,
    pub runs: BTreeMap<String, BTreeSet<u32>>,
    /// (dataset, run) -> events; used for run sums.
    pub run_events: BTreeMap<(String, u32), u64>,
    /// Run-sum queries with more runs than this fail.
    pub max_runs_per_query: Option<usize>,
    pub lumi_rows: BTreeMap<String, Vec<LumiEventsRow>>,
    pub summaries: BTreeMap<String, DatasetSummary>,
    pub calls: AtomicUsize,
}

fn failure(query: &str) -> catalog_client::CatalogError {
    DasError::Exit {
        query: query.to_string(),
        code: Some(1),
        stderr: "fake failure".into(),
    }
    .into()
}

impl DatasetCatalog for FakeCatalog {
    async fn dataset_names(&self, pattern: &str) -> CatalogResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.names.get(pattern).cloned().unwrap_or_default())
    }

    async fn dataset_events(&self, dataset: &str) -> CatalogResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.events.get(dataset).copied().ok_or_else(|| failure(dataset))
    }

    async fn dataset_runs(&self, dataset: &str) -> CatalogResult<BTreeSet<u32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.runs.get(dataset).cloned().unwrap_or_default())
    }

    async fn events_in_runs(&self, dataset: &str, runs: &[u32]) -> CatalogResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.max_runs_per_query.is_some_and(|m| runs.len() > m) {
            return Err(failure(dataset));
        }
        Ok(runs
            .iter()
            .map(|r| {
                self.run_events
                    .get(&(dataset.to_string(), *r))
                    .copied()
                    .unwrap_or(0)
            })
            .sum())
    }

    async fn lumi_events(
        &self,
        dataset: &str,
        runs: &[u32],
    ) -> CatalogResult<Vec<LumiEventsRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .lumi_rows
            .get(dataset)
            .map(|rows| {
                rows.iter()
                    .filter(|r| runs.contains(&r.run))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn dataset_summary(&self, dataset: &str) -> CatalogResult<Option<DatasetSummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.summaries.get(dataset).cloned())
    }
}

/// In-memory request tracking for walk tests.
#[derive(Debug, Default)]
pub struct FakeWorkflows {
    /// Input dataset -> workflows reading it.
    pub by_input: BTreeMap<String, Vec<Stats2Workflow>>,
    pub workloads: BTreeMap<String, ReqMgrWorkload>,
}

impl FakeWorkflows {
    pub fn add_consumer(&mut self, input: &str, workflow: Stats2Workflow) {
        self.by_input
            .entry(input.to_string())
            .or_default()
            .push(workflow);
    }
}

impl WorkflowSource for FakeWorkflows {
    async fn workflows_for_input(&self, dataset: &str) -> CatalogResult<Vec<Stats2Workflow>> {
        Ok(self.by_input.get(dataset).cloned().unwrap_or_default())
    }

    async fn workload(&self, workflow: &str) -> CatalogResult<Option<ReqMgrWorkload>> {
        Ok(self.workloads.get(workflow).cloned())
    }
}

/// Workflow document with one output snapshot.
pub fn workflow(name: &str, prepid: &str, ps: &str, outputs: &[(&str, &str)]) -> Stats2Workflow {
    let datasets: serde_json::Map<String, serde_json::Value> = outputs
        .iter()
        .map(|(ds, kind)| {
            (
                ds.to_string(),
                serde_json::json!({"Type": kind, "Events": 0}),
            )
        })
        .collect();
    serde_json::from_value(serde_json::json!({
        "RequestName": name,
        "RequestType": "ReReco",
        "PrepID": prepid,
        "ProcessingString": ps,
        "EventNumberHistory": [{"Datasets": datasets}],
    }))
    .unwrap()
}
