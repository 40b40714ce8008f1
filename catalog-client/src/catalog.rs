//! Capability traits consumed by the hierarchy walks.
//!
//! The walks never talk to a concrete service: they are generic over a
//! [`DatasetCatalog`] (dataset names, runs, events) and a [`WorkflowSource`]
//! (workflows reading a dataset, workload whitelists). Tests drive them with
//! in-memory fakes.

use std::collections::BTreeSet;
use std::future::Future;

use crate::cmsweb::CmswebClient;
use crate::das::DasClient;
use crate::errors::CatalogResult;
use crate::stats2::Stats2Client;
use crate::types::{DatasetSummary, LumiEventsRow, ReqMgrWorkload, Stats2Workflow};

/// Dataset catalog queries.
pub trait DatasetCatalog: Send + Sync {
    /// Dataset names matching a wildcard pattern.
    fn dataset_names(&self, pattern: &str)
    -> impl Future<Output = CatalogResult<Vec<String>>> + Send;

    /// Total events of a dataset.
    fn dataset_events(&self, dataset: &str) -> impl Future<Output = CatalogResult<u64>> + Send;

    /// Runs of a dataset.
    fn dataset_runs(
        &self,
        dataset: &str,
    ) -> impl Future<Output = CatalogResult<BTreeSet<u32>>> + Send;

    /// Events of a dataset restricted to `runs`.
    fn events_in_runs(
        &self,
        dataset: &str,
        runs: &[u32],
    ) -> impl Future<Output = CatalogResult<u64>> + Send;

    /// Per-file lumi and event rows of a dataset restricted to `runs`.
    fn lumi_events(
        &self,
        dataset: &str,
        runs: &[u32],
    ) -> impl Future<Output = CatalogResult<Vec<LumiEventsRow>>> + Send;

    /// Summary of a usable (`VALID`/`PRODUCTION`, non-empty) dataset.
    fn dataset_summary(
        &self,
        dataset: &str,
    ) -> impl Future<Output = CatalogResult<Option<DatasetSummary>>> + Send;
}

/// Request-tracking lookups.
pub trait WorkflowSource: Send + Sync {
    /// Workflows that take `dataset` as input.
    fn workflows_for_input(
        &self,
        dataset: &str,
    ) -> impl Future<Output = CatalogResult<Vec<Stats2Workflow>>> + Send;

    /// Whitelist settings of a workflow, `None` when the service had no answer.
    fn workload(
        &self,
        workflow: &str,
    ) -> impl Future<Output = CatalogResult<Option<ReqMgrWorkload>>> + Send;
}

impl DatasetCatalog for DasClient {
    async fn dataset_names(&self, pattern: &str) -> CatalogResult<Vec<String>> {
        DasClient::dataset_names(self, pattern).await
    }

    async fn dataset_events(&self, dataset: &str) -> CatalogResult<u64> {
        DasClient::dataset_events(self, dataset).await
    }

    async fn dataset_runs(&self, dataset: &str) -> CatalogResult<BTreeSet<u32>> {
        DasClient::dataset_runs(self, dataset).await
    }

    async fn events_in_runs(&self, dataset: &str, runs: &[u32]) -> CatalogResult<u64> {
        DasClient::events_in_runs(self, dataset, runs).await
    }

    async fn lumi_events(&self, dataset: &str, runs: &[u32]) -> CatalogResult<Vec<LumiEventsRow>> {
        DasClient::lumi_events(self, dataset, runs).await
    }

    async fn dataset_summary(&self, dataset: &str) -> CatalogResult<Option<DatasetSummary>> {
        DasClient::dataset_summary(self, dataset).await
    }
}

/// Stats2 for input lookups, cmsweb for workloads.
#[derive(Debug, Clone)]
pub struct WorkflowDirectory {
    stats2: Stats2Client,
    cmsweb: CmswebClient,
}

impl WorkflowDirectory {
    pub fn new(stats2: Stats2Client, cmsweb: CmswebClient) -> Self {
        Self { stats2, cmsweb }
    }
}

impl WorkflowSource for WorkflowDirectory {
    async fn workflows_for_input(&self, dataset: &str) -> CatalogResult<Vec<Stats2Workflow>> {
        self.stats2.workflows_for_input(dataset).await
    }

    async fn workload(&self, workflow: &str) -> CatalogResult<Option<ReqMgrWorkload>> {
        self.cmsweb.reqmgr_workload(workflow).await
    }
}
