//! MiniAOD/NanoAOD chain status of Monte-Carlo GEN requests, one row per chain.

use std::path::Path;

use catalog_client::types::{McmChainedRequest, McmRequest};
use dataset_tree::MemoCache;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ChainResult;
use crate::source::RequestSource;

pub const DATA_FILE: &str = "data.json";
pub const TIMESTAMP_FILE: &str = "update_timestamp.txt";

/// Status of a dataset that has no GEN request.
pub const NOT_EXIST: &str = "not_exist";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRow {
    pub root_prepid: String,
    pub dataset: String,
    pub status: String,
    pub mini: String,
    pub mini_status: String,
    pub mini_total_events: i64,
    pub mini_completed_events: i64,
    pub nano: String,
    pub nano_status: String,
    pub nano_total_events: i64,
    pub nano_completed_events: i64,
}

impl ChainRow {
    fn new(
        dataset: &str,
        root: Option<&McmRequest>,
        mini: Option<&McmRequest>,
        nano: Option<&McmRequest>,
    ) -> Self {
        let prepid = |r: Option<&McmRequest>| r.map(|r| r.prepid.clone()).unwrap_or_default();
        let status = |r: Option<&McmRequest>| r.map(|r| r.status.clone()).unwrap_or_default();
        Self {
            root_prepid: prepid(root),
            dataset: root.map_or_else(|| dataset.to_string(), |r| r.dataset_name.clone()),
            status: root.map_or_else(|| NOT_EXIST.to_string(), |r| r.status.clone()),
            mini: prepid(mini),
            mini_status: status(mini),
            mini_total_events: mini.map_or(0, |r| r.total_events),
            mini_completed_events: mini.map_or(0, |r| r.completed_events),
            nano: prepid(nano),
            nano_status: status(nano),
            nano_total_events: nano.map_or(0, |r| r.total_events),
            nano_completed_events: nano.map_or(0, |r| r.completed_events),
        }
    }
}

/// Chains worth following: up to NanoAOD, without the JME flavours.
fn is_nano_chain(chain_id: &str) -> bool {
    chain_id.contains("NanoAOD")
        && !chain_id.contains("NanoAODJME")
        && !chain_id.contains("NanoAODAPVJME")
}

/// Report builder with per-run memoization of McM objects.
pub struct ChainReport<'a, S> {
    source: &'a S,
    requests: MemoCache<Option<McmRequest>>,
    chains: MemoCache<Option<McmChainedRequest>>,
}

impl<'a, S: RequestSource> ChainReport<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            requests: MemoCache::new(),
            chains: MemoCache::new(),
        }
    }

    async fn request(&self, prepid: &str) -> Option<McmRequest> {
        if let Some(cached) = self.requests.get(prepid) {
            return cached;
        }
        match self.source.request(prepid).await {
            Ok(found) => {
                self.requests.insert(prepid, found.clone());
                found
            }
            Err(e) => {
                warn!(prepid, error = %e, "cannot fetch request");
                None
            }
        }
    }

    async fn chained_request(&self, prepid: &str) -> Option<McmChainedRequest> {
        if let Some(cached) = self.chains.get(prepid) {
            return cached;
        }
        match self.source.chained_request(prepid).await {
            Ok(found) => {
                self.chains.insert(prepid, found.clone());
                found
            }
            Err(e) => {
                warn!(prepid, error = %e, "cannot fetch chained request");
                None
            }
        }
    }

    /// Mini and nano members of a chain; a later member of a kind replaces an earlier one.
    async fn chain_members(&self, chain: &McmChainedRequest) -> (Option<McmRequest>, Option<McmRequest>) {
        let mut mini = None;
        let mut nano = None;
        for member in &chain.chain {
            if member.contains("MiniAOD") {
                mini = self.request(member).await;
            } else if member.contains("NanoAOD") {
                nano = self.request(member).await;
            }
        }
        (mini, nano)
    }

    /// Rows of one dataset.
    pub async fn dataset_rows(&self, dataset: &str) -> ChainResult<Vec<ChainRow>> {
        let requests = self.source.gen_requests(dataset).await?;
        info!(dataset, requests = requests.len(), "fetched requests");
        if requests.is_empty() {
            return Ok(vec![ChainRow::new(dataset, None, None, None)]);
        }

        let mut rows = Vec::new();
        for request in &requests {
            if request.prepid.contains("PPD") {
                continue;
            }
            if request.member_of_chain.is_empty() {
                rows.push(ChainRow::new(dataset, Some(request), None, None));
                continue;
            }

            for chain_id in request.member_of_chain.iter().filter(|c| is_nano_chain(c)) {
                debug!(request = %request.prepid, chain = %chain_id, "chained request");
                let Some(chain) = self.chained_request(chain_id).await else {
                    warn!(chain = %chain_id, "chained request not found");
                    continue;
                };
                let (mini, nano) = self.chain_members(&chain).await;
                rows.push(ChainRow::new(dataset, Some(request), mini.as_ref(), nano.as_ref()));
            }
        }
        Ok(rows)
    }

    /// Rows of every dataset, in input order; a failed search skips its dataset.
    pub async fn rows(&self, datasets: &[String], concurrency: usize) -> Vec<ChainRow> {
        let total = datasets.len();
        let per_dataset: Vec<Vec<ChainRow>> = stream::iter(datasets.iter().enumerate())
            .map(|(index, dataset)| async move {
                info!("{}/{} dataset {}", index + 1, total, dataset);
                match self.dataset_rows(dataset).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(dataset = %dataset, error = %e, "request search failed");
                        Vec::new()
                    }
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;
        per_dataset.into_iter().flatten().collect()
    }
}

/// Builds the chain report for `datasets` and writes it into `output_dir`.
pub async fn write_chain_report<S: RequestSource>(
    source: &S,
    datasets: &[String],
    concurrency: usize,
    output_dir: &Path,
) -> ChainResult<usize> {
    let rows = ChainReport::new(source).rows(datasets, concurrency).await;
    report_tables::write_json(&output_dir.join(DATA_FILE), &rows, 2)?;
    report_tables::write_timestamp(&output_dir.join(TIMESTAMP_FILE))?;
    Ok(rows.len())
}
