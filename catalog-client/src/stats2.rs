//! Processing-status database (CouchDB) views.
//!
//! - `inputDatasets` view: workflows reading a dataset
//! - `lastStatus` view: workflows by their current status, paged

use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::errors::CatalogResult;
use crate::http;
use crate::types::Stats2Workflow;

const VIEW_ROOT: &str = "requests/_design/_designDoc/_view";

/// Request types that never produce report-relevant outputs.
const IGNORED_REQUEST_TYPES: [&str; 2] = ["resubmission", "dqmharvest"];

#[derive(Debug, Deserialize)]
struct ViewResponse {
    #[serde(default)]
    rows: Vec<ViewRow>,
}

#[derive(Debug, Deserialize)]
struct ViewRow {
    doc: Option<Stats2Workflow>,
}

impl ViewResponse {
    fn into_docs(self) -> Vec<Stats2Workflow> {
        self.rows.into_iter().filter_map(|r| r.doc).collect()
    }
}

/// Plain-HTTP client of the processing-status CouchDB.
#[derive(Debug, Clone)]
pub struct Stats2Client {
    client: reqwest::Client,
    base: String,
}

impl Stats2Client {
    pub fn new(cfg: &ClientConfig) -> CatalogResult<Self> {
        let client = http::build_client(cfg.timeout, None, HeaderMap::new())?;
        debug!("Creating Stats2Client for {}", cfg.stats2_url);
        Ok(Self {
            client,
            base: cfg.stats2_url.clone(),
        })
    }

    /// Workflows that take `dataset` as input, without resubmissions and DQM harvesting.
    #[instrument(skip(self))]
    pub async fn workflows_for_input(&self, dataset: &str) -> CatalogResult<Vec<Stats2Workflow>> {
        let url = format!(
            "{}/{}/inputDatasets?key={}&include_docs=True",
            self.base,
            VIEW_ROOT,
            view_key(dataset)
        );
        let resp: Option<ViewResponse> = http::get_json(&self.client, &url).await?;
        let docs = resp.map(ViewResponse::into_docs).unwrap_or_default();
        Ok(keep_relevant(docs))
    }

    /// One page of workflows whose last status is `status`.
    #[instrument(skip(self))]
    pub async fn workflows_in_status(
        &self,
        status: &str,
        limit: usize,
        skip: usize,
    ) -> CatalogResult<Vec<Stats2Workflow>> {
        let url = format!(
            "{}/{}/lastStatus?key={}&limit={}&skip={}&include_docs=True",
            self.base,
            VIEW_ROOT,
            view_key(status),
            limit,
            skip
        );
        let resp: Option<ViewResponse> = http::get_json(&self.client, &url).await?;
        Ok(resp.map(ViewResponse::into_docs).unwrap_or_default())
    }
}

/// JSON string key of a view query, URL-encoded.
fn view_key(value: &str) -> String {
    urlencoding::encode(&format!("\"{value}\"")).into_owned()
}

fn keep_relevant(docs: Vec<Stats2Workflow>) -> Vec<Stats2Workflow> {
    docs.into_iter()
        .filter(|w| {
            let kind = w.request_type.to_lowercase();
            !IGNORED_REQUEST_TYPES.contains(&kind.as_str())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_keys_are_quoted_and_encoded() {
        assert_eq!(
            view_key("/ZeroBias/Run2018A-v1/RAW"),
            "%22%2FZeroBias%2FRun2018A-v1%2FRAW%22"
        );
        assert_eq!(view_key("staging"), "%22staging%22");
    }

    #[test]
    fn view_rows_without_doc_are_dropped() {
        let resp: ViewResponse = serde_json::from_str(
            r#"{"rows": [
                {"id": "a", "doc": {"RequestName": "a", "RequestType": "ReReco"}},
                {"id": "b"}
            ]}"#,
        )
        .unwrap();
        let docs = resp.into_docs();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].request_name, "a");
    }

    #[test]
    fn resubmissions_and_harvesting_are_ignored() {
        let resp: ViewResponse = serde_json::from_str(
            r#"{"rows": [
                {"doc": {"RequestName": "a", "RequestType": "ReReco"}},
                {"doc": {"RequestName": "b", "RequestType": "Resubmission"}},
                {"doc": {"RequestName": "c", "RequestType": "DQMHarvest"}},
                {"doc": {"RequestName": "d", "RequestType": "TaskChain"}}
            ]}"#,
        )
        .unwrap();
        let names: Vec<_> = keep_relevant(resp.into_docs())
            .into_iter()
            .map(|w| w.request_name)
            .collect();
        assert_eq!(names, vec!["a", "d"]);
    }
}
