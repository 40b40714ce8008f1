//! Stuck-transfer report over workflows in `staging`.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use catalog_client::types::{Stats2Workflow, TransferEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::errors::TransferResult;
use crate::progress::TransferProgress;
use crate::source::TransferSource;

pub const DATA_FILE: &str = "data.json";
pub const TIMESTAMP_FILE: &str = "update_timestamp.txt";

const STAGING: &str = "staging";
const DEFAULT_DATATYPE: &str = "primary";
const RULE_BUCKETS: [&str; 4] = ["OK", "REPLICATING", "STUCK", "SUSPENDED"];

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub page_size: usize,
    /// Pause between two status pages.
    pub page_pause: Duration,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            page_pause: Duration::from_millis(250),
        }
    }
}

/// Rule state -> rule ids.
pub type RucioRules = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRow {
    pub workflow: String,
    pub dataset: Option<String>,
    pub datatype: String,
    pub first_completion: f64,
    pub last_completion: f64,
    pub time_in_staging: f64,
    pub stuck_time: i64,
    pub speed: f64,
    pub eta: f64,
    pub rucio_rules: RucioRules,
    /// Number of transfer ids.
    pub transfers: usize,
}

/// All workflows whose last status is `staging`, page by page until an empty page.
pub async fn staging_workflows<S: TransferSource>(
    source: &S,
    opts: &MonitorOptions,
) -> TransferResult<Vec<Stats2Workflow>> {
    let page_size = opts.page_size.max(1);
    let mut all = Vec::new();
    for page in 0.. {
        let fetched = source.staging_page(page_size, page * page_size).await?;
        info!(page, found = fetched.len(), total = all.len() + fetched.len(), "fetched page");
        if fetched.is_empty() {
            break;
        }
        all.extend(fetched);
        tokio::time::sleep(opts.page_pause).await;
    }
    Ok(all)
}

async fn rucio_rules<S: TransferSource>(source: &S, transfer_ids: &[String]) -> RucioRules {
    let mut rules: RucioRules = RULE_BUCKETS
        .iter()
        .map(|b| (b.to_string(), Vec::new()))
        .collect();
    debug!(transfers = transfer_ids.len(), "getting rules");
    for id in transfer_ids {
        match source.rule_state(id).await {
            Ok(Some(state)) => rules.entry(state).or_default().push(id.clone()),
            Ok(None) => break,
            Err(e) => warn!(rule = %id, error = %e, "rucio error"),
        }
    }
    rules
}

async fn transfer_row<S: TransferSource>(
    source: &S,
    workflow: &str,
    staging: f64,
    last_update: f64,
    transfer: &TransferEntry,
) -> TransferRow {
    let completion = transfer.completion.as_deref().unwrap_or(&[0.0]);
    let progress = TransferProgress::compute(completion, staging, last_update);
    debug!(
        completion = ?completion,
        interval = progress.update_interval,
        stuck_time = progress.stuck_time,
        "transfer progress"
    );

    TransferRow {
        workflow: workflow.to_string(),
        dataset: transfer.dataset.clone(),
        datatype: transfer
            .data_type
            .clone()
            .unwrap_or_else(|| DEFAULT_DATATYPE.to_string()),
        first_completion: progress.first_completion,
        last_completion: progress.last_completion,
        time_in_staging: progress.time_in_staging,
        stuck_time: progress.stuck_time,
        speed: progress.speed,
        eta: progress.eta,
        rucio_rules: rucio_rules(source, &transfer.transfer_ids).await,
        transfers: transfer.transfer_ids.len(),
    }
}

/// Rows of one staging workflow; none when it has no transfer document.
#[instrument(skip_all, fields(workflow = %workflow.request_name))]
pub async fn workflow_rows<S: TransferSource>(source: &S, workflow: &Stats2Workflow) -> Vec<TransferRow> {
    let staging = workflow.last_transition_time(STAGING).unwrap_or(0.0);
    debug!(staging, "staging timestamp");

    let doc = match source.transferor_info(&workflow.request_name).await {
        Ok(info) => info.and_then(|i| i.transfer_doc),
        Err(e) => {
            warn!(error = %e, "transferor lookup failed");
            None
        }
    };
    let Some(doc) = doc else {
        return Vec::new();
    };

    let mut rows = Vec::with_capacity(doc.transfers.len());
    for transfer in &doc.transfers {
        rows.push(transfer_row(source, &workflow.request_name, staging, doc.last_update, transfer).await);
    }
    rows
}

/// Builds the report and writes it into `output_dir`.
pub async fn write_transfer_report<S: TransferSource>(
    source: &S,
    opts: &MonitorOptions,
    output_dir: &Path,
) -> TransferResult<usize> {
    let workflows = staging_workflows(source, opts).await?;
    let mut rows = Vec::new();
    for workflow in &workflows {
        rows.extend(workflow_rows(source, workflow).await);
    }

    report_tables::write_json(&output_dir.join(DATA_FILE), &rows, 1)?;
    report_tables::write_timestamp(&output_dir.join(TIMESTAMP_FILE))?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_client::errors::CatalogResult;
    use catalog_client::types::TransferorInfo;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeServices {
        workflows: Vec<Stats2Workflow>,
        infos: BTreeMap<String, TransferorInfo>,
        rules: Option<BTreeMap<String, String>>,
        pages: AtomicUsize,
    }

    impl TransferSource for FakeServices {
        async fn staging_page(&self, limit: usize, skip: usize) -> CatalogResult<Vec<Stats2Workflow>> {
            self.pages.fetch_add(1, Ordering::SeqCst);
            Ok(self.workflows.iter().skip(skip).take(limit).cloned().collect())
        }

        async fn transferor_info(&self, workflow: &str) -> CatalogResult<Option<TransferorInfo>> {
            Ok(self.infos.get(workflow).cloned())
        }

        async fn rule_state(&self, rule_id: &str) -> CatalogResult<Option<String>> {
            Ok(self
                .rules
                .as_ref()
                .map(|r| r.get(rule_id).cloned().unwrap_or_else(|| "WAITING_APPROVAL".into())))
        }
    }

    fn workflow(name: &str) -> Stats2Workflow {
        serde_json::from_value(serde_json::json!({
            "RequestName": name,
            "RequestTransition": [
                {"Status": "staging", "UpdateTime": 500.0},
                {"Status": "assigned", "UpdateTime": 900.0},
                {"Status": "staging", "UpdateTime": 1000.0}
            ]
        }))
        .unwrap()
    }

    fn info(last_update: f64, completion: Option<Vec<f64>>, ids: &[&str]) -> TransferorInfo {
        serde_json::from_value(serde_json::json!({
            "transferDoc": {
                "lastUpdate": last_update,
                "transfers": [{
                    "dataset": "/A/B/RAW",
                    "completion": completion,
                    "transferIDs": ids
                }]
            }
        }))
        .unwrap()
    }

    fn opts() -> MonitorOptions {
        MonitorOptions {
            page_size: 2,
            page_pause: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn pages_until_empty() {
        let fake = FakeServices {
            workflows: (0..5).map(|i| workflow(&format!("wf{i}"))).collect(),
            ..Default::default()
        };
        let all = staging_workflows(&fake, &opts()).await.unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(fake.pages.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn rows_use_last_staging_transition_and_bucket_rules() {
        let mut fake = FakeServices::default();
        fake.infos.insert(
            "wf".into(),
            info(1300.0, Some(vec![0.0, 10.0, 40.0, 40.0]), &["r1", "r2", "r3"]),
        );
        fake.rules = Some(
            [("r1", "OK"), ("r2", "STUCK")]
                .into_iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        );

        let rows = workflow_rows(&fake, &workflow("wf")).await;
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.datatype, "primary");
        assert_eq!(row.time_in_staging, 300.0);
        assert_eq!(row.first_completion, 10.0);
        assert_eq!(row.last_completion, 40.0);
        // last change at sample 2 of an interval of 100 s
        assert_eq!(row.stuck_time, 100);
        assert_eq!(row.transfers, 3);
        assert_eq!(row.rucio_rules["OK"], vec!["r1"]);
        assert_eq!(row.rucio_rules["STUCK"], vec!["r2"]);
        assert!(row.rucio_rules["SUSPENDED"].is_empty());
        assert_eq!(row.rucio_rules["WAITING_APPROVAL"], vec!["r3"]);
    }

    #[tokio::test]
    async fn missing_documents_and_completion() {
        let mut fake = FakeServices::default();
        assert!(workflow_rows(&fake, &workflow("unknown")).await.is_empty());

        fake.infos.insert("wf".into(), info(1000.0, None, &["r1"]));
        let rows = workflow_rows(&fake, &workflow("wf")).await;
        assert_eq!(rows[0].last_completion, 0.0);
        assert_eq!(rows[0].eta, 0.0);
        // rucio not configured
        assert_eq!(rows[0].rucio_rules.len(), 4);
        assert!(rows[0].rucio_rules.values().all(Vec::is_empty));
    }

    #[tokio::test]
    async fn report_files_are_written() {
        let mut fake = FakeServices {
            workflows: vec![workflow("wf"), workflow("no_doc")],
            ..Default::default()
        };
        fake.infos.insert("wf".into(), info(1300.0, Some(vec![0.0, 50.0]), &[]));

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(write_transfer_report(&fake, &opts(), dir.path()).await.unwrap(), 1);
        let text = std::fs::read_to_string(dir.path().join(DATA_FILE)).unwrap();
        let rows: Vec<TransferRow> = serde_json::from_str(&text).unwrap();
        assert_eq!(rows[0].workflow, "wf");
        assert!(dir.path().join(TIMESTAMP_FILE).exists());
    }
}
