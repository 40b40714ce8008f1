//! Service payloads normalized into plain structs.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Dataset info and file summary of a dataset that is usable for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub name: String,
    pub status: String,
    pub nevents: u64,
    pub nfiles: u64,
    pub last_modification_date: i64,
}

/// One row of a `file,run,lumi,events` catalog query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumiEventsRow {
    pub run: u32,
    pub lumis: Vec<u32>,
    /// Events per lumi, aligned with `lumis`; zeros when the catalog has no counts.
    pub events: Vec<u64>,
}

/// Output dataset entry of a workflow event-number snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDatasetInfo {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(rename = "Events", default)]
    pub events: u64,
}

/// One entry of a workflow `EventNumberHistory`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventNumberSnapshot {
    #[serde(rename = "Datasets", default)]
    pub datasets: BTreeMap<String, OutputDatasetInfo>,
}

/// Status transition of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTransition {
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "UpdateTime", default)]
    pub update_time: f64,
}

/// Workflow document from the processing status database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats2Workflow {
    #[serde(rename = "RequestName")]
    pub request_name: String,
    #[serde(rename = "RequestType", default, deserialize_with = "lenient_string")]
    pub request_type: String,
    #[serde(rename = "PrepID", default, deserialize_with = "lenient_string")]
    pub prepid: String,
    #[serde(
        rename = "ProcessingString",
        default,
        deserialize_with = "lenient_string"
    )]
    pub processing_string: String,
    #[serde(rename = "EventNumberHistory", default)]
    pub event_number_history: Vec<EventNumberSnapshot>,
    #[serde(rename = "RequestTransition", default)]
    pub request_transition: Vec<RequestTransition>,
}

impl Stats2Workflow {
    /// Latest output dataset snapshot, if any was recorded.
    pub fn latest_outputs(&self) -> Option<&EventNumberSnapshot> {
        self.event_number_history.last()
    }

    /// Update time of the most recent transition into `status`.
    pub fn last_transition_time(&self, status: &str) -> Option<f64> {
        self.request_transition
            .iter()
            .rev()
            .find(|t| t.status == status)
            .map(|t| t.update_time)
    }
}

/// Run/lumi whitelist settings of a workload in the request manager cache.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReqMgrWorkload {
    #[serde(rename = "LumiList", default)]
    pub lumi_list: Option<BTreeMap<String, Vec<[u32; 2]>>>,
    #[serde(rename = "RunWhitelist", default)]
    pub run_whitelist: Option<Vec<u32>>,
}

impl ReqMgrWorkload {
    /// Lumi whitelist when present and non-empty.
    pub fn lumi_whitelist(&self) -> Option<&BTreeMap<String, Vec<[u32; 2]>>> {
        self.lumi_list.as_ref().filter(|l| !l.is_empty())
    }
}

/// One input transfer tracked by the transferor service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEntry {
    #[serde(default)]
    pub dataset: Option<String>,
    #[serde(rename = "dataType", default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub completion: Option<Vec<f64>>,
    #[serde(rename = "transferIDs", default)]
    pub transfer_ids: Vec<String>,
}

/// Transfer document attached to a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDoc {
    #[serde(rename = "lastUpdate", default)]
    pub last_update: f64,
    #[serde(default)]
    pub transfers: Vec<TransferEntry>,
}

/// Transferor info record for one workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferorInfo {
    #[serde(rename = "transferDoc", default)]
    pub transfer_doc: Option<TransferDoc>,
}

/// Request record of the request management service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McmRequest {
    pub prepid: String,
    #[serde(default)]
    pub dataset_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub member_of_chain: Vec<String>,
    #[serde(default)]
    pub total_events: i64,
    #[serde(default)]
    pub completed_events: i64,
}

/// Chained request record: ordered prepids of the chain members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McmChainedRequest {
    pub prepid: String,
    #[serde(default)]
    pub chain: Vec<String>,
}

/// Accepts a JSON string and maps anything else (objects, null) to "".
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stats2_workflow_tolerates_non_string_processing_string() {
        let wf: Stats2Workflow = serde_json::from_value(json!({
            "RequestName": "pdmvserv_Run2018A_ZeroBias_12Nov2019_UL2018_191202_155102_3101",
            "RequestType": "ReReco",
            "PrepID": "ReReco-Run2018A-ZeroBias-12Nov2019_UL2018-00001",
            "ProcessingString": {"Task1": "A", "Task2": "B"},
            "EventNumberHistory": [
                {"Datasets": {"/ZeroBias/Run2018A-12Nov2019_UL2018-v2/AOD": {"Type": "VALID", "Events": 10}}}
            ]
        }))
        .unwrap();
        assert_eq!(wf.processing_string, "");
        let latest = wf.latest_outputs().unwrap();
        assert_eq!(latest.datasets.len(), 1);
    }

    #[test]
    fn last_transition_time_picks_latest_match() {
        let wf: Stats2Workflow = serde_json::from_value(json!({
            "RequestName": "wf",
            "RequestTransition": [
                {"Status": "staging", "UpdateTime": 10.0},
                {"Status": "staged", "UpdateTime": 20.0},
                {"Status": "staging", "UpdateTime": 30.0}
            ]
        }))
        .unwrap();
        assert_eq!(wf.last_transition_time("staging"), Some(30.0));
        assert_eq!(wf.last_transition_time("running"), None);
    }

    #[test]
    fn empty_lumi_list_counts_as_absent() {
        let w: ReqMgrWorkload =
            serde_json::from_value(json!({"LumiList": {}, "RunWhitelist": [1, 2]})).unwrap();
        assert!(w.lumi_whitelist().is_none());
        assert_eq!(w.run_whitelist, Some(vec![1, 2]));
    }
}
