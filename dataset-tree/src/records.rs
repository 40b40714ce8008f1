//! Report tree nodes as they are written to `data.json`.

use serde::{Deserialize, Serialize};

use crate::runs::RunSet;

/// Whitelist accounting of an AOD dataset against its RAW parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistAccounting {
    /// `lumis` when the workload carried a lumi list, `runs` otherwise.
    pub whitelist_type: String,
    pub raw_x_dcs_runs: Vec<u32>,
    pub raw_x_dcs_events: u64,
    pub whitelist_x_raw_runs: Vec<u32>,
    pub whitelist_x_raw_events: u64,
    pub whitelist_x_raw_x_dcs_runs: Vec<u32>,
    pub whitelist_x_raw_x_dcs_events: u64,
}

/// AOD, MINIAOD or NANOAOD node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildRecord {
    pub dataset: String,
    pub events: u64,
    pub runs: Vec<u32>,
    #[serde(rename = "type")]
    pub kind: String,
    pub campaign: String,
    pub processing_string: String,
    pub prepid: Option<String>,
    pub workflow: Option<String>,
    #[serde(default)]
    pub output: Vec<ChildRecord>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub accounting: Option<WhitelistAccounting>,
}

impl ChildRecord {
    pub fn run_set(&self) -> RunSet {
        self.runs.iter().copied().collect()
    }
}

/// RAW dataset at the root of a report tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub dataset: String,
    pub events: u64,
    pub year: String,
    pub runs: Vec<u32>,
    #[serde(default)]
    pub twiki_runs: Vec<u32>,
    #[serde(default)]
    pub output: Vec<ChildRecord>,
}

impl RawRecord {
    pub fn run_set(&self) -> RunSet {
        self.runs.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn aod(accounting: Option<WhitelistAccounting>) -> ChildRecord {
        ChildRecord {
            dataset: "/A/Run2018A-12Nov2019_UL2018-v2/AOD".into(),
            events: 10,
            runs: vec![1, 2],
            kind: "VALID".into(),
            campaign: "AOD".into(),
            processing_string: "12Nov2019_UL2018".into(),
            prepid: Some("ReReco-Run2018A-A-12Nov2019_UL2018-00001".into()),
            workflow: Some("wf".into()),
            output: Vec::new(),
            accounting,
        }
    }

    #[test]
    fn accounting_fields_are_flat() {
        let item = aod(Some(WhitelistAccounting {
            whitelist_type: "runs".into(),
            raw_x_dcs_runs: vec![1],
            raw_x_dcs_events: 5,
            ..Default::default()
        }));
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["type"], json!("VALID"));
        assert_eq!(v["whitelist_type"], json!("runs"));
        assert_eq!(v["raw_x_dcs_events"], json!(5));
        assert!(v.get("accounting").is_none());
    }

    #[test]
    fn records_without_accounting_read_back() {
        let v = json!({
            "dataset": "/A/Run2022C-PromptReco-v1/AOD",
            "events": 3,
            "runs": [7],
            "type": "PRODUCTION",
            "campaign": "AOD",
            "processing_string": "PromptReco",
            "prepid": null,
            "workflow": null,
            "output": []
        });
        let item: ChildRecord = serde_json::from_value(v).unwrap();
        assert!(item.accounting.is_none());
        assert!(item.prepid.is_none());

        let serialized = serde_json::to_value(&aod(None)).unwrap();
        assert!(serialized.get("whitelist_type").is_none());
    }
}
