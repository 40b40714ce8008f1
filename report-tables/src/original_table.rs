//! One row per RAW dataset (two for 2016F) with a fixed set of campaign columns.

use std::collections::BTreeMap;
use std::path::Path;

use dataset_tree::name::primary_dataset_of;
use dataset_tree::records::{ChildRecord, RawRecord};
use dataset_tree::runs::{RunSet, run_difference};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::errors::TableResult;
use crate::writer::{read_json, write_json, write_timestamp};

pub const ORIGINAL_TABLE_FILE: &str = "data_original_table.json";
pub const ORIGINAL_TABLE_TIMESTAMP_FILE: &str = "original_table_timestamp.txt";

/// AOD processing strings of the two 2016F reprocessings.
const UL2016F_AOD_PS: [&str; 2] = ["21Feb2020_UL2016", "21Feb2020_UL2016_HIPM"];

/// Certified non-HIPM 2016F runs, used instead of the twiki list for non-HIPM rows.
const UL2016F_TWIKI_RUNS: [u32; 7] = [278769, 278801, 278802, 278803, 278804, 278805, 278808];

const UL2016F_PRIMARY_DATASETS: [&str; 17] = [
    "BTagCSV",
    "BTagMu",
    "Charmonium",
    "DisplacedJet",
    "DoubleEG",
    "DoubleMuon",
    "DoubleMuonLowMass",
    "JetHT",
    "HTMHT",
    "MET",
    "MuOnia",
    "MuonEG",
    "SingleElectron",
    "SingleMuon",
    "SinglePhoton",
    "Tau",
    "ZeroBias",
];

/// Where a column takes its parent from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRef {
    /// No parent node; AOD columns compare against the workload whitelist.
    Whitelist,
    /// The RAW dataset of the row.
    Raw,
    /// An earlier column of the layout.
    Column(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct TableColumn {
    pub prefix: &'static str,
    pub campaign: &'static str,
    pub parent: ParentRef,
}

const fn column(prefix: &'static str, campaign: &'static str, parent: ParentRef) -> TableColumn {
    TableColumn {
        prefix,
        campaign,
        parent,
    }
}

/// Column layout of one report flavour.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub columns: Vec<TableColumn>,
    /// Order candidates by workflow name suffix, newest first.
    pub sort_by_workflow: bool,
    /// Replace twiki runs of non-HIPM 2016F rows.
    pub twiki_2016f_exception: bool,
}

impl TableLayout {
    pub fn ul() -> Self {
        Self {
            columns: vec![
                column("aod", "AOD", ParentRef::Whitelist),
                column("miniaod_v1", "MiniAODv1", ParentRef::Column("aod")),
                column("miniaod_v1_nanoaod_v8", "NanoAODv8", ParentRef::Column("miniaod_v1")),
                column("miniaod_v2", "MiniAODv2", ParentRef::Column("aod")),
                column("miniaod_v2_nanoaod_v9", "NanoAODv9", ParentRef::Column("miniaod_v2")),
            ],
            sort_by_workflow: true,
            twiki_2016f_exception: true,
        }
    }

    pub fn run3() -> Self {
        Self {
            columns: vec![
                column("aod", "AOD", ParentRef::Raw),
                column("miniaod_v3", "MiniAODv3", ParentRef::Column("aod")),
                column("nanoaod_v10", "NanoAODv10", ParentRef::Column("miniaod_v3")),
            ],
            sort_by_workflow: false,
            twiki_2016f_exception: false,
        }
    }
}

/// `a_b_c_d` -> `b_c_d`, the date/version tail of a workflow name.
fn workflow_suffix(item: &ChildRecord) -> String {
    let name = item.workflow.as_deref().unwrap_or("");
    let parts: Vec<&str> = name.split('_').collect();
    parts[parts.len().saturating_sub(3)..].join("_")
}

/// Best item of `campaign`: `VALID` before `PRODUCTION`, never `LowPU`.
pub fn pick_output_item<'a>(
    items: &'a [ChildRecord],
    campaign: &str,
    processing_string: Option<&str>,
    sort_by_workflow: bool,
) -> Option<&'a ChildRecord> {
    let mut ordered: Vec<&ChildRecord> = items.iter().collect();
    if sort_by_workflow {
        ordered.sort_by_key(|i| workflow_suffix(i));
        ordered.reverse();
    }

    ["VALID", "PRODUCTION"].into_iter().find_map(|kind| {
        ordered.iter().copied().find(|item| {
            item.kind == kind
                && item.campaign == campaign
                && !item.processing_string.contains("LowPU")
                && processing_string.is_none_or(|ps| ps == item.processing_string)
        })
    })
}

fn twiki_2016f_exception(raw: &str) -> Option<RunSet> {
    let primary = primary_dataset_of(raw);
    let expected = format!("/{primary}/Run2016F-v1/RAW");
    (raw == expected && UL2016F_PRIMARY_DATASETS.contains(&primary))
        .then(|| UL2016F_TWIKI_RUNS.iter().copied().collect())
}

fn set(runs: &[u32]) -> RunSet {
    runs.iter().copied().collect()
}

/// Accounting values of the AOD of a row, zero when there is no AOD.
#[derive(Default)]
struct Selections {
    raw_x_dcs_runs: RunSet,
    raw_x_dcs_events: u64,
    whitelist_x_raw_runs: RunSet,
    whitelist_x_raw_events: u64,
    whitelist_x_raw_x_dcs_runs: RunSet,
    whitelist_x_raw_x_dcs_events: u64,
}

impl Selections {
    fn of(aod: Option<&ChildRecord>) -> Self {
        match aod.and_then(|a| a.accounting.as_ref()) {
            Some(acc) => Self {
                raw_x_dcs_runs: set(&acc.raw_x_dcs_runs),
                raw_x_dcs_events: acc.raw_x_dcs_events,
                whitelist_x_raw_runs: set(&acc.whitelist_x_raw_runs),
                whitelist_x_raw_events: acc.whitelist_x_raw_events,
                whitelist_x_raw_x_dcs_runs: set(&acc.whitelist_x_raw_x_dcs_runs),
                whitelist_x_raw_x_dcs_events: acc.whitelist_x_raw_x_dcs_events,
            },
            None => Self::default(),
        }
    }
}

fn ratio(events: u64, reference: u64) -> Value {
    if reference == 0 {
        Value::Null
    } else {
        Value::from(events as f64 / reference as f64)
    }
}

/// Per-column fields: dataset, status, prepid, counts and parent comparison.
fn insert_column(
    row: &mut Map<String, Value>,
    prefix: &str,
    item: Option<&ChildRecord>,
    reference: Option<(u64, RunSet)>,
) {
    let runs = item.map(ChildRecord::run_set).unwrap_or_default();
    let events = item.map_or(0, |i| i.events);

    row.insert(format!("{prefix}_dataset"), item.map(|i| i.dataset.clone()).into());
    row.insert(format!("{prefix}_dataset_status"), item.map(|i| i.kind.clone()).into());
    row.insert(format!("{prefix}_prepid"), item.and_then(|i| i.prepid.clone()).into());
    row.insert(format!("{prefix}_runs"), runs.len().into());
    row.insert(format!("{prefix}_events"), events.into());

    let (ratio_v, missing, surplus, total) = match reference {
        Some((ref_events, ref_runs)) => {
            let (missing, surplus) = run_difference(&ref_runs, &runs);
            (
                ratio(events, ref_events),
                Value::from(missing),
                Value::from(surplus),
                Value::from(missing + surplus),
            )
        }
        None => (Value::Null, Value::Null, Value::Null, Value::Null),
    };
    row.insert(format!("{prefix}_produced_vs_parent_ratio"), ratio_v);
    row.insert(format!("{prefix}_vs_parent_missing_runs"), missing);
    row.insert(format!("{prefix}_vs_parent_surplus_runs"), surplus);
    row.insert(format!("{prefix}_vs_parent_runs_diff"), total);
}

fn build_row(
    layout: &TableLayout,
    raw: &RawRecord,
    aod_ps: Option<&str>,
) -> Map<String, Value> {
    let aod = pick_output_item(&raw.output, "AOD", aod_ps, layout.sort_by_workflow);
    if let Some(aod) = aod {
        debug!(aod = %aod.dataset, kind = %aod.kind, "picked AOD");
    }

    let mut twiki_runs = set(&raw.twiki_runs);
    if layout.twiki_2016f_exception && raw.dataset.contains("2016F") {
        let ps = aod.map_or("", |a| a.processing_string.as_str());
        if !ps.contains("HIPM") {
            twiki_runs = twiki_2016f_exception(&raw.dataset).unwrap_or_default();
        }
    }

    let sel = Selections::of(aod);
    let raw_runs = raw.run_set();
    let (twiki_missing, twiki_surplus) = run_difference(&sel.whitelist_x_raw_runs, &twiki_runs);
    let (dcs_missing, dcs_surplus) = run_difference(&sel.raw_x_dcs_runs, &sel.whitelist_x_raw_runs);

    let mut row = Map::new();
    row.insert("input_dataset".into(), raw.dataset.clone().into());
    row.insert("year".into(), raw.year.clone().into());
    row.insert("primary_dataset".into(), primary_dataset_of(&raw.dataset).into());
    row.insert("twiki_runs".into(), twiki_runs.len().into());
    row.insert("raw_runs".into(), raw_runs.len().into());
    row.insert("raw_events".into(), raw.events.into());
    row.insert("raw_x_dcs_runs".into(), sel.raw_x_dcs_runs.len().into());
    row.insert("raw_x_dcs_events".into(), sel.raw_x_dcs_events.into());
    row.insert("whitelist_x_raw_runs".into(), sel.whitelist_x_raw_runs.len().into());
    row.insert("whitelist_x_raw_events".into(), sel.whitelist_x_raw_events.into());
    row.insert("whitelist_x_raw_x_dcs_runs".into(), sel.whitelist_x_raw_x_dcs_runs.len().into());
    row.insert("whitelist_x_raw_x_dcs_events".into(), sel.whitelist_x_raw_x_dcs_events.into());
    row.insert("twiki_and_whitelist_x_raw_missing_runs".into(), twiki_missing.into());
    row.insert("twiki_and_whitelist_x_raw_surplus_runs".into(), twiki_surplus.into());
    row.insert(
        "twiki_and_whitelist_x_raw_runs_diff".into(),
        (twiki_missing + twiki_surplus).into(),
    );
    row.insert("whitelist_x_raw_and_raw_x_dcs_missing_runs".into(), dcs_missing.into());
    row.insert("whitelist_x_raw_and_raw_x_dcs_surplus_runs".into(), dcs_surplus.into());
    row.insert(
        "whitelist_x_raw_and_raw_x_dcs_runs".into(),
        (dcs_missing + dcs_surplus).into(),
    );

    let mut picked: BTreeMap<&str, Option<&ChildRecord>> = BTreeMap::new();
    for column in &layout.columns {
        let (item, reference) = match column.parent {
            ParentRef::Whitelist => (
                aod,
                aod.map(|_| (sel.whitelist_x_raw_events, sel.whitelist_x_raw_runs.clone())),
            ),
            ParentRef::Raw => (aod, Some((raw.events, raw_runs.clone()))),
            ParentRef::Column(parent) => {
                let parent = picked.get(parent).copied().flatten();
                let item = parent.and_then(|p| {
                    pick_output_item(&p.output, column.campaign, None, layout.sort_by_workflow)
                });
                (item, parent.map(|p| (p.events, p.run_set())))
            }
        };
        insert_column(&mut row, column.prefix, item, reference);
        picked.insert(column.prefix, item);
    }
    row
}

/// Rows of the table for every RAW record.
pub fn original_table_rows(layout: &TableLayout, records: &[RawRecord]) -> Vec<Value> {
    let mut rows = Vec::new();
    for raw in records {
        info!(dataset = %raw.dataset, "building row");
        if raw.dataset.contains("Run2016F") {
            for ps in UL2016F_AOD_PS {
                rows.push(Value::Object(build_row(layout, raw, Some(ps))));
            }
        } else {
            rows.push(Value::Object(build_row(layout, raw, None)));
        }
    }
    rows
}

/// Reads `data.json` and writes the table and its timestamp into `output_dir`.
pub fn write_original_table(
    layout: &TableLayout,
    input: &Path,
    output_dir: &Path,
) -> TableResult<usize> {
    let records: Vec<RawRecord> = read_json(input)?;
    info!(records = records.len(), "read {}", input.display());

    let rows = original_table_rows(layout, &records);
    write_json(&output_dir.join(ORIGINAL_TABLE_FILE), &rows, 1)?;
    write_timestamp(&output_dir.join(ORIGINAL_TABLE_TIMESTAMP_FILE))?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataset_tree::records::WhitelistAccounting;
    use serde_json::json;

    fn item(
        dataset: &str,
        kind: &str,
        campaign: &str,
        ps: &str,
        workflow: &str,
        events: u64,
        runs: &[u32],
    ) -> ChildRecord {
        ChildRecord {
            dataset: dataset.into(),
            events,
            runs: runs.to_vec(),
            kind: kind.into(),
            campaign: campaign.into(),
            processing_string: ps.into(),
            prepid: Some(format!("prepid-{workflow}")),
            workflow: Some(workflow.into()),
            output: Vec::new(),
            accounting: None,
        }
    }

    fn accounting() -> WhitelistAccounting {
        WhitelistAccounting {
            whitelist_type: "runs".into(),
            raw_x_dcs_runs: vec![1, 2, 3],
            raw_x_dcs_events: 300,
            whitelist_x_raw_runs: vec![1, 2],
            whitelist_x_raw_events: 200,
            whitelist_x_raw_x_dcs_runs: vec![1, 2],
            whitelist_x_raw_x_dcs_events: 200,
        }
    }

    fn raw(dataset: &str, output: Vec<ChildRecord>) -> RawRecord {
        RawRecord {
            dataset: dataset.into(),
            events: 400,
            year: "2018".into(),
            runs: vec![1, 2, 3, 4],
            twiki_runs: vec![1, 2, 3],
            output,
        }
    }

    #[test]
    fn valid_wins_over_production_and_lowpu_is_skipped() {
        let items = vec![
            item("/A/P", "PRODUCTION", "AOD", "X", "a_b_200101_1", 1, &[]),
            item("/A/L", "VALID", "AOD", "X_LowPU", "a_b_200101_2", 1, &[]),
            item("/A/V", "VALID", "AOD", "X", "a_b_190101_1", 1, &[]),
        ];
        let picked = pick_output_item(&items, "AOD", None, true).unwrap();
        assert_eq!(picked.dataset, "/A/V");
        assert!(pick_output_item(&items, "AOD", Some("Y"), true).is_none());
        assert!(pick_output_item(&items, "MiniAODv2", None, true).is_none());
    }

    #[test]
    fn newest_workflow_suffix_first() {
        let items = vec![
            item("/A/old", "VALID", "AOD", "X", "pdmvserv_Run2018A_ReReco_190101_120000_1", 1, &[]),
            item("/A/new", "VALID", "AOD", "X", "pdmvserv_Run2018A_ReReco_200101_120000_1", 1, &[]),
        ];
        assert_eq!(pick_output_item(&items, "AOD", None, true).unwrap().dataset, "/A/new");
        // stored order when sorting is off
        assert_eq!(pick_output_item(&items, "AOD", None, false).unwrap().dataset, "/A/old");
    }

    #[test]
    fn ul_row_compares_aod_to_whitelist() {
        let mut aod = item("/A/Run2018A-AOD-v1/AOD", "VALID", "AOD", "ps", "w_1_2_3", 150, &[1, 2, 3]);
        aod.accounting = Some(accounting());
        let mut mini = item("/A/Run2018A-M-v1/MINIAOD", "VALID", "MiniAODv2", "ps", "w_1_2_3", 75, &[1]);
        mini.output = vec![item("/A/N/NANOAOD", "PRODUCTION", "NanoAODv9", "ps", "w_1_2_3", 75, &[1])];
        aod.output = vec![mini];

        let rows = original_table_rows(&TableLayout::ul(), &[raw("/A/Run2018A-v1/RAW", vec![aod])]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row["primary_dataset"], json!("A"));
        assert_eq!(row["raw_runs"], json!(4));
        assert_eq!(row["twiki_and_whitelist_x_raw_missing_runs"], json!(0));
        assert_eq!(row["twiki_and_whitelist_x_raw_surplus_runs"], json!(1));
        assert_eq!(row["whitelist_x_raw_and_raw_x_dcs_missing_runs"], json!(1));
        assert_eq!(row["whitelist_x_raw_and_raw_x_dcs_runs"], json!(1));

        assert_eq!(row["aod_produced_vs_parent_ratio"], json!(0.75));
        assert_eq!(row["aod_vs_parent_surplus_runs"], json!(1));
        assert_eq!(row["aod_prepid"], json!("prepid-w_1_2_3"));
        assert_eq!(row["miniaod_v2_produced_vs_parent_ratio"], json!(0.5));
        assert_eq!(row["miniaod_v2_vs_parent_missing_runs"], json!(2));
        assert_eq!(row["miniaod_v2_nanoaod_v9_dataset_status"], json!("PRODUCTION"));
        assert_eq!(row["miniaod_v2_nanoaod_v9_vs_parent_runs_diff"], json!(0));

        // a missing item under an existing parent still counts against it
        assert_eq!(row["miniaod_v1_dataset"], Value::Null);
        assert_eq!(row["miniaod_v1_runs"], json!(0));
        assert_eq!(row["miniaod_v1_produced_vs_parent_ratio"], json!(0.0));
        assert_eq!(row["miniaod_v1_vs_parent_runs_diff"], json!(3));
        assert_eq!(row["miniaod_v1_nanoaod_v8_vs_parent_runs_diff"], Value::Null);
    }

    #[test]
    fn run3_aod_compares_to_raw() {
        let aod = item("/A/Run2022C-PromptReco-v1/AOD", "VALID", "AOD", "PromptReco", "", 200, &[1, 2]);
        let rows = original_table_rows(&TableLayout::run3(), &[raw("/A/Run2022C-v1/RAW", vec![aod])]);
        let row = &rows[0];
        assert_eq!(row["aod_produced_vs_parent_ratio"], json!(0.5));
        assert_eq!(row["aod_vs_parent_missing_runs"], json!(2));
        assert_eq!(row["raw_x_dcs_events"], json!(0));
        assert!(row.get("nanoaod_v10_dataset").is_some());
    }

    #[test]
    fn run2016f_gives_hipm_and_non_hipm_rows() {
        let mut non_hipm = item("/JetHT/a/AOD", "VALID", "AOD", "21Feb2020_UL2016", "w_1_2_3", 1, &[278769]);
        non_hipm.accounting = Some(WhitelistAccounting {
            whitelist_x_raw_runs: vec![278769],
            ..Default::default()
        });
        let hipm = item("/JetHT/b/AOD", "VALID", "AOD", "21Feb2020_UL2016_HIPM", "w_1_2_4", 1, &[]);
        let raw = raw("/JetHT/Run2016F-v1/RAW", vec![non_hipm, hipm]);

        let rows = original_table_rows(&TableLayout::ul(), &[raw]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["aod_dataset"], json!("/JetHT/a/AOD"));
        assert_eq!(rows[0]["twiki_runs"], json!(7));
        assert_eq!(rows[1]["aod_dataset"], json!("/JetHT/b/AOD"));
        assert_eq!(rows[1]["twiki_runs"], json!(3));
    }
}
