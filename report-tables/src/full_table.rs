//! Root-to-leaf rows of the UL report tree with production fractions.
//!
//! Every node gets compared to its parent: AOD nodes with whitelist
//! accounting are compared to the certified RAW selection instead.

use std::path::Path;

use dataset_tree::records::{ChildRecord, RawRecord, WhitelistAccounting};
use dataset_tree::runs::{RunSet, run_difference};
use serde_json::{Map, Value};
use tracing::info;

use crate::errors::{TableError, TableResult};
use crate::writer::{write_json, write_timestamp};

pub const FULL_TABLE_FILE: &str = "data_full_table.json";
pub const FULL_TABLE_TIMESTAMP_FILE: &str = "full_table_timestamp.txt";

/// Events and runs of the node a child is compared to.
struct NodeStats {
    events: u64,
    runs: RunSet,
}

fn ratio(events: u64, reference: u64) -> Value {
    if reference == 0 {
        Value::Null
    } else {
        Value::from(events as f64 / reference as f64)
    }
}

fn diff(a: u64, b: u64) -> i64 {
    a as i64 - b as i64
}

/// `fraction`, `missing_runs`, `surplus_runs`, `events_difference` against a reference.
fn insert_comparison(row: &mut Map<String, Value>, events: u64, runs: &RunSet, reference: &NodeStats) {
    let (missing, surplus) = run_difference(&reference.runs, runs);
    row.insert("fraction".into(), ratio(events, reference.events));
    row.insert("missing_runs".into(), missing.into());
    row.insert("surplus_runs".into(), surplus.into());
    row.insert("events_difference".into(), diff(events, reference.events).into());
}

fn insert_whitelist_comparison(row: &mut Map<String, Value>, acc: &WhitelistAccounting) {
    let raw_x_dcs: RunSet = acc.raw_x_dcs_runs.iter().copied().collect();
    for (prefix, runs, events) in [
        ("whitelist_x_raw", &acc.whitelist_x_raw_runs, acc.whitelist_x_raw_events),
        (
            "whitelist_x_raw_x_dcs",
            &acc.whitelist_x_raw_x_dcs_runs,
            acc.whitelist_x_raw_x_dcs_events,
        ),
    ] {
        let runs: RunSet = runs.iter().copied().collect();
        let (missing, surplus) = run_difference(&raw_x_dcs, &runs);
        row.insert(format!("{prefix}_and_raw_x_dcs_surplus_runs"), surplus.into());
        row.insert(format!("{prefix}_and_raw_x_dcs_missing_runs"), missing.into());
        row.insert(
            format!("{prefix}_and_raw_x_dcs_events_diff"),
            diff(events, acc.raw_x_dcs_events).into(),
        );
    }
}

/// Serialized node without `output`, run lists replaced by their length.
fn flat_node<T: serde::Serialize>(node: &T) -> TableResult<Map<String, Value>> {
    let value = serde_json::to_value(node).map_err(|e| TableError::json(FULL_TABLE_FILE, e))?;
    let Value::Object(mut map) = value else {
        return Ok(Map::new());
    };
    map.remove("output");
    for (key, value) in map.iter_mut() {
        if key == "runs" || key.ends_with("_runs") {
            if let Value::Array(list) = value {
                *value = Value::from(list.len());
            }
        }
    }
    Ok(map)
}

fn child_rows(
    item: &ChildRecord,
    parent: &NodeStats,
    path: &mut Vec<Value>,
    rows: &mut Vec<Vec<Value>>,
) -> TableResult<()> {
    let runs = item.run_set();
    let mut row = flat_node(item)?;
    match &item.accounting {
        Some(acc) => {
            let raw_x_dcs = NodeStats {
                events: acc.raw_x_dcs_events,
                runs: acc.raw_x_dcs_runs.iter().copied().collect(),
            };
            insert_whitelist_comparison(&mut row, acc);
            insert_comparison(&mut row, item.events, &runs, &raw_x_dcs);
        }
        None => insert_comparison(&mut row, item.events, &runs, parent),
    }

    path.push(Value::Object(row));
    if item.output.is_empty() {
        rows.push(path.clone());
    } else {
        let stats = NodeStats {
            events: item.events,
            runs,
        };
        for child in &item.output {
            child_rows(child, &stats, path, rows)?;
        }
    }
    path.pop();
    Ok(())
}

/// Root-to-leaf rows of every RAW tree.
pub fn full_table_rows(records: &[RawRecord]) -> TableResult<Vec<Vec<Value>>> {
    let mut rows = Vec::new();
    for raw in records {
        let mut path = vec![Value::Object(flat_node(raw)?)];
        if raw.output.is_empty() {
            rows.push(path);
            continue;
        }
        let stats = NodeStats {
            events: raw.events,
            runs: raw.run_set(),
        };
        for child in &raw.output {
            child_rows(child, &stats, &mut path, &mut rows)?;
        }
    }
    Ok(rows)
}

/// Reads `data.json` and writes the full table and its timestamp into `output_dir`.
pub fn write_full_table(input: &Path, output_dir: &Path) -> TableResult<usize> {
    let records: Vec<RawRecord> = crate::writer::read_json(input)?;
    info!(records = records.len(), "read {}", input.display());

    let rows = full_table_rows(&records)?;
    write_json(&output_dir.join(FULL_TABLE_FILE), &rows, 2)?;
    write_timestamp(&output_dir.join(FULL_TABLE_TIMESTAMP_FILE))?;
    Ok(rows.len())
}
