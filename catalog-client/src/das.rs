//! Shell-out client for the dataset catalog CLI (`dasgoclient`).
//!
//! Queries used:
//!   * `dataset=<pattern> | grep dataset.name`
//!   * `dataset=<pattern>` (JSON)
//!   * `dataset=<ds> | grep dataset.nevents`
//!   * `run dataset=<ds>`
//!   * `file run in [..] dataset=<ds> | sum(file.nevents)`
//!   * `file,run,lumi,events dataset=<ds> run in [..]`
//!   * `<ds>` (JSON, file summary + dataset info)
//!
//! The query is passed as a single `--query=` argument, no shell involved.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::errors::{CatalogError, CatalogResult, DasError};
use crate::types::{DatasetSummary, LumiEventsRow};

const FILE_SUMMARY: &str = "dbs3:filesummaries";
const DATASET_INFO: &str = "dbs3:dataset_info";

/// Thin wrapper around the catalog CLI binary.
#[derive(Debug, Clone)]
pub struct DasClient {
    binary: PathBuf,
}

impl DasClient {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        let binary = binary.into();
        debug!("Creating DasClient with binary={}", binary.display());
        Self { binary }
    }

    /// Runs one query and returns its stdout.
    async fn run(&self, query: &str, json: bool) -> CatalogResult<String> {
        debug!(query, json, "das query");
        let mut cmd = Command::new(&self.binary);
        cmd.arg(format!("--query={query}"));
        if json {
            cmd.arg("--json");
        }

        let out = cmd.output().await.map_err(DasError::Spawn)?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(DasError::Exit {
                query: query.to_string(),
                code: out.status.code(),
                stderr: snippet(&stderr),
            }
            .into());
        }

        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    /// Dataset names matching a wildcard pattern.
    pub async fn dataset_names(&self, pattern: &str) -> CatalogResult<Vec<String>> {
        let out = self
            .run(&format!("dataset={pattern} | grep dataset.name"), false)
            .await?;
        Ok(parse_lines(&out))
    }

    /// Dataset names matching a wildcard pattern, read from the JSON output.
    pub async fn dataset_names_json(&self, pattern: &str) -> CatalogResult<Vec<String>> {
        let out = self.run(&format!("dataset={pattern}"), true).await?;
        Ok(parse_names_json(&out)?)
    }

    /// Total number of events of a dataset.
    pub async fn dataset_events(&self, dataset: &str) -> CatalogResult<u64> {
        let query = format!("dataset={dataset} | grep dataset.nevents");
        let out = self.run(&query, false).await?;
        parse_count(&query, &out)
    }

    /// Runs present in a dataset.
    pub async fn dataset_runs(&self, dataset: &str) -> CatalogResult<BTreeSet<u32>> {
        let query = format!("run dataset={dataset}");
        let out = self.run(&query, false).await?;
        parse_runs(&query, &out)
    }

    /// Sum of file events of a dataset restricted to the given runs.
    pub async fn events_in_runs(&self, dataset: &str, runs: &[u32]) -> CatalogResult<u64> {
        let query = format!(
            "file run in {} dataset={dataset} | sum(file.nevents)",
            run_list(runs)
        );
        let out = self.run(&query, false).await?;
        parse_sum(&query, &out)
    }

    /// Per-file run, lumi and event rows for the given runs.
    pub async fn lumi_events(
        &self,
        dataset: &str,
        runs: &[u32],
    ) -> CatalogResult<Vec<LumiEventsRow>> {
        let query = format!(
            "file,run,lumi,events dataset={dataset} run in {}",
            run_list(runs)
        );
        let out = self.run(&query, false).await?;
        parse_lumi_rows(&query, &out)
    }

    /// Summary of a dataset when it is `VALID`/`PRODUCTION` and has files.
    pub async fn dataset_summary(&self, dataset: &str) -> CatalogResult<Option<DatasetSummary>> {
        let out = self.run(dataset, true).await?;
        Ok(parse_summary(&out)?)
    }
}

/// Compact `[a,b,c]` rendering used by run filters.
pub fn run_list(runs: &[u32]) -> String {
    let joined: Vec<String> = runs.iter().map(u32::to_string).collect();
    format!("[{}]", joined.join(","))
}

fn snippet(s: &str) -> String {
    let s = s.trim();
    if s.len() > 300 {
        let mut end = 300;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    } else {
        s.to_string()
    }
}

fn parse_error(query: &str, output: &str) -> DasError {
    DasError::Parse {
        query: query.to_string(),
        output: snippet(output),
    }
}

/// Non-empty trimmed lines.
pub fn parse_lines(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_count(query: &str, out: &str) -> CatalogResult<u64> {
    out.trim()
        .parse::<u64>()
        .map_err(|_| parse_error(query, out).into())
}

fn parse_runs(query: &str, out: &str) -> CatalogResult<BTreeSet<u32>> {
    parse_lines(out)
        .iter()
        .map(|l| {
            l.parse::<u32>()
                .map_err(|_| CatalogError::from(parse_error(query, out)))
        })
        .collect()
}

/// Last whitespace token of an aggregation output, e.g. `sum(file.nevents): 1234`.
fn parse_sum(query: &str, out: &str) -> CatalogResult<u64> {
    let token = out
        .split_whitespace()
        .last()
        .map(|t| t.rsplit('=').next().unwrap_or(t))
        .ok_or_else(|| parse_error(query, out))?;
    let value = token
        .parse::<f64>()
        .map_err(|_| parse_error(query, out))?;
    if !value.is_finite() || value < 0.0 {
        return Err(parse_error(query, out).into());
    }
    Ok(value.trunc() as u64)
}

fn parse_bracket_list<T: std::str::FromStr>(s: &str) -> Option<Vec<T>> {
    s.trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<T>().ok())
        .collect()
}

fn parse_lumi_rows(query: &str, out: &str) -> CatalogResult<Vec<LumiEventsRow>> {
    let mut rows = Vec::new();
    for line in parse_lines(out) {
        // <file> <run> [l1,l2] [e1,e2]|null
        let parts: Vec<&str> = line.split(' ').filter(|p| !p.is_empty()).collect();
        if parts.len() < 3 {
            return Err(parse_error(query, &line).into());
        }
        let run = parts[1]
            .parse::<u32>()
            .map_err(|_| parse_error(query, &line))?;
        let lumis: Vec<u32> =
            parse_bracket_list(parts[2]).ok_or_else(|| parse_error(query, &line))?;
        let events: Vec<u64> = match parts.get(3) {
            Some(&raw) if raw != "null" => {
                parse_bracket_list(raw).ok_or_else(|| parse_error(query, &line))?
            }
            _ => vec![0; lumis.len()],
        };
        rows.push(LumiEventsRow { run, lumis, events });
    }
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct DasRecord {
    das: DasMeta,
    #[serde(default)]
    dataset: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DasMeta {
    #[serde(default)]
    services: Vec<String>,
}

fn parse_names_json(out: &str) -> Result<Vec<String>, serde_json::Error> {
    let records: Vec<DasRecord> = serde_json::from_str(out)?;
    Ok(records
        .iter()
        .filter_map(|r| r.dataset.first())
        .filter_map(|d| d.get("name").and_then(|n| n.as_str()))
        .map(str::to_string)
        .collect())
}

fn parse_summary(out: &str) -> Result<Option<DatasetSummary>, serde_json::Error> {
    let records: Vec<DasRecord> = serde_json::from_str(out)?;

    let mut file_summary = None;
    let mut dataset_info = None;
    for r in &records {
        match r.das.services.first().map(String::as_str) {
            Some(FILE_SUMMARY) => file_summary = r.dataset.first(),
            Some(DATASET_INFO) => dataset_info = r.dataset.first(),
            _ => {}
        }
    }

    let (Some(summary), Some(info)) = (file_summary, dataset_info) else {
        return Ok(None);
    };

    let status = info.get("status").and_then(|s| s.as_str()).unwrap_or("");
    let nfiles = summary.get("nfiles").and_then(|n| n.as_u64()).unwrap_or(0);
    if !matches!(status, "PRODUCTION" | "VALID") || nfiles == 0 {
        return Ok(None);
    }

    Ok(Some(DatasetSummary {
        name: info
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default()
            .to_string(),
        status: status.to_string(),
        nevents: summary.get("nevents").and_then(|n| n.as_u64()).unwrap_or(0),
        nfiles,
        last_modification_date: info
            .get("last_modification_date")
            .and_then(|n| n.as_i64())
            .unwrap_or(0),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_list_is_compact() {
        assert_eq!(run_list(&[1, 22, 333]), "[1,22,333]");
        assert_eq!(run_list(&[]), "[]");
    }

    #[test]
    fn runs_are_parsed_line_by_line() {
        let runs = parse_runs("q", "355100\n355101\n\n355100\n").unwrap();
        assert_eq!(runs.into_iter().collect::<Vec<_>>(), vec![355100, 355101]);
        assert!(parse_runs("q", "oops\n").is_err());
    }

    #[test]
    fn sum_takes_last_token() {
        assert_eq!(parse_sum("q", "sum(file.nevents): 1234.0\n").unwrap(), 1234);
        assert_eq!(parse_sum("q", "sum(file.nevents)=99").unwrap(), 99);
        assert!(parse_sum("q", "").is_err());
        assert!(parse_sum("q", "error: no such dataset").is_err());
    }

    #[test]
    fn lumi_rows_with_and_without_events() {
        let out = "/store/a.root 1 [1,2,3] [10,20,30]\n/store/b.root 2 [5] null\n";
        let rows = parse_lumi_rows("q", out).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].run, 1);
        assert_eq!(rows[0].lumis, vec![1, 2, 3]);
        assert_eq!(rows[0].events, vec![10, 20, 30]);
        assert_eq!(rows[1].events, vec![0]);
    }

    #[test]
    fn summary_requires_valid_status_and_files() {
        let out = r#"[
            {"das": {"services": ["dbs3:filesummaries"]}, "dataset": [{"nevents": 500, "nfiles": 3}]},
            {"das": {"services": ["dbs3:dataset_info"]}, "dataset": [{"name": "/A/Run2022C-PromptReco-v1/AOD", "status": "VALID", "last_modification_date": 1660000000}]}
        ]"#;
        let s = parse_summary(out).unwrap().unwrap();
        assert_eq!(s.name, "/A/Run2022C-PromptReco-v1/AOD");
        assert_eq!(s.nevents, 500);

        let invalid = out.replace("\"VALID\"", "\"INVALID\"");
        assert!(parse_summary(&invalid).unwrap().is_none());

        let empty = out.replace("\"nfiles\": 3", "\"nfiles\": 0");
        assert!(parse_summary(&empty).unwrap().is_none());
    }

    #[test]
    fn names_from_json_records() {
        let out = r#"[
            {"das": {"services": ["dbs3:datasets"]}, "dataset": [{"name": "/A/Run2022C-v1/RAW"}]},
            {"das": {"services": ["dbs3:datasets"]}, "dataset": [{"name": "/B/Run2022C-v1/RAW"}]}
        ]"#;
        assert_eq!(
            parse_names_json(out).unwrap(),
            vec!["/A/Run2022C-v1/RAW", "/B/Run2022C-v1/RAW"]
        );
    }
}
