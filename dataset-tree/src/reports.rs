//! Report drivers: input selection and the bounded worker pool over RAW datasets.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use catalog_client::{DasClient, DatasetCatalog, WorkflowSource};
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::blacklist::Blacklist;
use crate::cache::CachedCatalog;
use crate::catalog_walk::CatalogWalker;
use crate::config::YearsConfig;
use crate::errors::{TreeError, TreeResult};
use crate::records::RawRecord;
use crate::workflow_walk::WorkflowWalker;

/// Datasets picked at random in debug mode.
pub const DEBUG_SAMPLE: usize = 10;

#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Maximum number of RAW datasets processed at once.
    pub concurrency: usize,
    /// Process a random sample of [`DEBUG_SAMPLE`] datasets.
    pub debug: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            debug: false,
        }
    }
}

/// Unique, sorted, non-empty lines of a dataset list file.
pub fn load_dataset_list(path: &Path) -> TreeResult<Vec<String>> {
    let raw = fs::read_to_string(path).map_err(|e| TreeError::io(path, e))?;
    let unique: BTreeSet<String> = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    info!(datasets = unique.len(), "read {}", path.display());
    Ok(unique.into_iter().collect())
}

/// Deduplicates and sorts inputs; in debug mode keeps a random sample first.
pub fn prepare_inputs(datasets: Vec<String>, debug: bool) -> Vec<String> {
    let mut datasets: Vec<String> = datasets
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if debug {
        datasets.shuffle(&mut rand::thread_rng());
        datasets.truncate(DEBUG_SAMPLE);
        info!(datasets = datasets.len(), "picking random datasets because of debug");
    }
    datasets.sort();
    datasets
}

/// All RAW dataset names of the requested years.
pub async fn discover_raw_datasets(das: &DasClient, years: &[String]) -> TreeResult<Vec<String>> {
    if years.is_empty() {
        return Err(TreeError::Config("no year requested for RAW discovery".into()));
    }
    let mut names = Vec::new();
    for year in years {
        let found = das
            .dataset_names_json(&format!("/*/Run{year}*/RAW"))
            .await?;
        info!(year = %year, datasets = found.len(), "discovered RAW datasets");
        names.extend(found);
    }
    Ok(names)
}

/// UL reprocessing report: workflow-driven tree per RAW dataset.
pub async fn run_ul_report<C, W>(
    catalog: &CachedCatalog<C>,
    workflows: &W,
    years: &YearsConfig,
    datasets: Vec<String>,
    opts: &ReportOptions,
) -> TreeResult<Vec<RawRecord>>
where
    C: DatasetCatalog,
    W: WorkflowSource,
{
    let dataset_blacklist = Blacklist::datasets()?;
    let campaign_blacklist = Blacklist::campaigns()?;
    let walker = WorkflowWalker::new(catalog, workflows, &dataset_blacklist, &campaign_blacklist);

    let datasets = prepare_inputs(datasets, opts.debug);
    let total = datasets.len();
    info!(total, concurrency = opts.concurrency, "starting UL report");

    let records: Vec<Option<RawRecord>> = stream::iter(datasets.iter().enumerate())
        .map(|(index, raw)| {
            let walker = &walker;
            async move {
                info!("{}/{}. dataset is {}", index + 1, total, raw);
                let Some(year) = years.year_for(raw) else {
                    warn!(raw = %raw, "could not find year info");
                    return None;
                };
                Some(walker.build_raw_record(raw, year).await)
            }
        })
        .buffered(opts.concurrency.max(1))
        .collect()
        .await;

    Ok(records.into_iter().flatten().collect())
}

/// Run 3 report output: every RAW record, and those listed in the datasets file.
#[derive(Debug, Clone, Default)]
pub struct Run3Report {
    pub all: Vec<RawRecord>,
    pub subset: Vec<RawRecord>,
}

/// Run 3 data report: catalog-driven tree per RAW dataset.
pub async fn run_run3_report<C: DatasetCatalog>(
    catalog: &CachedCatalog<C>,
    years: &YearsConfig,
    datasets: Vec<String>,
    subset: &BTreeSet<String>,
    opts: &ReportOptions,
) -> Run3Report {
    let walker = CatalogWalker::new(catalog);

    let datasets = prepare_inputs(datasets, opts.debug);
    let total = datasets.len();
    info!(total, concurrency = opts.concurrency, "starting Run 3 report");

    let records: Vec<Option<RawRecord>> = stream::iter(datasets.iter().enumerate())
        .map(|(index, raw)| {
            let walker = &walker;
            async move {
                info!("{}/{}. dataset is {}", index + 1, total, raw);
                let Some(year) = years.year_for(raw) else {
                    warn!(raw = %raw, "could not find year info");
                    return None;
                };
                Some(walker.raw_record(raw, year).await)
            }
        })
        .buffered(opts.concurrency.max(1))
        .collect()
        .await;

    let all: Vec<RawRecord> = records.into_iter().flatten().collect();
    let subset = all
        .iter()
        .filter(|r| subset.contains(&r.dataset))
        .cloned()
        .collect();
    Run3Report { all, subset }
}
