//! Whitelist accounting of reprocessed AOD datasets.
//!
//! Three selections are compared for each AOD: RAW runs certified by DCS
//! (`raw_x_dcs`), the workload whitelist restricted to RAW runs
//! (`whitelist_x_raw`), and the latter restricted to DCS runs
//! (`whitelist_x_raw_x_dcs`).

use catalog_client::types::ReqMgrWorkload;
use catalog_client::{DatasetCatalog, WorkflowSource};
use tracing::{debug, warn};

use crate::cache::CachedCatalog;
use crate::records::WhitelistAccounting;
use crate::runs::{LumiMask, RunSet};

/// 2016F runs reprocessed with the HIPM mitigation.
pub const HIPM_2016F_RUNS: [u32; 31] = [
    277932, 277934, 277981, 277991, 277992, 278017, 278018, 278167, 278175, 278193, 278239,
    278240, 278273, 278274, 278288, 278289, 278290, 278308, 278309, 278310, 278315, 278345,
    278346, 278349, 278366, 278406, 278509, 278761, 278770, 278806, 278807,
];

/// 2016F runs reprocessed without the HIPM mitigation.
pub const NON_HIPM_2016F_RUNS: [u32; 7] = [278769, 278801, 278802, 278803, 278804, 278805, 278808];

/// Runs that do not belong to an AOD of a 2016F RAW dataset, `None` elsewhere.
pub fn excluded_2016f_runs(raw: &str, processing_string: &str) -> Option<RunSet> {
    if !raw.contains("2016F") {
        return None;
    }
    let runs: &[u32] = if processing_string.contains("HIPM") {
        &NON_HIPM_2016F_RUNS
    } else {
        &HIPM_2016F_RUNS
    };
    Some(runs.iter().copied().collect())
}

/// Inputs shared by all AODs of one RAW dataset.
pub struct RawContext<'a> {
    pub raw: &'a str,
    pub raw_runs: &'a RunSet,
    pub dcs: &'a LumiMask,
}

/// Accounting of one AOD produced by `workflow` with `processing_string`.
pub async fn whitelist_accounting<C, W>(
    catalog: &CachedCatalog<C>,
    workflows: &W,
    ctx: &RawContext<'_>,
    workflow: &str,
    processing_string: &str,
) -> WhitelistAccounting
where
    C: DatasetCatalog,
    W: WorkflowSource,
{
    let workload = match workflows.workload(workflow).await {
        Ok(Some(w)) => w,
        Ok(None) => {
            warn!(workflow, "no workload document, using an empty whitelist");
            ReqMgrWorkload::default()
        }
        Err(e) => {
            warn!(workflow, error = %e, "workload lookup failed, using an empty whitelist");
            ReqMgrWorkload::default()
        }
    };

    let excluded = excluded_2016f_runs(ctx.raw, processing_string);
    match workload_lumi_mask(&workload) {
        Some(lumis) => {
            debug!(workflow, runs = lumis.len(), "lumi whitelist");
            lumi_accounting(catalog, ctx, &lumis, excluded.as_ref()).await
        }
        None => {
            let whitelist: RunSet = workload
                .run_whitelist
                .as_deref()
                .unwrap_or_default()
                .iter()
                .copied()
                .collect();
            debug!(workflow, runs = whitelist.len(), "run whitelist");
            run_accounting(catalog, ctx, &whitelist, excluded.as_ref()).await
        }
    }
}

/// Lumi whitelist of a workload with run keys parsed; unparsable runs are dropped.
fn workload_lumi_mask(workload: &ReqMgrWorkload) -> Option<LumiMask> {
    let list = workload.lumi_whitelist()?;
    Some(
        list.iter()
            .filter_map(|(run, ranges)| match run.parse::<u32>() {
                Ok(run) => Some((run, ranges.clone())),
                Err(_) => {
                    warn!(run = %run, "ignoring non-numeric run in lumi list");
                    None
                }
            })
            .collect(),
    )
}

/// The three lumi selections, before event lookups.
fn lumi_selections(
    ctx: &RawContext<'_>,
    lumis: &LumiMask,
    excluded: Option<&RunSet>,
) -> (LumiMask, LumiMask, LumiMask) {
    let mut raw_x_dcs = ctx.dcs.restrict_to(ctx.raw_runs);
    let mut whitelist_x_raw = lumis.restrict_to(ctx.raw_runs);
    if let Some(excluded) = excluded {
        raw_x_dcs = raw_x_dcs.without_runs(excluded);
        whitelist_x_raw = whitelist_x_raw.without_runs(excluded);
    }
    let whitelist_x_raw_x_dcs = whitelist_x_raw.restrict_to_mask(ctx.dcs);
    (raw_x_dcs, whitelist_x_raw, whitelist_x_raw_x_dcs)
}

/// The three run selections, before event lookups.
fn run_selections(
    ctx: &RawContext<'_>,
    whitelist: &RunSet,
    excluded: Option<&RunSet>,
) -> (RunSet, RunSet, RunSet) {
    let dcs_runs = ctx.dcs.runs();
    let mut raw_x_dcs: RunSet = dcs_runs.intersection(ctx.raw_runs).copied().collect();
    let mut whitelist_x_raw: RunSet = ctx.raw_runs.intersection(whitelist).copied().collect();
    if let Some(excluded) = excluded {
        raw_x_dcs = &raw_x_dcs - excluded;
        whitelist_x_raw = &whitelist_x_raw - excluded;
    }
    let whitelist_x_raw_x_dcs = whitelist_x_raw.intersection(&dcs_runs).copied().collect();
    (raw_x_dcs, whitelist_x_raw, whitelist_x_raw_x_dcs)
}

async fn lumi_accounting<C: DatasetCatalog>(
    catalog: &CachedCatalog<C>,
    ctx: &RawContext<'_>,
    lumis: &LumiMask,
    excluded: Option<&RunSet>,
) -> WhitelistAccounting {
    let (raw_x_dcs, whitelist_x_raw, whitelist_x_raw_x_dcs) =
        lumi_selections(ctx, lumis, excluded);

    WhitelistAccounting {
        whitelist_type: "lumis".to_string(),
        raw_x_dcs_events: catalog.events_of_lumis(ctx.raw, &raw_x_dcs).await,
        whitelist_x_raw_events: catalog.events_of_lumis(ctx.raw, &whitelist_x_raw).await,
        whitelist_x_raw_x_dcs_events: catalog
            .events_of_lumis(ctx.raw, &whitelist_x_raw_x_dcs)
            .await,
        raw_x_dcs_runs: raw_x_dcs.runs().into_iter().collect(),
        whitelist_x_raw_runs: whitelist_x_raw.runs().into_iter().collect(),
        whitelist_x_raw_x_dcs_runs: whitelist_x_raw_x_dcs.runs().into_iter().collect(),
    }
}

async fn run_accounting<C: DatasetCatalog>(
    catalog: &CachedCatalog<C>,
    ctx: &RawContext<'_>,
    whitelist: &RunSet,
    excluded: Option<&RunSet>,
) -> WhitelistAccounting {
    let (raw_x_dcs, whitelist_x_raw, whitelist_x_raw_x_dcs) =
        run_selections(ctx, whitelist, excluded);

    WhitelistAccounting {
        whitelist_type: "runs".to_string(),
        raw_x_dcs_events: catalog.events_of_runs(ctx.raw, &raw_x_dcs).await,
        whitelist_x_raw_events: catalog.events_of_runs(ctx.raw, &whitelist_x_raw).await,
        whitelist_x_raw_x_dcs_events: catalog
            .events_of_runs(ctx.raw, &whitelist_x_raw_x_dcs)
            .await,
        raw_x_dcs_runs: raw_x_dcs.into_iter().collect(),
        whitelist_x_raw_runs: whitelist_x_raw.into_iter().collect(),
        whitelist_x_raw_x_dcs_runs: whitelist_x_raw_x_dcs.into_iter().collect(),
    }
}
