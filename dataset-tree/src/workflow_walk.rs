//! Hierarchy walk over request-tracking workflows (UL reprocessing report).
//!
//! Children of a dataset are the outputs of the next tier produced by the
//! same workflow, followed by the outputs of workflows that read the dataset.

use catalog_client::types::Stats2Workflow;
use catalog_client::{DatasetCatalog, WorkflowSource};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info, instrument, warn};

use crate::accounting::{RawContext, whitelist_accounting};
use crate::blacklist::Blacklist;
use crate::cache::CachedCatalog;
use crate::config::Year;
use crate::name::tier_of;
use crate::records::{ChildRecord, RawRecord};

/// Tiers below RAW, in walk order.
pub const PROCESSED_TIERS: [&str; 3] = ["AOD", "MINIAOD", "NANOAOD"];

const USABLE_TYPES: [&str; 2] = ["PRODUCTION", "VALID"];

pub struct WorkflowWalker<'a, C, W> {
    catalog: &'a CachedCatalog<C>,
    workflows: &'a W,
    dataset_blacklist: &'a Blacklist,
    campaign_blacklist: &'a Blacklist,
}

impl<'a, C, W> WorkflowWalker<'a, C, W>
where
    C: DatasetCatalog,
    W: WorkflowSource,
{
    pub fn new(
        catalog: &'a CachedCatalog<C>,
        workflows: &'a W,
        dataset_blacklist: &'a Blacklist,
        campaign_blacklist: &'a Blacklist,
    ) -> Self {
        Self {
            catalog,
            workflows,
            dataset_blacklist,
            campaign_blacklist,
        }
    }

    /// Workflows reading `dataset`; lookup failures yield none.
    async fn consumers(&self, dataset: &str) -> Vec<Stats2Workflow> {
        match self.workflows.workflows_for_input(dataset).await {
            Ok(wfs) => wfs,
            Err(e) => {
                warn!(dataset, error = %e, "cannot get workflows for input");
                Vec::new()
            }
        }
    }

    /// Output records of `workflows` for the head of `tiers`, recursing into the rest.
    pub fn collect_outputs<'b>(
        &'b self,
        workflows: &'b [Stats2Workflow],
        tiers: &'b [&'b str],
        year: &'b Year,
    ) -> BoxFuture<'b, Vec<ChildRecord>> {
        async move {
            let Some((tier, rest)) = tiers.split_first() else {
                return Vec::new();
            };

            let mut results: Vec<ChildRecord> = Vec::new();
            for workflow in workflows {
                let Some(latest) = workflow.latest_outputs() else {
                    continue;
                };

                for (dataset, info) in &latest.datasets {
                    if !USABLE_TYPES.contains(&info.kind.as_str()) || tier_of(dataset) != *tier {
                        continue;
                    }
                    debug!(
                        dataset = %dataset,
                        kind = %info.kind,
                        prepid = %workflow.prepid,
                        "looking at output"
                    );
                    if results.iter().any(|r| &r.dataset == dataset) {
                        continue;
                    }
                    if self.dataset_blacklist.matches(dataset) {
                        info!(dataset = %dataset, "skipping blacklisted dataset");
                        continue;
                    }

                    let campaign = year.campaign_for(tier, &workflow.processing_string);
                    if self.campaign_blacklist.matches(&campaign) {
                        info!(dataset = %dataset, campaign = %campaign, "skipping blacklisted campaign");
                        continue;
                    }

                    let runs = self.catalog.runs(dataset).await;
                    let events = self.catalog.events(dataset).await;

                    let mut output = self
                        .collect_outputs(std::slice::from_ref(workflow), rest, year)
                        .await;
                    if !rest.is_empty() {
                        let consumers = self.consumers(dataset).await;
                        output.extend(self.collect_outputs(&consumers, rest, year).await);
                    }

                    results.push(ChildRecord {
                        dataset: dataset.clone(),
                        events,
                        runs: runs.into_iter().collect(),
                        kind: info.kind.clone(),
                        campaign,
                        processing_string: workflow.processing_string.clone(),
                        prepid: Some(workflow.prepid.clone()),
                        workflow: Some(workflow.request_name.clone()),
                        output,
                        accounting: None,
                    });
                }
            }
            results
        }
        .boxed()
    }

    /// Full tree of one RAW dataset with whitelist accounting on every AOD.
    #[instrument(skip_all, fields(raw = %raw, year = %year.year))]
    pub async fn build_raw_record(&self, raw: &str, year: &Year) -> RawRecord {
        let twiki_runs = year.twiki.runs_for(raw);
        info!(twiki_runs = twiki_runs.len(), "twiki runs");

        let aod_tags = year.aod_tags();
        let raw_workflows: Vec<Stats2Workflow> = self
            .consumers(raw)
            .await
            .into_iter()
            .filter(|w| aod_tags.iter().any(|t| w.processing_string.contains(t.as_str())))
            .collect();

        let events = self.catalog.events(raw).await;
        let raw_runs = self.catalog.runs(raw).await;

        let mut output = self
            .collect_outputs(&raw_workflows, &PROCESSED_TIERS, year)
            .await;

        let ctx = RawContext {
            raw,
            raw_runs: &raw_runs,
            dcs: &year.dcs,
        };
        for aod in output.iter_mut() {
            let Some(workflow) = aod.workflow.clone() else {
                continue;
            };
            let accounting = whitelist_accounting(
                self.catalog,
                self.workflows,
                &ctx,
                &workflow,
                &aod.processing_string,
            )
            .await;
            aod.accounting = Some(accounting);
        }

        RawRecord {
            dataset: raw.to_string(),
            events,
            year: year.year.clone(),
            runs: raw_runs.into_iter().collect(),
            twiki_runs: twiki_runs.into_iter().collect(),
            output,
        }
    }
}
