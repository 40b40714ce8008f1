//! Hierarchy walk driven by catalog name patterns (Run 3 data report).
//!
//! Children are found by injecting the configured processing strings into
//! the RAW name and keeping the candidates whose version matches the parent.

use futures::future::{BoxFuture, FutureExt};
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use catalog_client::DatasetCatalog;

use crate::cache::CachedCatalog;
use crate::config::Year;
use crate::name::{DatasetName, dataset_version};
use crate::records::{ChildRecord, RawRecord};
use crate::workflow_walk::PROCESSED_TIERS;

pub struct CatalogWalker<'a, C> {
    catalog: &'a CachedCatalog<C>,
}

/// `/<primary>/<era>` of a RAW name, the era without its version suffix.
fn name_prefix(raw: &str) -> Option<(&str, &str)> {
    let mut tokens = raw.split('/').filter(|t| !t.is_empty());
    let primary = tokens.next()?;
    let era = tokens.next()?.split('-').next()?;
    Some((primary, era))
}

impl<'a, C: DatasetCatalog> CatalogWalker<'a, C> {
    pub fn new(catalog: &'a CachedCatalog<C>) -> Self {
        Self { catalog }
    }

    /// Catalog names of `tier` for `raw` with processing string `ps`.
    async fn candidates(&self, raw: &str, ps: &str, tier: &str) -> Vec<String> {
        let Some((primary, era)) = name_prefix(raw) else {
            warn!(raw, "cannot split dataset name");
            return Vec::new();
        };

        let pattern = format!("/{primary}/{era}-{ps}*/{tier}");
        let names = self.catalog.names(&pattern).await;

        // drop custom tags sharing the processing string prefix
        let filter = format!(
            "/{}/{}-{}(_v[0-9]-v[0-9]|-v[0-9])",
            regex::escape(primary),
            regex::escape(era),
            regex::escape(ps)
        );
        let filter = match Regex::new(&filter) {
            Ok(re) => re,
            Err(e) => {
                warn!(pattern = %filter, error = %e, "bad candidate filter");
                return Vec::new();
            }
        };
        names.into_iter().filter(|n| filter.is_match(n)).collect()
    }

    /// Records of the head of `tiers` below `raw`, recursing into the rest.
    pub fn dataset_steps<'b>(
        &'b self,
        raw: &'b str,
        tiers: &'b [&'b str],
        year: &'b Year,
        parent: Option<&'b str>,
    ) -> BoxFuture<'b, Vec<ChildRecord>> {
        async move {
            let Some((tier, rest)) = tiers.split_first() else {
                debug!(raw, "no tiers left");
                return Vec::new();
            };
            let Some(campaigns) = year.tier_campaigns(tier) else {
                return Vec::new();
            };
            let parent_version = parent.map(dataset_version);

            let mut results = Vec::new();
            for (campaign, processing_strings) in campaigns {
                let Some(ps) = processing_strings.last() else {
                    continue;
                };

                let mut candidates = self.candidates(raw, ps, tier).await;
                if let Some(version) = parent_version {
                    candidates.retain(|c| dataset_version(c) == version);
                }

                for candidate in &candidates {
                    debug!(dataset = %candidate, "querying candidate");
                    let Some(summary) = self.catalog.summary(candidate).await else {
                        info!(dataset = %candidate, "dataset not valid");
                        break;
                    };

                    let runs = self.catalog.runs(candidate).await;
                    let output = self
                        .dataset_steps(raw, rest, year, Some(candidate.as_str()))
                        .await;
                    let campaign = year
                        .era_campaign(&DatasetName::parse(candidate))
                        .unwrap_or(campaign.as_str())
                        .to_string();
                    let dataset = if summary.name.is_empty() {
                        candidate.clone()
                    } else {
                        summary.name
                    };

                    results.push(ChildRecord {
                        dataset,
                        events: summary.nevents,
                        runs: runs.into_iter().collect(),
                        kind: summary.status,
                        campaign,
                        processing_string: ps.clone(),
                        prepid: None,
                        workflow: None,
                        output,
                        accounting: None,
                    });
                }
            }
            results
        }
        .boxed()
    }

    /// RAW record with its AOD/MINIAOD/NANOAOD descendants.
    #[instrument(skip_all, fields(raw = %raw, year = %year.year))]
    pub async fn raw_record(&self, raw: &str, year: &Year) -> RawRecord {
        let events = self.catalog.events(raw).await;
        let runs = self.catalog.runs(raw).await;
        let output = self.dataset_steps(raw, &PROCESSED_TIERS, year, None).await;
        info!(children = output.len(), "resolved datasets");

        RawRecord {
            dataset: raw.to_string(),
            events,
            year: year.year.clone(),
            runs: runs.into_iter().collect(),
            twiki_runs: year.twiki.runs_for(raw).into_iter().collect(),
            output,
        }
    }
}
