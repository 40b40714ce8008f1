//! Service lookups of the stuck-transfer report.

use std::future::Future;

use catalog_client::errors::CatalogResult;
use catalog_client::types::{Stats2Workflow, TransferorInfo};
use catalog_client::{CmswebClient, RucioClient, Stats2Client};

pub trait TransferSource: Send + Sync {
    /// One page of workflows currently in `staging`.
    fn staging_page(
        &self,
        limit: usize,
        skip: usize,
    ) -> impl Future<Output = CatalogResult<Vec<Stats2Workflow>>> + Send;

    fn transferor_info(
        &self,
        workflow: &str,
    ) -> impl Future<Output = CatalogResult<Option<TransferorInfo>>> + Send;

    /// State of a replication rule, `None` when rules cannot be looked up.
    fn rule_state(&self, rule_id: &str)
    -> impl Future<Output = CatalogResult<Option<String>>> + Send;
}

/// Stats2 paging, cmsweb transferor documents and optional Rucio rules.
#[derive(Debug, Clone)]
pub struct TransferServices {
    stats2: Stats2Client,
    cmsweb: CmswebClient,
    rucio: Option<RucioClient>,
}

impl TransferServices {
    pub fn new(stats2: Stats2Client, cmsweb: CmswebClient, rucio: Option<RucioClient>) -> Self {
        Self {
            stats2,
            cmsweb,
            rucio,
        }
    }
}

impl TransferSource for TransferServices {
    async fn staging_page(&self, limit: usize, skip: usize) -> CatalogResult<Vec<Stats2Workflow>> {
        self.stats2.workflows_in_status("staging", limit, skip).await
    }

    async fn transferor_info(&self, workflow: &str) -> CatalogResult<Option<TransferorInfo>> {
        self.cmsweb.transferor_info(workflow).await
    }

    async fn rule_state(&self, rule_id: &str) -> CatalogResult<Option<String>> {
        match &self.rucio {
            Some(rucio) => rucio.rule_state(rule_id).await.map(Some),
            None => Ok(None),
        }
    }
}
