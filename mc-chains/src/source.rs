//! Request lookups used by the chain report.

use std::future::Future;

use catalog_client::McmClient;
use catalog_client::errors::CatalogResult;
use catalog_client::types::{McmChainedRequest, McmRequest};

pub const REQUESTS_DB: &str = "requests";
pub const CHAINED_REQUESTS_DB: &str = "chained_requests";

/// Search query of the UL GEN requests producing `dataset`.
pub fn gen_request_query(dataset: &str) -> String {
    format!(
        "prepid=*20UL*GEN*&dataset_name={}",
        urlencoding::encode(dataset)
    )
}

pub trait RequestSource: Send + Sync {
    /// GEN requests of the UL campaigns producing `dataset`.
    fn gen_requests(
        &self,
        dataset: &str,
    ) -> impl Future<Output = CatalogResult<Vec<McmRequest>>> + Send;

    fn request(&self, prepid: &str) -> impl Future<Output = CatalogResult<Option<McmRequest>>> + Send;

    fn chained_request(
        &self,
        prepid: &str,
    ) -> impl Future<Output = CatalogResult<Option<McmChainedRequest>>> + Send;
}

impl RequestSource for McmClient {
    async fn gen_requests(&self, dataset: &str) -> CatalogResult<Vec<McmRequest>> {
        self.search(REQUESTS_DB, &gen_request_query(dataset)).await
    }

    async fn request(&self, prepid: &str) -> CatalogResult<Option<McmRequest>> {
        self.get(REQUESTS_DB, prepid).await
    }

    async fn chained_request(&self, prepid: &str) -> CatalogResult<Option<McmChainedRequest>> {
        self.get(CHAINED_REQUESTS_DB, prepid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_name_is_encoded_and_wildcards_kept() {
        assert_eq!(
            gen_request_query("/DYJetsToLL_M-50_TuneCP5_13TeV/RunIISummer20UL18GEN-v1/GEN"),
            "prepid=*20UL*GEN*&dataset_name=%2FDYJetsToLL_M-50_TuneCP5_13TeV%2FRunIISummer20UL18GEN-v1%2FGEN"
        );
    }
}
