use catalog_client::CatalogError;
use dataset_tree::TreeError;
use report_tables::TableError;
use thiserror::Error;

pub type ChainResult<T> = Result<T, ChainError>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Input(#[from] TreeError),

    #[error(transparent)]
    Output(#[from] TableError),
}
