use catalog_client::CatalogError;
use report_tables::TableError;
use thiserror::Error;

pub type TransferResult<T> = Result<T, TransferError>;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Output(#[from] TableError),
}
