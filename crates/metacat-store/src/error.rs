use metacat_common::SortParseError;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("catalog error: {0}")]
    Catalog(#[from] metacat_catalog::CatalogError),
    #[error("invalid sort parameter: {0}")]
    InvalidSort(#[from] SortParseError),
}

pub type StoreResult<T> = Result<T, StoreError>;
