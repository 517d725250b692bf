use crate::data::error::DataError;
use crate::instrument::error::CatalogError;
use thiserror::Error;

/// Top-level error aggregating the failures a replay can surface.
#[derive(Error, Debug)]
pub enum BackcastError {
    #[error("data: {0}")]
    Data(#[from] DataError),

    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),
}
