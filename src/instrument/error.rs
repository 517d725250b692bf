use thiserror::Error;

/// All errors generated while loading an instrument catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate instrument symbol {0}")]
    DuplicateInstrument(String),

    #[error("duplicate variation for provider {provider}, symbol {symbol}")]
    DuplicateVariation { provider: String, symbol: String },

    #[error("instrument {symbol} requires tick > 0 and bpv > 0")]
    InvalidInstrument { symbol: String },
}
