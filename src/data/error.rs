use thiserror::Error;

/// All errors generated in the backcast::data module.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("failed to open bar file {path}: {source}")]
    File {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to read bar file {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{path} line {line} has {found} columns, previous lines had {expected}")]
    ColumnCount {
        path: String,
        line: u64,
        found: usize,
        expected: usize,
    },

    #[error("{path} line {line}: cannot parse timestamp {value:?}")]
    Timestamp {
        path: String,
        line: u64,
        value: String,
    },

    #[error("{path} line {line}: cannot parse numeric field {value:?}")]
    Numeric {
        path: String,
        line: u64,
        value: String,
    },

    #[error("{path} line {line}: bar violates low <= open/close <= high")]
    MalformedBar { path: String, line: u64 },
}
