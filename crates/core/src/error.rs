use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("malformed table payload: {0}")]
    Parse(String),
    #[error("fetch failed for table {table}: {reason}")]
    Fetch { table: String, reason: String },
    #[error("empty query")]
    EmptyQuery,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("other: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

impl From<anyhow::Error> for ScanError {
    fn from(value: anyhow::Error) -> Self {
        Self::Other(value.to_string())
    }
}
