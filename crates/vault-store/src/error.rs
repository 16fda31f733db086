use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing database could not be opened at all.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A transaction failed after a successful open.
    #[error("Storage failure: {0}")]
    Failure(#[from] sqlx::Error),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Config entry {key} is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
