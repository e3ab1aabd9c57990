use thiserror::Error;

/// Failure of a single log range query.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider refused the range as too large. Smaller ranges may succeed.
    #[error("Provider capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
