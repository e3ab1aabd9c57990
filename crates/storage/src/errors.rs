use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid headers: {0}")]
    InvalidHeader(String),

    #[error("Event index is out of the valid range (0 to {max}) received {index}")]
    IndexOutOfRange { index: u64, max: u64 },

    #[error(
        "Event {index} at block {block_number} is outside of the cached range {start_block}..={end_block}"
    )]
    EventOutOfRange {
        index: u64,
        block_number: u64,
        start_block: u64,
        end_block: u64,
    },

    #[error("Failed to encode or decode a stored value: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}
