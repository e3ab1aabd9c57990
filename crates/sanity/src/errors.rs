use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The event log and the deposit tree diverged.
    #[error("Deposit {index} cannot be replayed onto a deposit tree of {node_count} nodes")]
    ReplayFailed { index: u64, node_count: u64 },

    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}
