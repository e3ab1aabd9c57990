use std::fmt::Debug;

use alloy_primitives::B256;
use guardian_consensus::{deposit_event::DepositEvent, signing_key_event::SigningKeyEvent};
use serde::{de::DeserializeOwned, Serialize};

/// An event kept in an [`EventStore`](crate::tables::event_store::EventStore), keyed by `index`.
pub trait CachedEvent:
    Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static
{
    fn index(&self) -> u64;

    fn block_number(&self) -> u64;

    fn block_hash(&self) -> B256;
}

impl CachedEvent for DepositEvent {
    fn index(&self) -> u64 {
        self.deposit_count
    }

    fn block_number(&self) -> u64 {
        self.block_number
    }

    fn block_hash(&self) -> B256 {
        self.block_hash
    }
}

impl CachedEvent for SigningKeyEvent {
    fn index(&self) -> u64 {
        self.index
    }

    fn block_number(&self) -> u64 {
        self.block_number
    }

    fn block_hash(&self) -> B256 {
        self.block_hash
    }
}
