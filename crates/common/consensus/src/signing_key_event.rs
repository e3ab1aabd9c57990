use alloy_primitives::{Address, FixedBytes, B256};
use serde::{Deserialize, Serialize};

use crate::event_group::EventGroup;

/// A `SigningKeyAdded` log of a staking module.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct SigningKeyEvent {
    /// Position of the event in the cached log, assigned when the event is cached.
    pub index: u64,
    pub operator_index: u64,
    pub key: FixedBytes<48>,
    pub module_address: Address,
    pub log_index: u64,
    pub block_number: u64,
    pub block_hash: B256,
}

pub type SigningKeyEventGroup = EventGroup<SigningKeyEvent>;
