use alloy_primitives::{FixedBytes, B256};
use serde::{Deserialize, Serialize};

use crate::{
    deposit_data::DepositData, event_group::EventGroup, pubkey::PubKey, signature::BlsSignature,
};

/// A `DepositEvent` log of the deposit contract, reduced to what the guardian caches.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub pubkey: FixedBytes<48>,
    pub withdrawal_credentials: B256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub amount: u64,
    pub signature: FixedBytes<96>,
    pub tx: B256,
    pub block_number: u64,
    pub block_hash: B256,
    pub log_index: u64,
    /// Zero based position of the deposit in the contract tree.
    pub deposit_count: u64,
    pub deposit_data_root: B256,
    /// Whether the deposit signature verifies.
    pub valid: bool,
}

impl DepositEvent {
    pub fn deposit_data(&self) -> DepositData {
        DepositData {
            pubkey: PubKey::from(self.pubkey),
            withdrawal_credentials: self.withdrawal_credentials,
            amount: self.amount,
            signature: BlsSignature::from(self.signature),
        }
    }
}

pub type DepositEventGroup = EventGroup<DepositEvent>;
