use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

use crate::{deposit_data::DepositData, pubkey::PubKey};

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct DepositMessage {
    pub pubkey: PubKey,
    pub withdrawal_credentials: B256,
    pub amount: u64,
}

impl From<&DepositData> for DepositMessage {
    fn from(data: &DepositData) -> Self {
        Self {
            pubkey: data.pubkey.clone(),
            withdrawal_credentials: data.withdrawal_credentials,
            amount: data.amount,
        }
    }
}
