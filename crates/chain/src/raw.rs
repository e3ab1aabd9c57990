use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// Decoded `DepositEvent(bytes,bytes,bytes,bytes,bytes)` log of the deposit contract.
///
/// `amount` and `index` keep the contract's 8 byte little endian encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDepositLog {
    pub pubkey: Bytes,
    pub withdrawal_credentials: Bytes,
    pub amount: Bytes,
    pub signature: Bytes,
    pub index: Bytes,
    pub tx: B256,
    pub block_number: u64,
    pub block_hash: B256,
    pub log_index: u64,
}

/// Decoded `SigningKeyAdded(uint256,bytes)` log of a staking module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSigningKeyLog {
    pub operator_index: u64,
    pub pubkey: Bytes,
    pub module_address: Address,
    pub log_index: u64,
    pub block_number: u64,
    pub block_hash: B256,
}
