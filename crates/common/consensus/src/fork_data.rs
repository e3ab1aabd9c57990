use alloy_primitives::{aliases::B32, B256};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct ForkData {
    pub current_version: B32,
    pub genesis_validators_root: B256,
}

impl ForkData {
    /// Domain for ``domain_type`` on this fork: the domain type followed by the first 28 bytes of
    /// the fork data root.
    pub fn compute_domain(&self, domain_type: B32) -> B256 {
        let fork_data_root = self.tree_hash_root();
        let mut domain = [0u8; 32];
        domain[..4].copy_from_slice(domain_type.as_slice());
        domain[4..].copy_from_slice(&fork_data_root[..28]);
        B256::from(domain)
    }
}
