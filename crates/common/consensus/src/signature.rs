use alloy_primitives::FixedBytes;
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{typenum, FixedVector};
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BlsSignature {
    pub signature: FixedVector<u8, typenum::U96>,
}

impl BlsSignature {
    pub fn from_slice(bytes: &[u8]) -> anyhow::Result<Self> {
        let signature = FixedVector::new(bytes.to_vec())
            .map_err(|err| anyhow!("Signature must be 96 bytes long, got {err:?}"))?;
        Ok(Self { signature })
    }
}

impl From<FixedBytes<96>> for BlsSignature {
    fn from(bytes: FixedBytes<96>) -> Self {
        Self {
            signature: FixedVector::from(bytes.to_vec()),
        }
    }
}
