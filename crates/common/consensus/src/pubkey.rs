use alloy_primitives::FixedBytes;
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{typenum, FixedVector};
use tree_hash_derive::TreeHash;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct PubKey {
    pub inner: FixedVector<u8, typenum::U48>,
}

impl PubKey {
    pub fn from_slice(bytes: &[u8]) -> anyhow::Result<Self> {
        let inner = FixedVector::new(bytes.to_vec())
            .map_err(|err| anyhow!("Public key must be 48 bytes long, got {err:?}"))?;
        Ok(Self { inner })
    }
}

impl From<FixedBytes<48>> for PubKey {
    fn from(bytes: FixedBytes<48>) -> Self {
        Self {
            inner: FixedVector::from(bytes.to_vec()),
        }
    }
}
