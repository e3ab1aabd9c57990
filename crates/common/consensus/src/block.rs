use std::fmt;

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// Block a chain read is pinned to.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockTag {
    Latest,
    Finalized,
    Number(u64),
    Hash(B256),
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Latest => write!(f, "latest"),
            BlockTag::Finalized => write!(f, "finalized"),
            BlockTag::Number(number) => write!(f, "{number}"),
            BlockTag::Hash(hash) => write!(f, "{hash}"),
        }
    }
}

impl From<u64> for BlockTag {
    fn from(number: u64) -> Self {
        BlockTag::Number(number)
    }
}

impl From<B256> for BlockTag {
    fn from(hash: B256) -> Self {
        BlockTag::Hash(hash)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
}
