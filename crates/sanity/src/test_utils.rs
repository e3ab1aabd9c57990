use std::collections::HashMap;

use alloy_primitives::{FixedBytes, B256};
use anyhow::anyhow;
use guardian_chain::provider::DepositRootReader;
use guardian_consensus::{block::BlockTag, deposit_event::DepositEvent, deposit_tree::DepositTree};

pub fn leaf(index: u64) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&index.to_le_bytes());
    bytes[31] = 0x5a;
    B256::from(bytes)
}

/// Deposit with a synthetic leaf, mined in `block_number` under a hash derived from the number.
pub fn deposit_event(index: u64, block_number: u64) -> DepositEvent {
    DepositEvent {
        pubkey: FixedBytes::ZERO,
        withdrawal_credentials: B256::ZERO,
        amount: 32_000_000_000,
        signature: FixedBytes::ZERO,
        tx: B256::ZERO,
        block_number,
        block_hash: B256::with_last_byte(block_number as u8),
        log_index: 0,
        deposit_count: index,
        deposit_data_root: leaf(index),
        valid: true,
    }
}

pub fn root_of(count: u64) -> B256 {
    let mut tree = DepositTree::new();
    for index in 0..count {
        assert!(tree.insert(leaf(index), index));
    }
    tree.get_root()
}

#[derive(Debug, Default)]
pub struct StaticRoots(pub HashMap<BlockTag, B256>);

impl StaticRoots {
    pub fn with(mut self, tag: BlockTag, root: B256) -> Self {
        self.0.insert(tag, root);
        self
    }
}

impl DepositRootReader for StaticRoots {
    async fn deposit_root(&self, tag: BlockTag) -> anyhow::Result<B256> {
        self.0
            .get(&tag)
            .copied()
            .ok_or_else(|| anyhow!("header not found for {tag}"))
    }
}
