use std::sync::LazyLock;

use alloy_primitives::B256;

use crate::{
    constants::{DEPOSIT_CONTRACT_TREE_DEPTH, MAX_DEPOSIT_COUNT},
    deposit_data::DepositData,
    misc::{finalize_root, form_deposit_node, node_hash},
};

/// Roots of empty subtrees, ``ZERO_HASHES[h]`` being the root of an empty subtree of height `h`.
static ZERO_HASHES: LazyLock<[B256; DEPOSIT_CONTRACT_TREE_DEPTH]> = LazyLock::new(|| {
    let mut zero_hashes = [B256::ZERO; DEPOSIT_CONTRACT_TREE_DEPTH];
    for height in 0..DEPOSIT_CONTRACT_TREE_DEPTH - 1 {
        zero_hashes[height + 1] = node_hash(&zero_hashes[height], &zero_hashes[height]);
    }
    zero_hashes
});

/// Incremental merkle tree of the deposit contract.
///
/// Only the right-most filled subtree at every height is kept in `branch`, which together with
/// the node count is enough to recompute the contract's root. Cloning copies the branch, so a
/// clone can be extended without touching the tree it was taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositTree {
    branch: [B256; DEPOSIT_CONTRACT_TREE_DEPTH],
    node_count: u64,
}

impl Default for DepositTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DepositTree {
    pub fn new() -> Self {
        Self {
            branch: [B256::ZERO; DEPOSIT_CONTRACT_TREE_DEPTH],
            node_count: 0,
        }
    }

    pub fn zero_hashes() -> &'static [B256; DEPOSIT_CONTRACT_TREE_DEPTH] {
        &ZERO_HASHES
    }

    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    pub fn branch(&self) -> &[B256; DEPOSIT_CONTRACT_TREE_DEPTH] {
        &self.branch
    }

    /// Leaf hash of a deposit, as computed by the deposit contract.
    pub fn form_deposit_node(data: &DepositData) -> B256 {
        form_deposit_node(data)
    }

    /// Appends `leaf` as the deposit with index `expected_index`.
    ///
    /// Returns `false` and leaves the tree untouched when `expected_index` is not the next index,
    /// so a gap or a duplicate in a replayed event stream never reaches the branch.
    pub fn insert(&mut self, leaf: B256, expected_index: u64) -> bool {
        if expected_index != self.node_count || self.node_count >= MAX_DEPOSIT_COUNT {
            return false;
        }

        self.node_count += 1;

        let mut node = leaf;
        let mut size = self.node_count;
        for height in 0..DEPOSIT_CONTRACT_TREE_DEPTH {
            if size & 1 == 1 {
                self.branch[height] = node;
                return true;
            }
            node = node_hash(&self.branch[height], &node);
            size /= 2;
        }

        // size < 2^32 always has a set bit below the tree depth
        unreachable!("deposit tree is full")
    }

    pub fn get_root(&self) -> B256 {
        let mut node = B256::ZERO;
        let mut size = self.node_count;
        for (height, zero_hash) in ZERO_HASHES.iter().enumerate() {
            node = if size & 1 == 1 {
                node_hash(&self.branch[height], &node)
            } else {
                node_hash(&node, zero_hash)
            };
            size /= 2;
        }
        finalize_root(&node, self.node_count)
    }
}
