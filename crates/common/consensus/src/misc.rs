//! Hash primitives shared by the deposit contract and the consensus layer.
//!
//! Every function here must produce byte-identical output to the on-chain deposit contract, so
//! none of them may substitute another digest or layout.

use alloy_primitives::{aliases::B32, B256};
use ethereum_hashing::{hash32_concat, hash_fixed};
use tree_hash::TreeHash;

use crate::{deposit_data::DepositData, fork_data::ForkData, signing_data::SigningData};

/// SHA-256 over ``left || right``.
pub fn node_hash(left: &B256, right: &B256) -> B256 {
    B256::from(hash32_concat(left.as_slice(), right.as_slice()))
}

/// SSZ hash tree root of the deposit data, i.e. the leaf the deposit contract inserts.
pub fn form_deposit_node(data: &DepositData) -> B256 {
    data.tree_hash_root()
}

/// Mixes the deposit count into the accumulated node, reproducing the contract's
/// ``sha256(node || to_little_endian_64(deposit_count) || bytes24(0))``.
pub fn finalize_root(node: &B256, node_count: u64) -> B256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(node.as_slice());
    preimage[32..40].copy_from_slice(&node_count.to_le_bytes());
    B256::from(hash_fixed(&preimage))
}

/// Decodes the deposit contract's ``to_little_endian_64`` encoding.
pub fn parse_little_endian_64(bytes: &[u8]) -> anyhow::Result<u64> {
    let bytes: [u8; 8] = bytes.try_into().map_err(|_| {
        anyhow::anyhow!(
            "Little endian uint64 must be 8 bytes long, got {}",
            bytes.len()
        )
    })?;
    Ok(u64::from_le_bytes(bytes))
}

pub fn compute_domain(
    domain_type: B32,
    fork_version: B32,
    genesis_validators_root: B256,
) -> B256 {
    ForkData {
        current_version: fork_version,
        genesis_validators_root,
    }
    .compute_domain(domain_type)
}

pub fn compute_signing_root<SSZObject: TreeHash>(ssz_object: SSZObject, domain: B256) -> B256 {
    SigningData {
        object_root: ssz_object.tree_hash_root(),
        domain,
    }
    .tree_hash_root()
}
