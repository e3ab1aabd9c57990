use alloy_primitives::{aliases::B32, B256};
use anyhow::anyhow;
use blst::min_pk::{PublicKey, Signature};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tracing::debug;
use tree_hash_derive::TreeHash;

use crate::{
    constants::{DOMAIN_DEPOSIT, DST},
    deposit_message::DepositMessage,
    misc::{compute_domain, compute_signing_root, parse_little_endian_64},
    pubkey::PubKey,
    signature::BlsSignature,
};

/// Leaf payload of the deposit contract tree.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct DepositData {
    pub pubkey: PubKey,
    pub withdrawal_credentials: B256,
    pub amount: u64,

    /// BLS aggregate signature
    pub signature: BlsSignature,
}

impl DepositData {
    /// Builds deposit data from the raw fields of a ``DepositEvent`` log. The amount is the
    /// contract's little endian encoding.
    pub fn from_log_fields(
        pubkey: &[u8],
        withdrawal_credentials: &[u8],
        amount: &[u8],
        signature: &[u8],
    ) -> anyhow::Result<Self> {
        if withdrawal_credentials.len() != 32 {
            return Err(anyhow!(
                "Withdrawal credentials must be 32 bytes long, got {}",
                withdrawal_credentials.len()
            ));
        }

        Ok(Self {
            pubkey: PubKey::from_slice(pubkey)?,
            withdrawal_credentials: B256::from_slice(withdrawal_credentials),
            amount: parse_little_endian_64(amount)?,
            signature: BlsSignature::from_slice(signature)?,
        })
    }

    /// Verifies the proof of possession, which the deposit contract itself never checks.
    ///
    /// Malformed keys or signatures are reported as an invalid deposit rather than an error.
    pub fn is_valid_signature(&self, genesis_fork_version: B32) -> bool {
        // Fork-agnostic domain since deposits are valid across forks
        let domain = compute_domain(DOMAIN_DEPOSIT, genesis_fork_version, B256::ZERO);
        let signing_root = compute_signing_root(DepositMessage::from(self), domain);

        let signature = match Signature::from_bytes(&self.signature.signature) {
            Ok(signature) => signature,
            Err(err) => {
                debug!(?err, "Failed to decode deposit signature");
                return false;
            }
        };
        let public_key = match PublicKey::from_bytes(&self.pubkey.inner) {
            Ok(public_key) => public_key,
            Err(err) => {
                debug!(?err, "Failed to decode deposit public key");
                return false;
            }
        };

        signature.verify(true, signing_root.as_ref(), DST, &[], &public_key, true)
            == blst::BLST_ERROR::BLST_SUCCESS
    }
}
