//! Chain reads the guardian depends on. Implemented by RPC adapters and by test fakes.

use std::future::Future;

use alloy_primitives::{Address, B256};
use guardian_consensus::block::{BlockHeader, BlockTag};

use crate::{
    errors::FetchError,
    raw::{RawDepositLog, RawSigningKeyLog},
};

pub trait BlockProvider: Send + Sync {
    fn block(&self, tag: BlockTag) -> impl Future<Output = anyhow::Result<BlockHeader>> + Send;

    fn chain_id(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;
}

pub trait DepositRootReader: Send + Sync {
    /// `get_deposit_root()` of the deposit contract at `tag`.
    fn deposit_root(&self, tag: BlockTag) -> impl Future<Output = anyhow::Result<B256>> + Send;
}

pub trait DepositLogSource: Send + Sync {
    /// Deposit logs of the inclusive block range, in chain order.
    fn deposit_logs(
        &self,
        start_block: u64,
        end_block: u64,
    ) -> impl Future<Output = Result<Vec<RawDepositLog>, FetchError>> + Send;
}

pub trait SigningKeyLogSource: Send + Sync {
    /// Signing key logs of `modules` in the inclusive block range, in chain order.
    fn signing_key_logs(
        &self,
        start_block: u64,
        end_block: u64,
        modules: &[Address],
    ) -> impl Future<Output = Result<Vec<RawSigningKeyLog>, FetchError>> + Send;

    fn staking_module_addresses(
        &self,
        tag: BlockTag,
    ) -> impl Future<Output = anyhow::Result<Vec<Address>>> + Send;
}
