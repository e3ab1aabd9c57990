use std::sync::Arc;

use guardian_chain::provider::DepositRootReader;
use guardian_consensus::{
    block::{BlockHeader, BlockTag},
    deposit_event::DepositEvent,
};
use guardian_storage::headers::DepositCacheHeaders;
use tracing::{error, info};

use crate::{
    blockchain::{find_reorganized_event, verify_cache_block},
    errors::IntegrityError,
    integrity::DepositIntegrityChecker,
};

/// Checks deposit events against the chain before they are trusted.
#[derive(Debug)]
pub struct DepositSanityChecker<R> {
    integrity: DepositIntegrityChecker<R>,
}

impl<R: DepositRootReader> DepositSanityChecker<R> {
    pub fn new(root_reader: Arc<R>) -> Self {
        Self {
            integrity: DepositIntegrityChecker::new(root_reader),
        }
    }

    pub fn integrity(&self) -> &DepositIntegrityChecker<R> {
        &self.integrity
    }

    pub async fn initialize(&self, cached_events: &[DepositEvent]) -> Result<(), IntegrityError> {
        self.integrity.initialize(cached_events).await
    }

    pub fn verify_cache_block(&self, headers: &DepositCacheHeaders, current_block: u64) -> bool {
        verify_cache_block(headers, current_block)
    }

    /// Commits a chunk of finalized events to the tree unless `block` shows a reorganization.
    pub async fn verify_events_chunk(
        &self,
        block: &BlockHeader,
        events: &[DepositEvent],
    ) -> Result<bool, IntegrityError> {
        if self.is_reorganized(block, events) {
            return Ok(false);
        }

        let deposit_root = self.integrity.put_finalized_events(events).await?;
        info!(
            block_number = block.number,
            block_hash = ?block.hash,
            ?deposit_root,
            "Deposit events chunk was verified"
        );
        Ok(true)
    }

    /// Checks unfinalized events on top of the finalized tree against the root at `block`.
    pub async fn verify_fresh_events(
        &self,
        block: &BlockHeader,
        events: &[DepositEvent],
    ) -> Result<bool, IntegrityError> {
        if self.is_reorganized(block, events) {
            return Ok(false);
        }

        self.integrity
            .check_latest_root(BlockTag::Hash(block.hash), events)
            .await
    }

    pub async fn verify_updated_events(&self, block_number: u64) -> Result<bool, IntegrityError> {
        self.integrity
            .check_finalized_root(BlockTag::Number(block_number))
            .await
    }

    fn is_reorganized(&self, block: &BlockHeader, events: &[DepositEvent]) -> bool {
        let Some(event) = find_reorganized_event(events, block.number, block.hash) else {
            return false;
        };
        error!(
            block_number = event.block_number,
            block_hash = ?event.block_hash,
            deposit_data_root = ?event.deposit_data_root,
            "Reorganization found in deposit event"
        );
        true
    }
}
