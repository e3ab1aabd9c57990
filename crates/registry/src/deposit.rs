//! Deposit event registry: keeps the deposit cache in sync with the chain and serves the full,
//! verified list of deposits at a given block.

use std::{sync::Arc, time::Instant};

use alloy_primitives::B256;
use anyhow::bail;
use guardian_chain::{
    deposit_fetcher::DepositEventFetcher,
    provider::{BlockProvider, DepositLogSource, DepositRootReader},
};
use guardian_consensus::{
    block::{BlockHeader, BlockTag},
    deposit_event::DepositEvent,
};
use guardian_executor::{CycleGuard, CycleOutcome};
use guardian_sanity::deposit::DepositSanityChecker;
use guardian_storage::{
    headers::{CacheHeaders, DepositCacheHeaders},
    kv::KeyValueStore,
    tables::event_store::{DepositEventStore, EventStore, EventsCache, DEPOSIT_NAMESPACE},
};
use tracing::{debug, error, info, warn};

use crate::config::RegistryConfig;

const DEPOSIT_STREAM: &str = "deposit-registry";

pub type DepositEventsCache = EventsCache<DepositEvent, DepositCacheHeaders>;

/// Every deposit up to `end_block`, cached and fresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedDepositEventGroup {
    pub events: Vec<DepositEvent>,
    pub start_block: u64,
    pub end_block: u64,
    /// The events reproduce the on-chain deposit root and no reorganization was seen.
    pub is_valid: bool,
}

pub struct DepositRegistry<S, P> {
    provider: Arc<P>,
    store: DepositEventStore<S>,
    fetcher: DepositEventFetcher<P>,
    sanity: DepositSanityChecker<P>,
    guard: CycleGuard<&'static str>,
    config: RegistryConfig,
    deployment_block: u64,
}

impl<S, P> DepositRegistry<S, P>
where
    S: KeyValueStore + 'static,
    P: BlockProvider + DepositLogSource + DepositRootReader + 'static,
{
    pub async fn new(db: Arc<S>, provider: Arc<P>, config: RegistryConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let chain_id = provider.chain_id().await?;
        let deployment_block = config.resolve_deployment_block(chain_id)?;
        let genesis_fork_version = config.resolve_genesis_fork_version(chain_id)?;
        info!(chain_id, deployment_block, "Deposit registry configured");

        Ok(Self {
            store: EventStore::new(db, DEPOSIT_NAMESPACE, DepositCacheHeaders::default()),
            fetcher: DepositEventFetcher::new(
                provider.clone(),
                genesis_fork_version,
                config.fetch_retry_delay(),
            ),
            sanity: DepositSanityChecker::new(provider.clone()),
            guard: CycleGuard::new(config.cycle_timeout()),
            provider,
            config,
            deployment_block,
        })
    }

    pub fn store(&self) -> &DepositEventStore<S> {
        &self.store
    }

    pub fn sanity(&self) -> &DepositSanityChecker<P> {
        &self.sanity
    }

    /// Repairs the cache, rebuilds the finalized tree from it and catches up with the chain.
    pub async fn initialize(&self) -> anyhow::Result<()> {
        self.store.validate_and_clean_inconsistent_cache()?;
        let cache = self.get_cached_events()?;
        self.sanity.initialize(&cache.data).await?;
        // Fresh events are needed before the first root check, old roots may be pruned
        self.update_events_cache().await?;
        Ok(())
    }

    /// Runs a cache update every `update_block_rate` blocks.
    ///
    /// Returns `None` off cadence. A cycle still running from an earlier block is not overlapped.
    pub async fn handle_new_block(
        self: &Arc<Self>,
        block_number: u64,
    ) -> Option<CycleOutcome<anyhow::Result<u64>>> {
        if block_number % self.config.update_block_rate != 0 {
            return None;
        }

        let registry = self.clone();
        let outcome = self
            .guard
            .run(DEPOSIT_STREAM, async move {
                registry.update_events_cache().await
            })
            .await;
        if let CycleOutcome::Completed(Err(err)) = &outcome {
            error!(block_number, ?err, "Deposit events cache update failed");
        }
        Some(outcome)
    }

    /// Cached events with the headers raised to the deployment block.
    pub fn get_cached_events(&self) -> anyhow::Result<DepositEventsCache> {
        let EventsCache { headers, data } = self.store.get_all()?;
        let headers = DepositCacheHeaders::new(
            headers.start_block.max(self.deployment_block),
            headers.end_block.max(self.deployment_block),
        );
        Ok(EventsCache { headers, data })
    }

    /// Caches the events of the blocks older than `cache_lag_blocks`. Returns the number of new
    /// events.
    pub async fn update_events_cache(&self) -> anyhow::Result<u64> {
        let started = Instant::now();
        let current_block = self.provider.block(BlockTag::Latest).await?;
        let initial_cache = self.get_cached_events()?;

        if !self
            .sanity
            .verify_cache_block(&initial_cache.headers, current_block.number)
        {
            return Ok(0);
        }

        let to_block = current_block
            .number
            .saturating_sub(self.config.cache_lag_blocks);
        let mut end_block = initial_cache.headers.end_block;
        let mut new_events = 0u64;

        let mut chunk_start = end_block + 1;
        while chunk_start <= to_block {
            let chunk_end = to_block.min(chunk_start + self.config.fetch_step - 1);
            let group = self.fetcher.fetch(chunk_start, chunk_end).await?;

            if !self
                .sanity
                .verify_events_chunk(&current_block, &group.events)
                .await?
            {
                bail!(
                    "Reorganization found in deposit events of blocks {chunk_start}..={chunk_end}"
                );
            }

            let headers = initial_cache.headers.with_end_block(group.end_block);
            if let Err(err) = self.store.insert_batch(&group.events, &headers) {
                // The tree already holds the chunk, bring it back in line with the store
                let cache = self.get_cached_events()?;
                self.sanity.initialize(&cache.data).await?;
                return Err(err.into());
            }

            new_events += group.events.len() as u64;
            end_block = group.end_block;
            info!(
                to_block,
                start_block = chunk_start,
                end_block = chunk_end,
                "Historical events are fetched"
            );
            chunk_start = chunk_end + 1;
        }

        if !self.sanity.verify_updated_events(end_block).await? {
            error!(
                block_number = end_block,
                current_block = current_block.number,
                current_block_hash = ?current_block.hash,
                "Integrity check failed on block"
            );
        }

        info!(
            new_events,
            total_events = initial_cache.data.len() as u64 + new_events,
            fetch_time_ms = started.elapsed().as_millis() as u64,
            "Deposit events cache is updated"
        );
        Ok(new_events)
    }

    /// Cached events followed by the fresh events up to `block_number`, checked against the
    /// deposit root at `block_hash`.
    pub async fn get_all_deposited_events(
        &self,
        block_number: u64,
        block_hash: B256,
    ) -> anyhow::Result<VerifiedDepositEventGroup> {
        let EventsCache { headers, data } = self.get_cached_events()?;

        if !self.sanity.verify_cache_block(&headers, block_number) {
            return Ok(VerifiedDepositEventGroup {
                events: data,
                start_block: headers.start_block,
                end_block: block_number,
                is_valid: false,
            });
        }

        let first_not_cached = headers.end_block + 1;
        let fresh_events = if first_not_cached <= block_number {
            self.fetcher.fetch(first_not_cached, block_number).await?.events
        } else {
            Vec::new()
        };

        let block = BlockHeader {
            number: block_number,
            hash: block_hash,
        };
        let is_valid = self.sanity.verify_fresh_events(&block, &fresh_events).await?;
        if !is_valid {
            warn!(block_number, ?block_hash, "Integrity check failed on block");
        }

        debug!(
            events = fresh_events.len(),
            start_block = first_not_cached,
            end_block = block_number,
            ?block_hash,
            last_event_block_hash = ?fresh_events.last().map(|event| event.block_hash),
            "Fresh deposit events are fetched"
        );

        let mut events = data;
        events.extend(fresh_events);
        Ok(VerifiedDepositEventGroup {
            events,
            start_block: headers.start_block,
            end_block: block_number,
            is_valid,
        })
    }

    pub async fn get_deposit_root(&self, tag: BlockTag) -> anyhow::Result<B256> {
        self.provider.deposit_root(tag).await
    }
}

#[cfg(test)]
mod tests {
    use guardian_consensus::deposit_tree::DepositTree;
    use guardian_sanity::errors::IntegrityError;
    use guardian_storage::{errors::StoreError, event::CachedEvent, mem_store::MemStore};

    use super::*;
    use crate::test_utils::{block_hash, deposit_log, test_config, FakeChain, FlakyStore};

    async fn registry(
        chain: FakeChain,
        config: RegistryConfig,
    ) -> (Arc<DepositRegistry<MemStore, FakeChain>>, Arc<FakeChain>) {
        let chain = Arc::new(chain);
        let registry = DepositRegistry::new(Arc::new(MemStore::new()), chain.clone(), config)
            .await
            .unwrap();
        (Arc::new(registry), chain)
    }

    fn indices(events: &[DepositEvent]) -> Vec<u64> {
        events.iter().map(CachedEvent::index).collect()
    }

    /// Root of the tree rebuilt from the stored events.
    fn store_root<S: KeyValueStore + 'static>(registry: &DepositRegistry<S, FakeChain>) -> B256 {
        let mut tree = DepositTree::new();
        for event in registry.store().get_all().unwrap().data {
            assert!(tree.insert(event.deposit_data_root, event.deposit_count));
        }
        tree.get_root()
    }

    #[tokio::test]
    async fn test_update_caches_lagged_blocks_in_steps() {
        let (registry, chain) =
            registry(FakeChain::new(250, &[5, 20, 140, 160, 250]), test_config()).await;

        assert_eq!(registry.update_events_cache().await.unwrap(), 3);

        let cache = registry.get_cached_events().unwrap();
        assert_eq!(indices(&cache.data), vec![0, 1, 2]);
        assert_eq!(cache.headers, DepositCacheHeaders::new(0, 150));
        assert_eq!(
            registry.sanity().integrity().finalized_root().await,
            chain.deposit_root(BlockTag::Number(150)).await.unwrap()
        );

        chain.set_head(400);
        assert_eq!(registry.update_events_cache().await.unwrap(), 2);
        let cache = registry.get_cached_events().unwrap();
        assert_eq!(indices(&cache.data), vec![0, 1, 2, 3, 4]);
        assert_eq!(cache.headers.end_block, 300);
    }

    #[tokio::test]
    async fn test_chunk_with_gap_is_fetched_again_next_cycle() {
        let (registry, chain) =
            registry(FakeChain::new(250, &[5, 20, 30]), test_config()).await;

        // The node drops deposit 1 from the first chunk
        chain.withheld.lock().unwrap().push(20);
        let err = registry.update_events_cache().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IntegrityError>(),
            Some(IntegrityError::ReplayFailed { index: 2, node_count: 1 })
        ));
        assert_eq!(registry.sanity().integrity().finalized_node_count().await, 0);
        assert!(registry.get_cached_events().unwrap().data.is_empty());
        assert_eq!(
            registry.sanity().integrity().finalized_root().await,
            store_root(&registry)
        );

        chain.withheld.lock().unwrap().clear();
        assert_eq!(registry.update_events_cache().await.unwrap(), 3);
        let finalized_root = registry.sanity().integrity().finalized_root().await;
        assert_eq!(finalized_root, store_root(&registry));
        assert_eq!(
            finalized_root,
            chain.deposit_root(BlockTag::Number(150)).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_reorganized_chunk_stops_the_cycle() {
        let config = RegistryConfig {
            cache_lag_blocks: 0,
            ..test_config()
        };
        let (registry, chain) = registry(FakeChain::new(250, &[5]), config).await;
        let mut orphaned = deposit_log(1, 250);
        orphaned.block_hash = B256::repeat_byte(0x99);
        chain.deposits.lock().unwrap().push(orphaned);

        let err = registry.update_events_cache().await.unwrap_err();
        assert!(err.to_string().contains("Reorganization found"));

        let cache = registry.get_cached_events().unwrap();
        assert_eq!(indices(&cache.data), vec![0]);
        assert_eq!(cache.headers.end_block, 200);
        assert_eq!(registry.sanity().integrity().finalized_node_count().await, 1);
        assert_eq!(
            registry.sanity().integrity().finalized_root().await,
            store_root(&registry)
        );

        chain.deposits.lock().unwrap()[1].block_hash = block_hash(250);
        assert_eq!(registry.update_events_cache().await.unwrap(), 1);
        let finalized_root = registry.sanity().integrity().finalized_root().await;
        assert_eq!(finalized_root, store_root(&registry));
        assert_eq!(
            finalized_root,
            chain.deposit_root(BlockTag::Number(250)).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_failed_store_write_resyncs_tree_with_store() {
        let chain = Arc::new(FakeChain::new(150, &[5, 20, 60, 140]));
        let db = Arc::new(FlakyStore::default());
        let registry = DepositRegistry::new(db.clone(), chain.clone(), test_config())
            .await
            .unwrap();
        assert_eq!(registry.update_events_cache().await.unwrap(), 2);

        chain.set_head(250);
        db.set_fail_writes(true);
        let err = registry.update_events_cache().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Backend(_))
        ));
        // Deposit 2 was committed to the tree, then dropped with the failed write
        assert_eq!(registry.sanity().integrity().finalized_node_count().await, 2);
        assert_eq!(
            registry.sanity().integrity().finalized_root().await,
            store_root(&registry)
        );

        db.set_fail_writes(false);
        assert_eq!(registry.update_events_cache().await.unwrap(), 2);
        let finalized_root = registry.sanity().integrity().finalized_root().await;
        assert_eq!(finalized_root, store_root(&registry));
        assert_eq!(
            finalized_root,
            chain.deposit_root(BlockTag::Number(150)).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_initialize_repairs_cache_and_rebuilds_tree() {
        let (registry, chain) = registry(FakeChain::new(250, &[5, 20, 140]), test_config()).await;
        registry.update_events_cache().await.unwrap();

        // Drop deposit 1 behind the registry's back
        let mut cache = registry.store().get_all().unwrap();
        cache.data.remove(1);
        registry.store().set_cached_events(&cache).unwrap();

        registry.initialize().await.unwrap();

        let cache = registry.get_cached_events().unwrap();
        assert_eq!(indices(&cache.data), vec![0, 1, 2]);
        assert_eq!(
            registry.sanity().integrity().finalized_root().await,
            chain.deposit_root(BlockTag::Number(150)).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_all_deposited_events_merge_cache_and_fresh_events() {
        let (registry, _chain) =
            registry(FakeChain::new(250, &[5, 20, 140, 160, 250]), test_config()).await;
        registry.initialize().await.unwrap();

        let group = registry
            .get_all_deposited_events(250, block_hash(250))
            .await
            .unwrap();

        assert!(group.is_valid);
        assert_eq!(indices(&group.events), vec![0, 1, 2, 3, 4]);
        assert_eq!((group.start_block, group.end_block), (0, 250));
    }

    #[tokio::test]
    async fn test_reorganized_fresh_event_is_invalid() {
        let (registry, _chain) =
            registry(FakeChain::new(250, &[5, 20, 140, 160, 250]), test_config()).await;
        registry.initialize().await.unwrap();

        let group = registry
            .get_all_deposited_events(250, B256::repeat_byte(0x99))
            .await
            .unwrap();

        assert!(!group.is_valid);
    }

    #[tokio::test]
    async fn test_deposit_withheld_by_node_is_invalid() {
        let (registry, chain) =
            registry(FakeChain::new(250, &[5, 20, 140, 160]), test_config()).await;
        registry.initialize().await.unwrap();

        // The node stops returning the log of deposit 3 while the contract still counts it
        chain.withheld.lock().unwrap().push(160);
        let group = registry
            .get_all_deposited_events(250, block_hash(250))
            .await
            .unwrap();

        assert!(!group.is_valid);
        assert_eq!(indices(&group.events), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_cache_ahead_of_chain_is_not_valid() {
        let (registry, _chain) = registry(FakeChain::new(250, &[5]), test_config()).await;
        registry
            .store()
            .insert_batch(&[], &DepositCacheHeaders::new(0, 400))
            .unwrap();

        let group = registry
            .get_all_deposited_events(250, block_hash(250))
            .await
            .unwrap();
        assert!(!group.is_valid);
        assert!(group.events.is_empty());

        assert_eq!(registry.update_events_cache().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_headers_are_clamped_to_deployment_block() {
        let config = RegistryConfig {
            deployment_block: Some(100),
            ..test_config()
        };
        let (registry, _chain) = registry(FakeChain::new(50, &[]), config).await;

        let cache = registry.get_cached_events().unwrap();
        assert_eq!(cache.headers, DepositCacheHeaders::new(100, 100));
    }

    #[tokio::test]
    async fn test_handle_new_block_runs_on_cadence() {
        let (registry, _chain) = registry(FakeChain::new(250, &[5, 20]), test_config()).await;

        assert!(registry.handle_new_block(251).await.is_none());

        let outcome = registry.handle_new_block(250).await.unwrap();
        assert_eq!(outcome.completed().unwrap().unwrap(), 2);
    }
}
