use std::{sync::Arc, time::Instant};

use alloy_primitives::{Address, FixedBytes, B256};
use anyhow::{bail, ensure};
use guardian_chain::{
    provider::{BlockProvider, SigningKeyLogSource},
    signing_key_fetcher::SigningKeyEventFetcher,
};
use guardian_consensus::{block::BlockTag, signing_key_event::SigningKeyEvent};
use guardian_executor::{CycleGuard, CycleOutcome};
use guardian_sanity::blockchain::{find_reorganized_event, verify_cache_block};
use guardian_storage::{
    headers::SigningKeyCacheHeaders,
    kv::KeyValueStore,
    tables::event_store::{EventStore, EventsCache, SigningKeyEventStore, SIGNING_KEY_NAMESPACE},
};
use itertools::Itertools;
use tracing::{debug, error, info, warn};

use crate::config::RegistryConfig;

const SIGNING_KEYS_STREAM: &str = "signing-keys-registry";

pub type SigningKeyEventsCache = EventsCache<SigningKeyEvent, SigningKeyCacheHeaders>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKeyEventsWithModules {
    pub events: Vec<SigningKeyEvent>,
    pub staking_modules_addresses: Vec<Address>,
    pub start_block: u64,
    pub end_block: u64,
}

/// Cache of `SigningKeyAdded` events of the staking modules, up to the finalized block.
pub struct SigningKeysRegistry<S, P> {
    provider: Arc<P>,
    store: SigningKeyEventStore<S>,
    fetcher: SigningKeyEventFetcher<P>,
    guard: CycleGuard<&'static str>,
    config: RegistryConfig,
    deployment_block: u64,
}

impl<S, P> SigningKeysRegistry<S, P>
where
    S: KeyValueStore + 'static,
    P: BlockProvider + SigningKeyLogSource + 'static,
{
    pub async fn new(db: Arc<S>, provider: Arc<P>, config: RegistryConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let chain_id = provider.chain_id().await?;
        let deployment_block = config.resolve_staking_module_deployment_block(chain_id)?;

        Ok(Self {
            store: EventStore::new(db, SIGNING_KEY_NAMESPACE, SigningKeyCacheHeaders::default()),
            fetcher: SigningKeyEventFetcher::new(provider.clone(), config.fetch_retry_delay()),
            guard: CycleGuard::new(config.cycle_timeout()),
            provider,
            config,
            deployment_block,
        })
    }

    pub fn store(&self) -> &SigningKeyEventStore<S> {
        &self.store
    }

    pub async fn initialize(&self, modules: &[Address]) -> anyhow::Result<()> {
        self.store.validate_and_clean_inconsistent_cache()?;
        self.update_events_cache(modules).await?;
        Ok(())
    }

    pub async fn handle_new_block(
        self: &Arc<Self>,
        modules: Vec<Address>,
    ) -> CycleOutcome<anyhow::Result<u64>> {
        let registry = self.clone();
        let outcome = self
            .guard
            .run(SIGNING_KEYS_STREAM, async move {
                registry.update_events_cache(&modules).await
            })
            .await;
        if let CycleOutcome::Completed(Err(err)) = &outcome {
            error!(?err, "Signing key events cache update failed");
        }
        outcome
    }

    /// Caches signing key events up to the finalized block, starting over when the module list
    /// changed. Returns the number of new events.
    pub async fn update_events_cache(&self, modules: &[Address]) -> anyhow::Result<u64> {
        let started = Instant::now();

        if self.staking_module_list_was_updated(modules)? {
            info!("Staking module list was updated. Deleting cache");
            self.store.delete_cache()?;
        }

        let finalized_block = self.provider.block(BlockTag::Finalized).await?;
        let initial_cache = self.get_cached_events()?;
        if !verify_cache_block(&initial_cache.headers, finalized_block.number) {
            return Ok(0);
        }

        let mut next_index = initial_cache.data.last().map_or(0, |event| event.index + 1);
        let mut new_events = 0u64;

        let mut chunk_start = initial_cache.headers.end_block + 1;
        while chunk_start <= finalized_block.number {
            let chunk_end = finalized_block
                .number
                .min(chunk_start + self.config.fetch_step - 1);
            let group = self
                .fetcher
                .fetch(chunk_start, chunk_end, modules, next_index)
                .await?;

            let headers = SigningKeyCacheHeaders {
                staking_modules_addresses: modules.to_vec(),
                start_block: initial_cache.headers.start_block,
                end_block: group.end_block,
            };
            self.store.insert_batch(&group.events, &headers)?;

            next_index += group.events.len() as u64;
            new_events += group.events.len() as u64;
            info!(
                finalized_block = finalized_block.number,
                start_block = chunk_start,
                end_block = chunk_end,
                "Historical signing key add events are fetched"
            );
            chunk_start = chunk_end + 1;
        }

        info!(
            new_events,
            total_events = initial_cache.data.len() as u64 + new_events,
            fetch_time_ms = started.elapsed().as_millis() as u64,
            "Signing key events cache is updated"
        );
        Ok(new_events)
    }

    pub fn staking_module_list_was_updated(&self, modules: &[Address]) -> anyhow::Result<bool> {
        let headers = self.store.get_headers()?;
        let was_updated = headers.modules_changed(modules);
        if was_updated {
            warn!(
                previous_modules = ?headers.staking_modules_addresses,
                current_modules = ?modules,
                "Staking module list was changed. Need to clear and update cache"
            );
        }
        Ok(was_updated)
    }

    /// Cached events with the headers raised to the module deployment block.
    pub fn get_cached_events(&self) -> anyhow::Result<SigningKeyEventsCache> {
        let EventsCache { headers, data } = self.store.get_all()?;
        Ok(EventsCache {
            headers: self.clamp(headers),
            data,
        })
    }

    pub fn get_events_for_operators_keys(
        &self,
        keys: &[FixedBytes<48>],
    ) -> anyhow::Result<SigningKeyEventsCache> {
        let unique_keys = keys.iter().copied().unique().collect::<Vec<_>>();
        Ok(EventsCache {
            headers: self.clamp(self.store.get_headers()?),
            data: self.store.get_by_keys(&unique_keys)?,
        })
    }

    /// Cached and fresh events of `key` up to `block_number`.
    pub async fn get_updated_signing_key_events(
        &self,
        key: FixedBytes<48>,
        block_number: u64,
        block_hash: B256,
    ) -> anyhow::Result<SigningKeyEventsWithModules> {
        let cached = self.get_events_for_operators_keys(&[key])?;
        ensure!(
            verify_cache_block(&cached.headers, block_number),
            "Signing key events cache is newer than the current block: {block_number}"
        );

        let first_not_cached = cached.headers.end_block + 1;
        let modules = &cached.headers.staking_modules_addresses;
        let fresh_events = if first_not_cached <= block_number {
            let next_index = self.store.last_event()?.map_or(0, |event| event.index + 1);
            self.fetcher
                .fetch(first_not_cached, block_number, modules, next_index)
                .await?
                .events
        } else {
            Vec::new()
        };

        if find_reorganized_event(&fresh_events, block_number, block_hash).is_some() {
            bail!("Reorganization found on block {block_number}");
        }

        debug!(
            events = fresh_events.len(),
            start_block = first_not_cached,
            end_block = block_number,
            ?block_hash,
            "Fresh signing key add events are fetched"
        );

        let mut events = cached.data;
        events.extend(fresh_events.into_iter().filter(|event| event.key == key));
        Ok(SigningKeyEventsWithModules {
            events,
            staking_modules_addresses: cached.headers.staking_modules_addresses,
            start_block: cached.headers.start_block,
            end_block: block_number,
        })
    }

    pub fn set_cached_events(&self, cache: &SigningKeyEventsCache) -> anyhow::Result<()> {
        self.store.set_cached_events(cache)?;
        Ok(())
    }

    fn clamp(&self, headers: SigningKeyCacheHeaders) -> SigningKeyCacheHeaders {
        SigningKeyCacheHeaders {
            start_block: headers.start_block.max(self.deployment_block),
            end_block: headers.end_block.max(self.deployment_block),
            ..headers
        }
    }
}
