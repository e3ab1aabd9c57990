//! Namespaced event cache on top of a [`KeyValueStore`].
//!
//! Layout inside a namespace `ns`:
//! - `ns:event:<index as big endian u64>` one JSON encoded event per index
//! - `ns:headers` the JSON encoded [`CacheHeaders`]
//! - `ns:checkpoint` the last known good event
//!
//! Big endian keys keep the store's key order equal to the event index order.

use std::{marker::PhantomData, sync::Arc};

use alloy_primitives::FixedBytes;
use guardian_consensus::{
    constants::MAX_DEPOSIT_COUNT, deposit_event::DepositEvent, signing_key_event::SigningKeyEvent,
};
use tracing::{debug, info, warn};

use crate::{
    errors::StoreError,
    event::CachedEvent,
    headers::{CacheHeaders, DepositCacheHeaders, SigningKeyCacheHeaders},
    kv::{prefix_upper_bound, KeyValueStore, WriteBatch},
};

pub const DEPOSIT_NAMESPACE: &str = "deposit";
pub const SIGNING_KEY_NAMESPACE: &str = "signing-keys";

pub type DepositEventStore<S> = EventStore<S, DepositEvent, DepositCacheHeaders>;
pub type SigningKeyEventStore<S> = EventStore<S, SigningKeyEvent, SigningKeyCacheHeaders>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsCache<E, H> {
    pub headers: H,
    pub data: Vec<E>,
}

#[derive(Debug)]
pub struct EventStore<S, E, H> {
    db: Arc<S>,
    namespace: String,
    default_headers: H,
    _event: PhantomData<fn() -> E>,
}

impl<S, E, H> EventStore<S, E, H>
where
    S: KeyValueStore,
    E: CachedEvent,
    H: CacheHeaders,
{
    pub fn new(db: Arc<S>, namespace: impl Into<String>, default_headers: H) -> Self {
        Self {
            db,
            namespace: namespace.into(),
            default_headers,
            _event: PhantomData,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn default_headers(&self) -> &H {
        &self.default_headers
    }

    /// Stores `events` and `headers` in a single atomic batch, headers last.
    pub fn insert_batch(&self, events: &[E], headers: &H) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        self.push_events(&mut batch, events, headers)?;
        self.db.write_batch(batch)?;
        debug!(
            namespace = %self.namespace,
            count = events.len(),
            end_block = headers.end_block(),
            "Inserted events batch"
        );
        Ok(())
    }

    /// All cached events in ascending index order. An empty namespace yields the default headers.
    pub fn get_all(&self) -> Result<EventsCache<E, H>, StoreError> {
        let headers = self.get_headers()?;
        let data = self
            .events_from(0)?
            .into_iter()
            .map(|(_, event)| event)
            .collect();
        Ok(EventsCache { headers, data })
    }

    pub fn get_headers(&self) -> Result<H, StoreError> {
        match self.db.get(&self.headers_key())? {
            Some(bytes) => H::from_json(&bytes),
            None => Ok(self.default_headers.clone()),
        }
    }

    pub fn last_event(&self) -> Result<Option<E>, StoreError> {
        Ok(self.events_from(0)?.pop().map(|(_, event)| event))
    }

    /// Truncates the cache to its longest gapless zero based prefix.
    ///
    /// Returns the number of removed events. Running it again on a repaired cache is a no-op.
    pub fn validate_and_clean_inconsistent_cache(&self) -> Result<usize, StoreError> {
        let events = self.events_from(0)?;
        let boundary = events
            .iter()
            .enumerate()
            .position(|(position, (_, event))| event.index() != position as u64)
            .unwrap_or(events.len());
        if boundary == events.len() {
            return Ok(0);
        }

        let headers = match boundary {
            0 => self.default_headers.clone(),
            _ => self
                .get_headers()?
                .with_end_block(events[boundary - 1].1.block_number()),
        };

        let mut batch = WriteBatch::new();
        for (key, _) in &events[boundary..] {
            batch.delete(key.clone());
        }
        if let Some(checkpoint) = self.get_checkpoint()? {
            if checkpoint.index() >= boundary as u64 {
                batch.delete(self.checkpoint_key());
            }
        }
        batch.put(self.headers_key(), serde_json::to_vec(&headers)?);
        self.db.write_batch(batch)?;

        let removed = events.len() - boundary;
        warn!(
            namespace = %self.namespace,
            boundary,
            removed,
            end_block = headers.end_block(),
            "Removed inconsistent events from cache"
        );
        Ok(removed)
    }

    /// Deletes every event with `index >= from_index` and the checkpoint, then writes `headers`.
    pub fn delete_from_index(&self, from_index: u64, headers: &H) -> Result<usize, StoreError> {
        headers.validate()?;

        let stale = self.events_from(from_index)?;
        let mut batch = WriteBatch::new();
        for (key, _) in &stale {
            batch.delete(key.clone());
        }
        batch.delete(self.checkpoint_key());
        batch.put(self.headers_key(), serde_json::to_vec(headers)?);
        self.db.write_batch(batch)?;

        info!(
            namespace = %self.namespace,
            from_index,
            removed = stale.len(),
            "Deleted events from index"
        );
        Ok(stale.len())
    }

    pub fn insert_checkpoint(&self, event: &E) -> Result<(), StoreError> {
        self.db
            .put(self.checkpoint_key(), serde_json::to_vec(event)?)
    }

    pub fn get_checkpoint(&self) -> Result<Option<E>, StoreError> {
        self.db
            .get(&self.checkpoint_key())?
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Drops events after the checkpoint, or every event when no checkpoint is stored.
    pub fn clear_from_checkpoint(&self) -> Result<usize, StoreError> {
        let checkpoint = self.get_checkpoint()?;
        let (from_index, headers) = match &checkpoint {
            Some(event) => (
                event.index() + 1,
                self.get_headers()?.with_end_block(event.block_number()),
            ),
            None => (0, self.default_headers.clone()),
        };

        let stale = self.events_from(from_index)?;
        let mut batch = WriteBatch::new();
        for (key, _) in &stale {
            batch.delete(key.clone());
        }
        batch.put(self.headers_key(), serde_json::to_vec(&headers)?);
        self.db.write_batch(batch)?;

        info!(
            namespace = %self.namespace,
            from_index,
            removed = stale.len(),
            "Cleared cache from checkpoint"
        );
        Ok(stale.len())
    }

    /// Removes every key of the namespace.
    pub fn delete_cache(&self) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        self.push_namespace_deletes(&mut batch)?;
        self.db.write_batch(batch)?;
        info!(namespace = %self.namespace, "Deleted cache");
        Ok(())
    }

    /// Replaces the whole namespace with `cache` in one batch.
    pub fn set_cached_events(&self, cache: &EventsCache<E, H>) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        self.push_namespace_deletes(&mut batch)?;
        self.push_events(&mut batch, &cache.data, &cache.headers)?;
        self.db.write_batch(batch)
    }

    pub fn find_events(&self, predicate: impl Fn(&E) -> bool) -> Result<Vec<E>, StoreError> {
        Ok(self
            .events_from(0)?
            .into_iter()
            .map(|(_, event)| event)
            .filter(|event| predicate(event))
            .collect())
    }

    fn push_events(
        &self,
        batch: &mut WriteBatch,
        events: &[E],
        headers: &H,
    ) -> Result<(), StoreError> {
        headers.validate()?;
        for event in events {
            if event.index() > MAX_DEPOSIT_COUNT {
                return Err(StoreError::IndexOutOfRange {
                    index: event.index(),
                    max: MAX_DEPOSIT_COUNT,
                });
            }
            let block_number = event.block_number();
            if block_number < headers.start_block() || block_number > headers.end_block() {
                return Err(StoreError::EventOutOfRange {
                    index: event.index(),
                    block_number,
                    start_block: headers.start_block(),
                    end_block: headers.end_block(),
                });
            }
            batch.put(self.event_key(event.index()), serde_json::to_vec(event)?);
        }
        batch.put(self.headers_key(), serde_json::to_vec(headers)?);
        Ok(())
    }

    fn push_namespace_deletes(&self, batch: &mut WriteBatch) -> Result<(), StoreError> {
        let prefix = format!("{}:", self.namespace).into_bytes();
        for (key, _) in self.db.range(&prefix, &prefix_upper_bound(&prefix))? {
            batch.delete(key);
        }
        Ok(())
    }

    fn events_from(&self, index: u64) -> Result<Vec<(Vec<u8>, E)>, StoreError> {
        let upper = prefix_upper_bound(&self.event_prefix());
        self.db
            .range(&self.event_key(index), &upper)?
            .into_iter()
            .map(|(key, value)| Ok((key, serde_json::from_slice(&value)?)))
            .collect()
    }

    fn event_prefix(&self) -> Vec<u8> {
        format!("{}:event:", self.namespace).into_bytes()
    }

    fn event_key(&self, index: u64) -> Vec<u8> {
        let mut key = self.event_prefix();
        key.extend_from_slice(&index.to_be_bytes());
        key
    }

    fn headers_key(&self) -> Vec<u8> {
        format!("{}:headers", self.namespace).into_bytes()
    }

    fn checkpoint_key(&self) -> Vec<u8> {
        format!("{}:checkpoint", self.namespace).into_bytes()
    }
}

impl<S: KeyValueStore> SigningKeyEventStore<S> {
    /// Cached events whose key is one of `keys`.
    pub fn get_by_keys(&self, keys: &[FixedBytes<48>]) -> Result<Vec<SigningKeyEvent>, StoreError> {
        self.find_events(|event| keys.contains(&event.key))
    }
}
