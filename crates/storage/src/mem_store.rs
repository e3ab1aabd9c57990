//! In-memory [`KeyValueStore`] backed by a [`BTreeMap`].
//!
//! Used by tests and the offline tooling. A whole batch is applied under a single write lock, so
//! readers never observe half of a batch.

use std::{collections::BTreeMap, sync::RwLock};

use crate::{
    errors::StoreError,
    kv::{BatchOp, KeyValueStore, WriteBatch},
};

#[derive(Debug, Default)]
pub struct MemStore {
    kvs: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.is_empty())
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>, StoreError> {
        self.kvs
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.read()?.get(key).cloned())
    }

    fn range(&self, from: &[u8], to: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        if from >= to {
            return Ok(Vec::new());
        }
        Ok(self
            .read()?
            .range(from.to_vec()..to.to_vec())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut kvs = self
            .kvs
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))?;
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => {
                    kvs.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    kvs.remove(&key);
                }
            }
        }
        Ok(())
    }
}
