use std::fmt::Debug;

use alloy_primitives::Address;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::StoreError;

/// Metadata describing the contiguous block range a cached event set covers.
pub trait CacheHeaders:
    Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static
{
    fn start_block(&self) -> u64;

    fn end_block(&self) -> u64;

    fn with_start_block(&self, start_block: u64) -> Self;

    fn with_end_block(&self, end_block: u64) -> Self;

    fn validate(&self) -> Result<(), StoreError> {
        if self.end_block() < self.start_block() {
            return Err(StoreError::InvalidHeader(format!(
                "end block {} is lower than start block {}",
                self.end_block(),
                self.start_block()
            )));
        }
        Ok(())
    }

    /// Decodes headers coming from outside the typed code paths.
    fn from_json(bytes: &[u8]) -> Result<Self, StoreError> {
        let headers: Self = serde_json::from_slice(bytes)
            .map_err(|err| StoreError::InvalidHeader(err.to_string()))?;
        headers.validate()?;
        Ok(headers)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DepositCacheHeaders {
    pub start_block: u64,
    pub end_block: u64,
}

impl DepositCacheHeaders {
    pub fn new(start_block: u64, end_block: u64) -> Self {
        Self {
            start_block,
            end_block,
        }
    }
}

impl CacheHeaders for DepositCacheHeaders {
    fn start_block(&self) -> u64 {
        self.start_block
    }

    fn end_block(&self) -> u64 {
        self.end_block
    }

    fn with_start_block(&self, start_block: u64) -> Self {
        Self {
            start_block,
            ..*self
        }
    }

    fn with_end_block(&self, end_block: u64) -> Self {
        Self {
            end_block,
            ..*self
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningKeyCacheHeaders {
    pub staking_modules_addresses: Vec<Address>,
    pub start_block: u64,
    pub end_block: u64,
}

impl SigningKeyCacheHeaders {
    /// True when the cached module set differs from `addresses`, ignoring order.
    pub fn modules_changed(&self, addresses: &[Address]) -> bool {
        let mut cached = self.staking_modules_addresses.clone();
        let mut current = addresses.to_vec();
        cached.sort_unstable();
        cached.dedup();
        current.sort_unstable();
        current.dedup();
        cached != current
    }
}

impl CacheHeaders for SigningKeyCacheHeaders {
    fn start_block(&self) -> u64 {
        self.start_block
    }

    fn end_block(&self) -> u64 {
        self.end_block
    }

    fn with_start_block(&self, start_block: u64) -> Self {
        Self {
            start_block,
            ..self.clone()
        }
    }

    fn with_end_block(&self, end_block: u64) -> Self {
        Self {
            end_block,
            ..self.clone()
        }
    }
}
