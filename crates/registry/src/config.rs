use std::{path::Path, time::Duration};

use alloy_primitives::aliases::B32;
use anyhow::{ensure, Context};
use guardian_consensus::constants::{
    deposit_contract_deployment_block, genesis_fork_version, CHAIN_ID_HOLESKY, CHAIN_ID_MAINNET,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CACHE_LAG_BLOCKS: u64 = 100;
pub const DEFAULT_UPDATE_BLOCK_RATE: u64 = 10;
pub const DEFAULT_FETCH_STEP: u64 = 10_000;
pub const DEFAULT_FETCH_RETRY_DELAY_SECS: u64 = 5;
pub const DEFAULT_CYCLE_TIMEOUT_SECS: u64 = 5 * 60;

/// Earliest staking module deployment block.
pub fn staking_module_deployment_block(chain_id: u64) -> Option<u64> {
    match chain_id {
        CHAIN_ID_MAINNET => Some(11_473_216),
        CHAIN_ID_HOLESKY => Some(0),
        _ => None,
    }
}

/// Tuning of the event registries. Chain specific values fall back to the known networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Blocks behind the head that are never cached, so uncle blocks stay out of the cache.
    pub cache_lag_blocks: u64,
    pub update_block_rate: u64,
    pub fetch_step: u64,
    pub fetch_retry_delay_secs: u64,
    pub cycle_timeout_secs: u64,
    pub deployment_block: Option<u64>,
    pub staking_module_deployment_block: Option<u64>,
    pub genesis_fork_version: Option<B32>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cache_lag_blocks: DEFAULT_CACHE_LAG_BLOCKS,
            update_block_rate: DEFAULT_UPDATE_BLOCK_RATE,
            fetch_step: DEFAULT_FETCH_STEP,
            fetch_retry_delay_secs: DEFAULT_FETCH_RETRY_DELAY_SECS,
            cycle_timeout_secs: DEFAULT_CYCLE_TIMEOUT_SECS,
            deployment_block: None,
            staking_module_deployment_block: None,
            genesis_fork_version: None,
        }
    }
}

impl RegistryConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.update_block_rate > 0, "update_block_rate must be positive");
        ensure!(self.fetch_step > 0, "fetch_step must be positive");
        Ok(())
    }

    pub fn fetch_retry_delay(&self) -> Duration {
        Duration::from_secs(self.fetch_retry_delay_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    pub fn resolve_deployment_block(&self, chain_id: u64) -> anyhow::Result<u64> {
        self.deployment_block
            .or_else(|| deposit_contract_deployment_block(chain_id))
            .with_context(|| format!("Chain {chain_id} is not supported"))
    }

    pub fn resolve_staking_module_deployment_block(&self, chain_id: u64) -> anyhow::Result<u64> {
        self.staking_module_deployment_block
            .or_else(|| staking_module_deployment_block(chain_id))
            .with_context(|| format!("Chain {chain_id} is not supported"))
    }

    pub fn resolve_genesis_fork_version(&self, chain_id: u64) -> anyhow::Result<B32> {
        self.genesis_fork_version
            .or_else(|| genesis_fork_version(chain_id))
            .with_context(|| format!("No genesis fork version known for chain {chain_id}"))
    }
}
