use std::sync::Arc;

use alloy_primitives::{aliases::B32, B256};
use anyhow::{bail, Context};
use guardian_chain::provider::DepositRootReader;
use guardian_consensus::{block::BlockTag, deposit_event::DepositEvent};
use guardian_registry::config::RegistryConfig;
use guardian_sanity::integrity::DepositIntegrityChecker;
use guardian_storage::{
    headers::DepositCacheHeaders,
    mem_store::MemStore,
    tables::event_store::{DepositEventStore, EventStore, DEPOSIT_NAMESPACE},
};
use itertools::Itertools;
use tracing::{info, warn};

use crate::cli::VerifyCacheCommand;

/// Answers every root query with the root the user expects.
#[derive(Debug)]
struct ExpectedRoot(B256);

impl DepositRootReader for ExpectedRoot {
    async fn deposit_root(&self, _tag: BlockTag) -> anyhow::Result<B256> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub loaded: usize,
    /// Deposit indices present more than once in the dump.
    pub duplicates: Vec<u64>,
    pub removed: usize,
    pub invalid_signatures: usize,
    pub root: B256,
    pub matches: bool,
}

pub async fn run(cmd: &VerifyCacheCommand, config: &RegistryConfig) -> anyhow::Result<()> {
    let dump = std::fs::read(&cmd.dump)
        .with_context(|| format!("Failed to read {}", cmd.dump.display()))?;
    let events: Vec<DepositEvent> =
        serde_json::from_slice(&dump).context("Failed to parse deposit events dump")?;

    let genesis_fork_version = if cmd.check_signatures {
        Some(config.resolve_genesis_fork_version(cmd.chain_id)?)
    } else {
        None
    };

    let report = verify_events(events, cmd.expected_root, genesis_fork_version).await?;
    info!(
        loaded = report.loaded,
        duplicates = ?report.duplicates,
        removed = report.removed,
        invalid_signatures = report.invalid_signatures,
        root = ?report.root,
        "Deposit events dump verified"
    );
    if !report.matches {
        bail!(
            "Deposit root {} does not match expected root {}",
            report.root,
            cmd.expected_root
        );
    }
    Ok(())
}

/// Loads `events` into a fresh cache, truncates it to its consistent prefix and replays it.
///
/// A repeated deposit index is a sequence error like a gap: events from the first repeated index
/// onward are dropped.
pub async fn verify_events(
    events: Vec<DepositEvent>,
    expected_root: B256,
    genesis_fork_version: Option<B32>,
) -> anyhow::Result<VerifyReport> {
    let loaded = events.len();
    let duplicates = events
        .iter()
        .map(|event| event.deposit_count)
        .duplicates()
        .sorted()
        .collect::<Vec<_>>();
    let events = match duplicates.first() {
        Some(&first) => {
            warn!(?duplicates, "Dump repeats deposit indices");
            events
                .into_iter()
                .filter(|event| event.deposit_count < first)
                .collect()
        }
        None => events,
    };

    let end_block = events.iter().map(|event| event.block_number).max().unwrap_or(0);
    let store: DepositEventStore<MemStore> = EventStore::new(
        Arc::new(MemStore::new()),
        DEPOSIT_NAMESPACE,
        DepositCacheHeaders::default(),
    );
    store.insert_batch(&events, &DepositCacheHeaders::new(0, end_block))?;
    let removed = loaded - events.len() + store.validate_and_clean_inconsistent_cache()?;
    let cache = store.get_all()?;

    let invalid_signatures = match genesis_fork_version {
        Some(fork_version) => cache
            .data
            .iter()
            .filter(|event| !event.deposit_data().is_valid_signature(fork_version))
            .count(),
        None => 0,
    };
    if invalid_signatures > 0 {
        warn!(invalid_signatures, "Dump contains deposits with invalid signatures");
    }

    let checker = DepositIntegrityChecker::new(Arc::new(ExpectedRoot(expected_root)));
    checker.initialize(&cache.data).await?;
    let matches = checker.check_finalized_root(BlockTag::Latest).await?;

    Ok(VerifyReport {
        loaded,
        duplicates,
        removed,
        invalid_signatures,
        root: checker.finalized_root().await,
        matches,
    })
}
