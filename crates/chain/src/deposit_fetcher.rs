use std::{sync::Arc, time::Duration};

use alloy_primitives::{aliases::B32, FixedBytes};
use anyhow::Context;
use guardian_consensus::{
    deposit_data::DepositData,
    deposit_event::{DepositEvent, DepositEventGroup},
    misc::{form_deposit_node, parse_little_endian_64},
};
use tracing::debug;

use crate::{
    fallback::fetch_events_fall_over, provider::DepositLogSource, raw::RawDepositLog,
};

/// Turns a raw deposit log into a cached event, computing its leaf and checking its signature.
pub fn format_deposit_event(
    log: &RawDepositLog,
    genesis_fork_version: B32,
) -> anyhow::Result<DepositEvent> {
    let data = DepositData::from_log_fields(
        &log.pubkey,
        &log.withdrawal_credentials,
        &log.amount,
        &log.signature,
    )
    .with_context(|| format!("Malformed deposit log in block {}", log.block_number))?;
    let deposit_count = parse_little_endian_64(&log.index)
        .with_context(|| format!("Malformed deposit index in block {}", log.block_number))?;

    Ok(DepositEvent {
        pubkey: FixedBytes::try_from(log.pubkey.as_ref())?,
        withdrawal_credentials: data.withdrawal_credentials,
        amount: data.amount,
        signature: FixedBytes::try_from(log.signature.as_ref())?,
        tx: log.tx,
        block_number: log.block_number,
        block_hash: log.block_hash,
        log_index: log.log_index,
        deposit_count,
        deposit_data_root: form_deposit_node(&data),
        valid: data.is_valid_signature(genesis_fork_version),
    })
}

#[derive(Debug)]
pub struct DepositEventFetcher<P> {
    source: Arc<P>,
    genesis_fork_version: B32,
    retry_delay: Duration,
}

impl<P: DepositLogSource> DepositEventFetcher<P> {
    pub fn new(source: Arc<P>, genesis_fork_version: B32, retry_delay: Duration) -> Self {
        Self {
            source,
            genesis_fork_version,
            retry_delay,
        }
    }

    /// Deposit events of `start_block..=end_block`. Transient provider failures are retried.
    pub async fn fetch(&self, start_block: u64, end_block: u64) -> anyhow::Result<DepositEventGroup> {
        let source = &*self.source;
        let fetch = move |start, end| source.deposit_logs(start, end);
        let logs = fetch_events_fall_over(start_block, end_block, &fetch, self.retry_delay).await;

        let events = logs
            .events
            .iter()
            .map(|log| format_deposit_event(log, self.genesis_fork_version))
            .collect::<anyhow::Result<Vec<_>>>()?;
        debug!(start_block, end_block, count = events.len(), "Fetched deposit events");

        Ok(DepositEventGroup::new(events, logs.start_block, logs.end_block))
    }
}
