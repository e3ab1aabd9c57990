use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, FixedBytes};
use anyhow::Context;
use guardian_consensus::signing_key_event::{SigningKeyEvent, SigningKeyEventGroup};
use tracing::debug;

use crate::{fallback::fetch_events_fall_over, provider::SigningKeyLogSource};

#[derive(Debug)]
pub struct SigningKeyEventFetcher<P> {
    source: Arc<P>,
    retry_delay: Duration,
}

impl<P: SigningKeyLogSource> SigningKeyEventFetcher<P> {
    pub fn new(source: Arc<P>, retry_delay: Duration) -> Self {
        Self {
            source,
            retry_delay,
        }
    }

    /// Signing key events of `modules` in `start_block..=end_block`.
    ///
    /// Events are numbered in chain order starting at `first_index`, continuing the cached log.
    pub async fn fetch(
        &self,
        start_block: u64,
        end_block: u64,
        modules: &[Address],
        first_index: u64,
    ) -> anyhow::Result<SigningKeyEventGroup> {
        let source = &*self.source;
        let fetch = move |start, end| source.signing_key_logs(start, end, modules);
        let logs = fetch_events_fall_over(start_block, end_block, &fetch, self.retry_delay).await;

        let events = logs
            .events
            .iter()
            .zip(first_index..)
            .map(|(log, index)| -> anyhow::Result<SigningKeyEvent> {
                Ok(SigningKeyEvent {
                    index,
                    operator_index: log.operator_index,
                    key: FixedBytes::try_from(log.pubkey.as_ref()).with_context(|| {
                        format!("Malformed signing key in block {}", log.block_number)
                    })?,
                    module_address: log.module_address,
                    log_index: log.log_index,
                    block_number: log.block_number,
                    block_hash: log.block_hash,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        debug!(start_block, end_block, count = events.len(), "Fetched signing key events");

        Ok(SigningKeyEventGroup::new(events, logs.start_block, logs.end_block))
    }
}
