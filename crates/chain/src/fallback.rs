use std::{future::Future, time::Duration};

use futures::{future::BoxFuture, FutureExt};
use guardian_consensus::event_group::EventGroup;
use tracing::{debug, warn};

use crate::errors::FetchError;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Fetches `start..=end` with `fetcher`, never giving up.
///
/// A [`FetchError::CapacityExceeded`] on a range wider than two blocks splits it at
/// `ceil((start + end) / 2)` and fetches both halves concurrently. Any other failure, or a
/// capacity failure of a range that is not split, is retried after `retry_delay`.
pub fn fetch_events_fall_over<'a, T, F, Fut>(
    start: u64,
    end: u64,
    fetcher: &'a F,
    retry_delay: Duration,
) -> BoxFuture<'a, EventGroup<T>>
where
    T: Send + 'a,
    F: Fn(u64, u64) -> Fut + Sync,
    Fut: Future<Output = Result<Vec<T>, FetchError>> + Send + 'a,
{
    async move {
        loop {
            match fetcher(start, end).await {
                Ok(events) => {
                    debug!(start, end, count = events.len(), "Fetched events");
                    return EventGroup::new(events, start, end);
                }
                Err(FetchError::CapacityExceeded(reason)) if end.saturating_sub(start) > 1 => {
                    let center = (start + end).div_ceil(2);
                    debug!(start, end, center, %reason, "Splitting events range");

                    let (mut left, right) = futures::join!(
                        fetch_events_fall_over(start, center - 1, fetcher, retry_delay),
                        fetch_events_fall_over(center, end, fetcher, retry_delay),
                    );
                    left.extend(right);
                    return left;
                }
                Err(err) => {
                    warn!(start, end, ?err, "Failed to fetch events, retrying");
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
    }
    .boxed()
}
