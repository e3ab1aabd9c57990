//! Exclusive execution of recurring cycles.
//!
//! A cycle (cache update, verification pass) for a given stream runs at most once at a time. A
//! request arriving while the previous cycle of the same stream is still running is dropped, never
//! queued, and a cycle that exceeds its timeout stops being awaited while it keeps running in the
//! background until it finishes on its own.

use std::{
    collections::HashMap,
    fmt::{Debug, Display},
    future::Future,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running,
}

/// What happened to a cycle submitted to [`CycleGuard::run`].
#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome<T> {
    Completed(T),
    /// Another cycle of the same stream was still running.
    Skipped,
    /// The cycle did not finish within the timeout and is still running.
    TimedOut,
    /// The cycle panicked.
    Panicked,
}

impl<T> CycleOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            CycleOutcome::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Per-stream "one at a time" guard.
#[derive(Debug)]
pub struct CycleGuard<K> {
    states: Arc<Mutex<HashMap<K, CycleState>>>,
    timeout: Duration,
}

impl<K> Clone for CycleGuard<K> {
    fn clone(&self) -> Self {
        Self {
            states: self.states.clone(),
            timeout: self.timeout,
        }
    }
}

impl<K> CycleGuard<K>
where
    K: Eq + Hash + Clone + Debug + Display + Send + 'static,
{
    pub fn new(timeout: Duration) -> Self {
        Self {
            states: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    pub fn state(&self, stream: &K) -> CycleState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(stream)
            .copied()
            .unwrap_or(CycleState::Idle)
    }

    /// Runs `cycle` for `stream` unless a cycle of that stream is already running.
    ///
    /// The cycle is spawned on the current tokio runtime; the stream stays `Running` until the
    /// spawned task ends, even if the caller gave up waiting.
    pub async fn run<F, T>(&self, stream: K, cycle: F) -> CycleOutcome<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if !self.try_acquire(&stream) {
            debug!(%stream, "Cycle is already running");
            return CycleOutcome::Skipped;
        }

        let states = self.states.clone();
        let released = stream.clone();
        let handle: JoinHandle<T> = tokio::spawn(async move {
            let result = std::panic::AssertUnwindSafe(cycle).catch_unwind().await;
            states
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(released, CycleState::Idle);
            match result {
                Ok(value) => value,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        });

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(value)) => CycleOutcome::Completed(value),
            Ok(Err(err)) => {
                error!(%stream, ?err, "Cycle failed");
                CycleOutcome::Panicked
            }
            Err(_) => {
                warn!(
                    %stream,
                    timeout_secs = self.timeout.as_secs(),
                    "Cycle timed out, leaving it to finish in the background"
                );
                CycleOutcome::TimedOut
            }
        }
    }

    fn try_acquire(&self, stream: &K) -> bool {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        match states.get(stream) {
            Some(CycleState::Running) => false,
            _ => {
                states.insert(stream.clone(), CycleState::Running);
                true
            }
        }
    }
}
