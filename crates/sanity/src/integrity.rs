use std::sync::Arc;

use alloy_primitives::B256;
use anyhow::Context;
use guardian_chain::provider::DepositRootReader;
use guardian_consensus::{block::BlockTag, deposit_event::DepositEvent, deposit_tree::DepositTree};
use itertools::Itertools;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::errors::IntegrityError;

/// Replayed events between two progress reports.
pub const DEPOSIT_TREE_STEP_SYNC: usize = 10_000;

/// Keeps the deposit tree of finalized events and compares trees against the on-chain root.
///
/// The finalized tree only advances through [`put_finalized_events`](Self::put_finalized_events).
/// Checks of unfinalized events work on a clone that is dropped afterwards.
#[derive(Debug)]
pub struct DepositIntegrityChecker<R> {
    root_reader: Arc<R>,
    finalized_tree: RwLock<DepositTree>,
}

impl<R: DepositRootReader> DepositIntegrityChecker<R> {
    pub fn new(root_reader: Arc<R>) -> Self {
        Self {
            root_reader,
            finalized_tree: RwLock::new(DepositTree::new()),
        }
    }

    /// Rebuilds the finalized tree from `events`, which must start at deposit 0.
    pub async fn initialize(&self, events: &[DepositEvent]) -> Result<(), IntegrityError> {
        let mut tree = self.finalized_tree.write().await;
        *tree = DepositTree::new();
        put_events_to_tree(&mut tree, events).await
    }

    /// Commits `events` to the finalized tree.
    ///
    /// The chunk is replayed on a copy and applied only when every event fits, so a rejected
    /// chunk leaves the finalized tree as it was.
    pub async fn put_finalized_events(&self, events: &[DepositEvent]) -> Result<B256, IntegrityError> {
        let mut tree = self.finalized_tree.write().await;
        let mut next = tree.clone();
        put_events_to_tree(&mut next, events).await?;
        *tree = next;
        Ok(tree.get_root())
    }

    /// Clone of the finalized tree with `events` replayed on top.
    pub async fn put_latest_events(
        &self,
        events: &[DepositEvent],
    ) -> Result<DepositTree, IntegrityError> {
        let mut tree = self.finalized_tree.read().await.clone();
        put_events_to_tree(&mut tree, events).await?;
        Ok(tree)
    }

    pub async fn check_latest_root(
        &self,
        tag: BlockTag,
        fresh_events: &[DepositEvent],
    ) -> Result<bool, IntegrityError> {
        let sorted = fresh_events
            .iter()
            .sorted_by_key(|event| event.deposit_count)
            .cloned()
            .collect::<Vec<_>>();
        let tree = self.put_latest_events(&sorted).await?;
        self.check_root(tag, &tree).await
    }

    pub async fn check_finalized_root(&self, tag: BlockTag) -> Result<bool, IntegrityError> {
        let tree = self.finalized_tree.read().await.clone();
        self.check_root(tag, &tree).await
    }

    pub async fn finalized_root(&self) -> B256 {
        self.finalized_tree.read().await.get_root()
    }

    pub async fn finalized_node_count(&self) -> u64 {
        self.finalized_tree.read().await.node_count()
    }

    async fn check_root(&self, tag: BlockTag, tree: &DepositTree) -> Result<bool, IntegrityError> {
        let local_root = tree.get_root();
        let remote_root = self
            .root_reader
            .deposit_root(tag)
            .await
            .with_context(|| format!("Failed to read the deposit root at {tag}"))?;

        if local_root == remote_root {
            info!(%tag, "Integrity check successfully completed");
            return Ok(true);
        }

        error!(
            %tag,
            ?local_root,
            ?remote_root,
            "Deposit root is different from deposit root from the network"
        );
        Ok(false)
    }
}

async fn put_events_to_tree(
    tree: &mut DepositTree,
    events: &[DepositEvent],
) -> Result<(), IntegrityError> {
    for (position, event) in events.iter().enumerate() {
        if !tree.insert(event.deposit_data_root, event.deposit_count) {
            error!(
                index = event.deposit_count,
                node_count = tree.node_count(),
                block_number = event.block_number,
                block_hash = ?event.block_hash,
                "Deposit event does not follow the deposit tree"
            );
            return Err(IntegrityError::ReplayFailed {
                index: event.deposit_count,
                node_count: tree.node_count(),
            });
        }

        if position % DEPOSIT_TREE_STEP_SYNC == 0 {
            info!(
                processed = position,
                remaining = events.len() - position,
                "Checking integrity of saved deposit events"
            );
            tokio::task::yield_now().await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{deposit_event, root_of, StaticRoots};

    fn events(indices: impl IntoIterator<Item = u64>) -> Vec<DepositEvent> {
        indices
            .into_iter()
            .map(|index| deposit_event(index, 100 + index))
            .collect()
    }

    fn checker(roots: StaticRoots) -> DepositIntegrityChecker<StaticRoots> {
        DepositIntegrityChecker::new(Arc::new(roots))
    }

    #[tokio::test]
    async fn test_latest_root_does_not_advance_finalized_tree() {
        let tag = BlockTag::Hash(B256::repeat_byte(0x11));
        let checker = checker(StaticRoots::default().with(tag, root_of(5)));
        checker.initialize(&events(0..3)).await.unwrap();

        // Fresh events arrive in any order
        let fresh = events([4, 3]);
        assert!(checker.check_latest_root(tag, &fresh).await.unwrap());

        assert_eq!(checker.finalized_node_count().await, 3);
        assert_eq!(checker.finalized_root().await, root_of(3));
    }

    #[tokio::test]
    async fn test_latest_root_mismatch() {
        let tag = BlockTag::Number(42);
        let checker = checker(StaticRoots::default().with(tag, root_of(4)));
        checker.initialize(&events(0..3)).await.unwrap();

        assert!(!checker.check_latest_root(tag, &events(3..5)).await.unwrap());
    }

    #[tokio::test]
    async fn test_gap_in_fresh_events_fails_replay() {
        let checker = checker(StaticRoots::default());
        checker.initialize(&events(0..3)).await.unwrap();

        let err = checker
            .check_latest_root(BlockTag::Latest, &events([3, 5]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IntegrityError::ReplayFailed { index: 5, node_count: 4 }
        ));
        assert_eq!(checker.finalized_node_count().await, 3);
    }

    #[tokio::test]
    async fn test_finalized_root_follows_commits() {
        let checker = checker(
            StaticRoots::default()
                .with(BlockTag::Number(1), root_of(2))
                .with(BlockTag::Number(2), root_of(6)),
        );
        checker.initialize(&events(0..2)).await.unwrap();
        assert!(checker.check_finalized_root(BlockTag::Number(1)).await.unwrap());
        assert!(!checker.check_finalized_root(BlockTag::Number(2)).await.unwrap());

        let root = checker.put_finalized_events(&events(2..6)).await.unwrap();
        assert_eq!(root, root_of(6));
        assert!(checker.check_finalized_root(BlockTag::Number(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_finalized_event_is_rejected() {
        let checker = checker(StaticRoots::default());
        checker.initialize(&events(0..2)).await.unwrap();

        let err = checker.put_finalized_events(&events([1])).await.unwrap_err();
        assert!(matches!(err, IntegrityError::ReplayFailed { index: 1, node_count: 2 }));
    }

    #[tokio::test]
    async fn test_rejected_chunk_leaves_finalized_tree_untouched() {
        let checker = checker(StaticRoots::default());
        checker.initialize(&events(0..3)).await.unwrap();

        let err = checker
            .put_finalized_events(&events([3, 4, 6]))
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrityError::ReplayFailed { index: 6, node_count: 5 }));
        assert_eq!(checker.finalized_node_count().await, 3);
        assert_eq!(checker.finalized_root().await, root_of(3));

        let root = checker.put_finalized_events(&events(3..7)).await.unwrap();
        assert_eq!(root, root_of(7));
    }

    #[tokio::test]
    async fn test_missing_remote_root_is_a_provider_error() {
        let checker = checker(StaticRoots::default());
        let err = checker
            .check_finalized_root(BlockTag::Finalized)
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrityError::Provider(_)));
    }

    #[tokio::test]
    async fn test_initialize_replaces_previous_tree() {
        let checker = checker(StaticRoots::default());
        checker.initialize(&events(0..4)).await.unwrap();
        checker.initialize(&events(0..2)).await.unwrap();
        assert_eq!(checker.finalized_root().await, root_of(2));
    }
}
