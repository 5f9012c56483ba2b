//! Rebalance listener (C1 cooperation, §4.7). The container wraps whatever
//! listener user code registers and guarantees the before-commit/after-commit
//! staging around `onPartitionsRevoked`; `onPartitionsLost` never commits.

use crate::model::TopicPartition;

/// User-facing rebalance hooks. Default bodies are no-ops so most listeners
/// only override what they need, mirroring the host project's pattern of
/// defaulted trait methods for optional callbacks.
pub trait RebalanceListener: Send + Sync {
    fn on_partitions_assigned(&self, _partitions: &[TopicPartition]) {}

    /// Invoked on the poll thread after the pre-commit callback returns but
    /// before the revoked partitions' offsets are committed. Returning
    /// offsets to commit here lets the listener override the default
    /// "commit everything pending" behavior; `None` uses the default.
    fn on_partitions_revoked_before_commit(&self, _partitions: &[TopicPartition]) {}

    /// Fires once the commit for the revoked partitions has been attempted,
    /// whether it succeeded or failed (the failure itself is delivered via
    /// an event, not through this callback).
    fn on_partitions_revoked_after_commit(&self, _partitions: &[TopicPartition]) {}

    /// Default behavior intentionally does *not* delegate to
    /// `on_partitions_revoked_before_commit`/`_after_commit`: by the time
    /// this fires the partitions are already gone from the group, so there
    /// is nothing left to commit. Implementations overriding this must not
    /// call the revoke callbacks themselves or double-invocation results.
    fn on_partitions_lost(&self, _partitions: &[TopicPartition]) {}
}

/// Default listener: logs and does nothing else.
#[derive(Default)]
pub struct NoOpRebalanceListener;

impl RebalanceListener for NoOpRebalanceListener {}
