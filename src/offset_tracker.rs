//! Offset tracker (C3): understands ack modes and gap handling, and is the
//! single source of truth for "what is safe to commit right now" per
//! partition. Confined to the poll thread - no internal locking.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::model::{OffsetAndMetadata, PartitionState, TopicPartition};

pub struct OffsetTracker {
    async_acks: bool,
    states: HashMap<TopicPartition, PartitionState>,
    /// Highest offset ever successfully committed per partition, kept across
    /// revoke/reassign so monotonicity can be asserted even after a
    /// partition bounces back to this container.
    committed: HashMap<TopicPartition, i64>,
}

impl OffsetTracker {
    pub fn new(async_acks: bool) -> Self {
        Self {
            async_acks,
            states: HashMap::new(),
            committed: HashMap::new(),
        }
    }

    pub fn on_partition_assigned(&mut self, tp: TopicPartition) {
        self.states.entry(tp).or_insert_with(PartitionState::new);
    }

    /// Called on `onPartitionsRevokedBeforeCommit`: returns the pending
    /// offset (if any) so the caller can attempt one last commit before the
    /// state is torn down.
    pub fn pending_commit_before_revoke(&self, tp: &TopicPartition) -> Option<OffsetAndMetadata> {
        self.states.get(tp).and_then(|s| s.pending_offset.clone())
    }

    /// Called on `onPartitionsRevokedAfterCommit` (or `onPartitionsLost`,
    /// which never commits): drops all in-memory state for `tp`. The
    /// committed watermark is retained so a later reassignment still sees
    /// monotonic history.
    pub fn drop_partition(&mut self, tp: &TopicPartition) {
        self.states.remove(tp);
    }

    pub fn record_delivery(&mut self, tp: &TopicPartition, offset: i64) {
        let state = self.states.entry(tp.clone()).or_insert_with(PartitionState::new);
        state.record_delivery(offset);
    }

    /// Acknowledge `offset` on `tp`. Returns `true` if the partition should
    /// remain (or become) paused because a gap precedes this offset.
    pub fn record_ack(&mut self, tp: &TopicPartition, offset: i64) -> bool {
        let state = self.states.entry(tp.clone()).or_insert_with(PartitionState::new);
        if !self.async_acks {
            // Sequential ack mode (RECORD/TIME/COUNT/...): no gap tracking,
            // the listener is assumed to ack in delivery order.
            state.in_flight.retain(|&o| o > offset);
            state.pending_offset = Some(OffsetAndMetadata::new(offset + 1));
            return false;
        }
        state.record_ack(offset);
        let gap_remains = state.advance_gap_free_prefix();
        if gap_remains {
            warn!(partition = %tp, offset, "gap remains in-flight; partition stays paused");
        }
        gap_remains
    }

    /// BATCH mode: commit the highest offset returned by the last poll for
    /// `tp`, unconditionally - gap tracking is bypassed entirely.
    pub fn record_batch_highest(&mut self, tp: &TopicPartition, highest_offset: i64) {
        let state = self.states.entry(tp.clone()).or_insert_with(PartitionState::new);
        state.pending_offset = Some(OffsetAndMetadata::new(highest_offset + 1));
        state.in_flight.clear();
        state.acked_in_batch.clear();
    }

    pub fn has_gap(&self, tp: &TopicPartition) -> bool {
        self.states.get(tp).map(|s| s.has_gap()).unwrap_or(false)
    }

    pub fn partitions_with_gap(&self) -> Vec<TopicPartition> {
        self.states
            .iter()
            .filter(|(_, s)| s.has_gap())
            .map(|(tp, _)| tp.clone())
            .collect()
    }

    /// Reconciles each partition's gap state against what was last
    /// communicated to the broker client, returning the partitions that now
    /// need `pause()`/`resume()` calls. Idempotent: a partition already
    /// marked `effectively_paused` for a gap is not returned again until its
    /// gap closes.
    pub fn sync_gap_pauses(&mut self) -> (Vec<TopicPartition>, Vec<TopicPartition>) {
        let mut to_pause = Vec::new();
        let mut to_resume = Vec::new();
        for (tp, state) in self.states.iter_mut() {
            let needs_pause = state.has_gap();
            if needs_pause && !state.effectively_paused {
                state.effectively_paused = true;
                to_pause.push(tp.clone());
            } else if !needs_pause && state.effectively_paused {
                state.effectively_paused = false;
                to_resume.push(tp.clone());
            }
        }
        (to_pause, to_resume)
    }

    /// Drain every partition's pending offset into a commit batch. Each
    /// partition's `pending_offset` is cleared once taken so a second call
    /// without intervening acks returns nothing for it.
    pub fn take_offsets_to_commit(&mut self) -> Vec<(TopicPartition, OffsetAndMetadata)> {
        let mut out = Vec::new();
        for (tp, state) in self.states.iter_mut() {
            if let Some(offset) = state.pending_offset.take() {
                out.push((tp.clone(), offset));
            }
        }
        out
    }

    /// Record that `offset` (next-offset form) has actually been committed
    /// to the broker. Panics in debug builds if this would move the
    /// watermark backwards - the offset tracker is the only thing allowed
    /// to issue commits, so a regression here is a bug in the caller.
    pub fn mark_committed(&mut self, tp: &TopicPartition, offset: i64) {
        let prev = self.committed.get(tp).copied();
        debug_assert!(
            prev.map_or(true, |p| offset >= p),
            "offset commit moved backwards for {tp}: {prev:?} -> {offset}"
        );
        debug!(partition = %tp, offset, "committed");
        self.committed.insert(tp.clone(), offset);
    }

    pub fn committed(&self, tp: &TopicPartition) -> Option<i64> {
        self.committed.get(tp).copied()
    }

    pub fn is_async_acks(&self) -> bool {
        self.async_acks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tp(p: i32) -> TopicPartition {
        TopicPartition::new("orders", p)
    }

    #[test]
    fn sequential_ack_advances_immediately() {
        let mut tracker = OffsetTracker::new(false);
        tracker.on_partition_assigned(tp(0));
        tracker.record_delivery(&tp(0), 5);
        let gap = tracker.record_ack(&tp(0), 5);
        assert!(!gap);
        let commits = tracker.take_offsets_to_commit();
        assert_eq!(commits, vec![(tp(0), OffsetAndMetadata::new(6))]);
    }

    #[test]
    fn async_acks_gap_blocks_commit_past_the_hole() {
        // S4: offsets 0..9 delivered, 0..4 and 6..9 acked, 5 deferred forever.
        let mut tracker = OffsetTracker::new(true);
        tracker.on_partition_assigned(tp(0));
        for o in 0..10 {
            tracker.record_delivery(&tp(0), o);
        }
        for o in (0..5).chain(6..10) {
            tracker.record_ack(&tp(0), o);
        }
        assert!(tracker.has_gap(&tp(0)));
        let commits = tracker.take_offsets_to_commit();
        assert_eq!(commits, vec![(tp(0), OffsetAndMetadata::new(5))]);

        // Acking the missing offset closes the gap and the rest can commit.
        let gap_remains = tracker.record_ack(&tp(0), 5);
        assert!(!gap_remains);
        assert!(!tracker.has_gap(&tp(0)));
        let commits = tracker.take_offsets_to_commit();
        assert_eq!(commits, vec![(tp(0), OffsetAndMetadata::new(10))]);
    }

    #[test]
    fn batch_mode_bypasses_gap_tracking() {
        let mut tracker = OffsetTracker::new(true);
        tracker.on_partition_assigned(tp(0));
        tracker.record_delivery(&tp(0), 0);
        tracker.record_delivery(&tp(0), 1);
        // Only offset 1 acked; BATCH mode still commits through the highest
        // offset returned by the poll, not the gap-free prefix.
        tracker.record_batch_highest(&tp(0), 1);
        let commits = tracker.take_offsets_to_commit();
        assert_eq!(commits, vec![(tp(0), OffsetAndMetadata::new(2))]);
        assert!(!tracker.has_gap(&tp(0)));
    }

    #[test]
    fn revoke_drops_in_flight_state_but_keeps_committed_watermark() {
        let mut tracker = OffsetTracker::new(true);
        tracker.on_partition_assigned(tp(0));
        tracker.record_delivery(&tp(0), 0);
        tracker.record_ack(&tp(0), 0);
        let pending = tracker.pending_commit_before_revoke(&tp(0));
        assert_eq!(pending, Some(OffsetAndMetadata::new(1)));
        tracker.mark_committed(&tp(0), 1);
        tracker.drop_partition(&tp(0));
        assert_eq!(tracker.committed(&tp(0)), Some(1));
        assert!(!tracker.has_gap(&tp(0)));
    }

    #[test]
    fn sync_gap_pauses_reports_pause_once_and_resume_when_gap_closes() {
        // S4: a gap should translate into exactly one pause request, and a
        // matching resume once the hole is filled - not a pause/resume per
        // poll iteration.
        let mut tracker = OffsetTracker::new(true);
        tracker.on_partition_assigned(tp(0));
        for o in 0..3 {
            tracker.record_delivery(&tp(0), o);
        }
        tracker.record_ack(&tp(0), 0);
        tracker.record_ack(&tp(0), 2);

        let (to_pause, to_resume) = tracker.sync_gap_pauses();
        assert_eq!(to_pause, vec![tp(0)]);
        assert!(to_resume.is_empty());

        // Already paused; nothing new to report while the gap persists.
        let (to_pause, to_resume) = tracker.sync_gap_pauses();
        assert!(to_pause.is_empty());
        assert!(to_resume.is_empty());

        tracker.record_ack(&tp(0), 1);
        let (to_pause, to_resume) = tracker.sync_gap_pauses();
        assert!(to_pause.is_empty());
        assert_eq!(to_resume, vec![tp(0)]);
    }

    #[test]
    #[should_panic(expected = "moved backwards")]
    fn commit_regression_panics_in_debug() {
        let mut tracker = OffsetTracker::new(false);
        tracker.mark_committed(&tp(0), 10);
        tracker.mark_committed(&tp(0), 9);
    }
}
