use std::collections::VecDeque;
use std::time::Instant;

use super::topic_partition::OffsetAndMetadata;

/// Per-partition bookkeeping the container keeps for every partition it
/// currently (or recently) owns. Created on assignment, mutated only by the
/// poll thread, destroyed on revocation once any pending offset has been
/// committed.
#[derive(Debug, Clone)]
pub struct PartitionState {
    pub assigned: bool,
    /// User-requested pause. Survives revocation/reassignment: if the user
    /// paused a partition that later gets revoked and reassigned, it comes
    /// back paused.
    pub pause_requested: bool,
    /// Whether the pause has actually been communicated to the consumer.
    pub effectively_paused: bool,
    pub pending_offset: Option<OffsetAndMetadata>,
    /// Offsets delivered but not yet acked, oldest first. Only populated
    /// when `async_acks = true`.
    pub in_flight: VecDeque<i64>,
    /// Offsets acked so far in the current batch, used to find the gap-free
    /// prefix of `in_flight`.
    pub acked_in_batch: std::collections::BTreeSet<i64>,
    /// Backoff deadline for a retry-topic pause; `None` when not paused for
    /// backoff reasons.
    pub resume_at: Option<Instant>,
}

impl Default for PartitionState {
    fn default() -> Self {
        Self {
            assigned: true,
            pause_requested: false,
            effectively_paused: false,
            pending_offset: None,
            in_flight: VecDeque::new(),
            acked_in_batch: std::collections::BTreeSet::new(),
            resume_at: None,
        }
    }
}

impl PartitionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a record at `offset` has been delivered to the listener.
    pub fn record_delivery(&mut self, offset: i64) {
        self.in_flight.push_back(offset);
    }

    /// Record that `offset` has been acked.
    pub fn record_ack(&mut self, offset: i64) {
        self.acked_in_batch.insert(offset);
    }

    /// Advance `pending_offset` as far as the gap-free prefix of `in_flight`
    /// allows, dropping the acked prefix from `in_flight`. Returns `true`
    /// if a gap remains (i.e. the partition should stay paused).
    pub fn advance_gap_free_prefix(&mut self) -> bool {
        let mut advanced_to: Option<i64> = None;
        while let Some(&front) = self.in_flight.front() {
            if self.acked_in_batch.contains(&front) {
                self.in_flight.pop_front();
                self.acked_in_batch.remove(&front);
                advanced_to = Some(front);
            } else {
                break;
            }
        }
        if let Some(o) = advanced_to {
            self.pending_offset = Some(OffsetAndMetadata::new(o + 1));
        }
        !self.in_flight.is_empty()
    }

    pub fn has_gap(&self) -> bool {
        !self.in_flight.is_empty()
    }
}
