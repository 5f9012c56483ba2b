/// Determines when offsets move from "consumed" to "eligible to commit".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// Commit after every record.
    Record,
    /// Commit once at the end of each poll batch.
    Batch,
    /// Commit when `ack_time` has elapsed since the last commit.
    Time,
    /// Commit after `ack_count` records have been processed.
    Count,
    /// Commit on whichever of `ack_count`/`ack_time` triggers first.
    CountTime,
    /// Commit only when the listener's acknowledgment handle is invoked;
    /// the commit itself happens at the next poll-loop boundary.
    Manual,
    /// Commit directly from the acknowledgment handle, on the poll thread,
    /// as soon as the listener invokes it.
    ManualImmediate,
}

impl AckMode {
    /// `Manual` and `ManualImmediate` never auto-advance on listener return;
    /// the offset tracker only moves forward when a record/batch is acked.
    pub fn is_manual(self) -> bool {
        matches!(self, AckMode::Manual | AckMode::ManualImmediate)
    }

    /// `Batch` never tracks per-record gaps - it commits the highest
    /// offset returned by the last poll, regardless of ack order.
    pub fn bypasses_gap_tracking(self) -> bool {
        matches!(self, AckMode::Batch)
    }

    pub fn commits_immediately_from_ack_handle(self) -> bool {
        matches!(self, AckMode::ManualImmediate)
    }
}

/// Controls whether an initial offset is committed on first partition
/// assignment, ahead of any record being consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentCommitOption {
    /// Never commit on assignment.
    Never,
    /// Always commit `position(tp)` on first assignment.
    Always,
    /// Commit only when the broker reset policy is `latest` and no
    /// committed offset already exists, using a regular commit.
    LatestOnly,
    /// Same as `LatestOnly`, but the commit is issued outside any
    /// transaction even when the container is otherwise transactional.
    LatestOnlyNoTx,
}

impl AssignmentCommitOption {
    pub fn applies_only_to_latest_reset(self) -> bool {
        matches!(
            self,
            AssignmentCommitOption::LatestOnly | AssignmentCommitOption::LatestOnlyNoTx
        )
    }

    pub fn never_commits(self) -> bool {
        matches!(self, AssignmentCommitOption::Never)
    }

    pub fn commit_outside_transaction(self) -> bool {
        matches!(self, AssignmentCommitOption::LatestOnlyNoTx)
    }
}
