//! Acknowledgment handle (C2): the per-record token manual-ack listeners use
//! to tell the container a record succeeded, failed, or should be retried
//! without blocking the poll thread.

use tokio::sync::mpsc::UnboundedSender;

use crate::model::TopicPartition;

/// What an acknowledgment resolves to. The poll thread drains these the
/// same way it drains pause/resume/seek commands.
#[derive(Debug, Clone)]
pub enum AckSignal {
    Ack { partition: TopicPartition, offset: i64 },
    Nack { partition: TopicPartition, offset: i64, reason: String },
}

/// A handle to manually acknowledge one record. Cloneable so it can be
/// moved into async listener code; every clone shares the same underlying
/// channel back to the owning container.
#[derive(Clone)]
pub struct Acknowledgment {
    partition: TopicPartition,
    offset: i64,
    sender: UnboundedSender<AckSignal>,
    immediate: Option<UnboundedSender<AckSignal>>,
}

impl Acknowledgment {
    pub fn new(
        partition: TopicPartition,
        offset: i64,
        sender: UnboundedSender<AckSignal>,
        manual_immediate: bool,
    ) -> Self {
        Self {
            partition,
            offset,
            immediate: manual_immediate.then(|| sender.clone()),
            sender,
        }
    }

    pub fn partition(&self) -> &TopicPartition {
        &self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Whether this handle commits synchronously on the poll thread
    /// (`MANUAL_IMMEDIATE`) rather than being deferred to the next poll
    /// boundary (`MANUAL`).
    pub fn is_immediate(&self) -> bool {
        self.immediate.is_some()
    }

    pub fn ack(&self) {
        drop(self.sender.send(AckSignal::Ack {
            partition: self.partition.clone(),
            offset: self.offset,
        }));
    }

    pub fn nack(&self, reason: impl Into<String>) {
        drop(self.sender.send(AckSignal::Nack {
            partition: self.partition.clone(),
            offset: self.offset,
            reason: reason.into(),
        }));
    }
}
