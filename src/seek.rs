//! Consumer-seek callback (C1): lets user code issue relative/absolute/
//! timestamp seeks from any thread, deferred until the poll thread owns the
//! consumer again.

use std::sync::mpsc::{Receiver, Sender};

use crate::model::TopicPartition;

#[derive(Debug, Clone)]
pub enum SeekRequest {
    Absolute { partition: TopicPartition, offset: i64 },
    Relative { partition: TopicPartition, delta: i64 },
    ToBeginning { partition: TopicPartition },
    ToEnd { partition: TopicPartition },
    ToTimestamp { partition: TopicPartition, timestamp_ms: i64 },
}

/// Handed to listener code. Calling any method here never touches the
/// consumer directly - it just enqueues a request the poll thread drains on
/// its next iteration (see `SeekCallback::drain_into`).
#[derive(Clone)]
pub struct SeekCallback {
    sender: Sender<SeekRequest>,
}

impl SeekCallback {
    pub fn new() -> (Self, Receiver<SeekRequest>) {
        let (sender, receiver) = std::sync::mpsc::channel();
        (Self { sender }, receiver)
    }

    pub fn seek(&self, partition: TopicPartition, offset: i64) {
        drop(self.sender.send(SeekRequest::Absolute { partition, offset }));
    }

    pub fn seek_relative(&self, partition: TopicPartition, delta: i64) {
        drop(self.sender.send(SeekRequest::Relative { partition, delta }));
    }

    pub fn seek_to_beginning(&self, partition: TopicPartition) {
        drop(self.sender.send(SeekRequest::ToBeginning { partition }));
    }

    pub fn seek_to_end(&self, partition: TopicPartition) {
        drop(self.sender.send(SeekRequest::ToEnd { partition }));
    }

    pub fn seek_to_timestamp(&self, partition: TopicPartition, timestamp_ms: i64) {
        drop(self.sender.send(SeekRequest::ToTimestamp {
            partition,
            timestamp_ms,
        }));
    }
}

/// Drain every pending seek request from `receiver`, in FIFO order.
pub fn drain_pending(receiver: &Receiver<SeekRequest>) -> Vec<SeekRequest> {
    receiver.try_iter().collect()
}
