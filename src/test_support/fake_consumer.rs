//! In-memory `Consumer` fake (C14): lets the container, offset tracker, and
//! error-handler pipeline be exercised without a broker. Scripted via
//! `FakeConsumer::push_poll_result` so a test can stage exactly the poll
//! sequence a scenario needs.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::traits::{Consumer, ConsumerFactory, ConsumerGroupMetadata, PollOutcome, RebalanceEvent};
use crate::error::ContainerError;
use crate::model::{ContainerProperties, OffsetAndMetadata, TopicPartition};

#[derive(Default)]
pub struct FakeConsumer {
    scripted_polls: VecDeque<PollOutcome>,
    positions: HashMap<TopicPartition, i64>,
    committed: HashMap<TopicPartition, i64>,
    paused: std::collections::HashSet<TopicPartition>,
    assignment: Vec<TopicPartition>,
    /// Shared with whatever test constructed this consumer, so assertions
    /// can inspect commits/seeks after the consumer has been moved into a
    /// container's poll thread.
    commit_log: Arc<Mutex<Vec<(TopicPartition, i64)>>>,
    seek_log: Arc<Mutex<Vec<(TopicPartition, i64)>>>,
    reset_latest: bool,
}

impl FakeConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reset_latest(mut self) -> Self {
        self.reset_latest = true;
        self
    }

    pub fn push_poll_result(&mut self, outcome: PollOutcome) {
        self.scripted_polls.push_back(outcome);
    }

    pub fn push_assignment(&mut self, partitions: Vec<TopicPartition>) {
        self.assignment = partitions.clone();
        self.push_poll_result(PollOutcome {
            records: crate::record::ConsumerRecords::default(),
            rebalance: vec![RebalanceEvent::Assigned(partitions)],
        });
    }

    pub fn set_position(&mut self, tp: TopicPartition, offset: i64) {
        self.positions.insert(tp, offset);
    }

    /// A handle a test can hold onto after the consumer itself has been
    /// handed to a `FakeConsumerFactory`/container.
    pub fn commit_log_handle(&self) -> Arc<Mutex<Vec<(TopicPartition, i64)>>> {
        self.commit_log.clone()
    }

    pub fn seek_log_handle(&self) -> Arc<Mutex<Vec<(TopicPartition, i64)>>> {
        self.seek_log.clone()
    }
}

impl Consumer for FakeConsumer {
    fn subscribe(&mut self, _properties: &ContainerProperties) -> Result<(), ContainerError> {
        Ok(())
    }

    fn poll(&mut self, _timeout: Duration) -> Result<PollOutcome, ContainerError> {
        Ok(self.scripted_polls.pop_front().unwrap_or_default())
    }

    fn commit_sync(
        &mut self,
        offsets: &[(TopicPartition, OffsetAndMetadata)],
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        for (tp, o) in offsets {
            self.committed.insert(tp.clone(), o.offset);
            self.commit_log.lock().unwrap().push((tp.clone(), o.offset));
        }
        Ok(())
    }

    fn commit_async(&mut self, offsets: &[(TopicPartition, OffsetAndMetadata)]) -> Result<(), ContainerError> {
        self.commit_sync(offsets, Duration::ZERO)
    }

    fn seek(&mut self, partition: &TopicPartition, offset: i64) -> Result<(), ContainerError> {
        self.positions.insert(partition.clone(), offset);
        self.seek_log.lock().unwrap().push((partition.clone(), offset));
        Ok(())
    }

    fn seek_to_beginning(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError> {
        for tp in partitions {
            self.seek(tp, 0)?;
        }
        Ok(())
    }

    fn seek_to_end(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError> {
        for tp in partitions {
            self.seek(tp, i64::MAX)?;
        }
        Ok(())
    }

    fn position(&self, partition: &TopicPartition) -> Result<i64, ContainerError> {
        Ok(self.positions.get(partition).copied().unwrap_or(0))
    }

    fn committed(
        &self,
        partitions: &[TopicPartition],
        _timeout: Duration,
    ) -> Result<HashMap<TopicPartition, i64>, ContainerError> {
        Ok(partitions
            .iter()
            .filter_map(|tp| self.committed.get(tp).map(|o| (tp.clone(), *o)))
            .collect())
    }

    fn pause(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError> {
        self.paused.extend(partitions.iter().cloned());
        Ok(())
    }

    fn resume(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError> {
        for tp in partitions {
            self.paused.remove(tp);
        }
        Ok(())
    }

    fn assignment(&self) -> Vec<TopicPartition> {
        self.assignment.clone()
    }

    fn wakeup(&self) {}

    fn close(&mut self, _timeout: Duration) {}

    fn group_metadata(&self) -> Option<ConsumerGroupMetadata> {
        None
    }

    fn reset_policy_is_latest(&self) -> bool {
        self.reset_latest
    }
}

/// A `ConsumerFactory` that hands out one pre-scripted `FakeConsumer` and
/// then refuses further creation - containers under test never restart a
/// consumer mid-test.
pub struct FakeConsumerFactory {
    consumer: Mutex<Option<FakeConsumer>>,
}

impl FakeConsumerFactory {
    pub fn new(consumer: FakeConsumer) -> Self {
        Self {
            consumer: Mutex::new(Some(consumer)),
        }
    }
}

impl ConsumerFactory for FakeConsumerFactory {
    fn create(&self, _group_id: &str, _client_id_prefix: &str, _client_id_suffix: &str) -> Result<Box<dyn Consumer>, ContainerError> {
        self.consumer
            .lock()
            .unwrap()
            .take()
            .map(|c| -> Box<dyn Consumer> { Box::new(c) })
            .ok_or_else(|| ContainerError::Fatal("fake consumer already consumed".into()))
    }
}
