//! In-memory `Producer` fake (C14) for producer-factory and retry-topology
//! unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::traits::{ConsumerGroupMetadata, Producer, ProducerRecord};
use crate::error::ContainerError;
use crate::model::{OffsetAndMetadata, TopicPartition};

#[derive(Default)]
pub struct FakeProducer {
    pub sent: Mutex<Vec<ProducerRecord>>,
    pub transactions_begun: Mutex<u32>,
    pub transactions_committed: Mutex<u32>,
    pub transactions_aborted: Mutex<u32>,
}

impl FakeProducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_topics(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|r| r.topic.clone()).collect()
    }
}

#[async_trait]
impl Producer for FakeProducer {
    async fn begin_transaction(&self) -> Result<(), ContainerError> {
        *self.transactions_begun.lock().unwrap() += 1;
        Ok(())
    }

    async fn send(&self, record: ProducerRecord) -> Result<(), ContainerError> {
        self.sent.lock().unwrap().push(record);
        Ok(())
    }

    async fn send_offsets_to_transaction(
        &self,
        _offsets: &[(TopicPartition, OffsetAndMetadata)],
        _group_metadata: &ConsumerGroupMetadata,
    ) -> Result<(), ContainerError> {
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<(), ContainerError> {
        *self.transactions_committed.lock().unwrap() += 1;
        Ok(())
    }

    async fn abort_transaction(&self) -> Result<(), ContainerError> {
        *self.transactions_aborted.lock().unwrap() += 1;
        Ok(())
    }

    async fn flush(&self, _timeout: Duration) -> Result<(), ContainerError> {
        Ok(())
    }

    async fn close(&self, _timeout: Duration) {}
}
