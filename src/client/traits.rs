//! External interfaces (§6): a client-library-agnostic `Consumer`/`Producer`
//! pair the container drives. `RdKafkaConsumer`/`RdKafkaProducerFactory` in
//! this module's siblings are the only pieces that know about `rdkafka`;
//! everything above this layer (offset tracker, error handler, retry
//! topology, container) is written against these traits so it can be
//! exercised with in-memory fakes in unit tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ContainerError;
use crate::model::{ContainerProperties, OffsetAndMetadata, TopicPartition};
use crate::record::ConsumerRecords;

/// A rebalance observed synchronously during a `poll()` call - `rdkafka`
/// (like the underlying `librdkafka`) invokes rebalance callbacks inline,
/// on the polling thread, before `poll()` returns.
#[derive(Debug, Clone)]
pub enum RebalanceEvent {
    Assigned(Vec<TopicPartition>),
    Revoked(Vec<TopicPartition>),
    Lost(Vec<TopicPartition>),
}

/// Consumer group metadata snapshot, passed to `send_offsets_to_transaction`
/// to preserve group-aware EOS across the commit. Thin wrapper around
/// `rdkafka`'s own type rather than a fully client-agnostic encoding: unlike
/// the retry-topic headers (§6), group metadata has no stable wire format to
/// abstract over, so the core simply threads the client library's opaque
/// snapshot from consumer to producer.
pub struct ConsumerGroupMetadata(pub rdkafka::consumer::ConsumerGroupMetadata);

/// A poll outcome: the records returned plus any rebalance that happened
/// while fetching them.
#[derive(Debug, Clone, Default)]
pub struct PollOutcome {
    pub records: ConsumerRecords,
    pub rebalance: Vec<RebalanceEvent>,
}

/// Wire abstraction mirroring Kafka client semantics (§6). All methods are
/// synchronous/blocking by design: the container confines every call to its
/// single owning thread, which is exactly what a real `rdkafka::BaseConsumer`
/// requires.
pub trait Consumer: Send {
    fn subscribe(&mut self, properties: &ContainerProperties) -> Result<(), ContainerError>;
    fn poll(&mut self, timeout: Duration) -> Result<PollOutcome, ContainerError>;
    fn commit_sync(
        &mut self,
        offsets: &[(TopicPartition, OffsetAndMetadata)],
        timeout: Duration,
    ) -> Result<(), ContainerError>;
    fn commit_async(
        &mut self,
        offsets: &[(TopicPartition, OffsetAndMetadata)],
    ) -> Result<(), ContainerError>;
    fn seek(&mut self, partition: &TopicPartition, offset: i64) -> Result<(), ContainerError>;
    fn seek_to_beginning(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError>;
    fn seek_to_end(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError>;
    fn position(&self, partition: &TopicPartition) -> Result<i64, ContainerError>;
    fn committed(
        &self,
        partitions: &[TopicPartition],
        timeout: Duration,
    ) -> Result<HashMap<TopicPartition, i64>, ContainerError>;
    fn pause(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError>;
    fn resume(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError>;
    fn assignment(&self) -> Vec<TopicPartition>;
    fn wakeup(&self);
    fn close(&mut self, timeout: Duration);
    fn group_metadata(&self) -> Option<ConsumerGroupMetadata>;
    /// Whether the broker-side reset policy for this consumer is `latest`;
    /// used by the assignment-commit policy (§4.1).
    fn reset_policy_is_latest(&self) -> bool;
}

/// Creates consumers on demand. Called once per container start; the core
/// never reuses a closed consumer.
pub trait ConsumerFactory: Send + Sync {
    fn create(
        &self,
        group_id: &str,
        client_id_prefix: &str,
        client_id_suffix: &str,
    ) -> Result<Box<dyn Consumer>, ContainerError>;
}

/// A record to publish, independent of any particular producer client.
#[derive(Debug, Clone)]
pub struct ProducerRecord {
    pub topic: String,
    pub partition: Option<i32>,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Vec<(String, Vec<u8>)>,
}

#[async_trait]
pub trait Producer: Send + Sync {
    async fn begin_transaction(&self) -> Result<(), ContainerError>;
    async fn send(&self, record: ProducerRecord) -> Result<(), ContainerError>;
    async fn send_offsets_to_transaction(
        &self,
        offsets: &[(TopicPartition, OffsetAndMetadata)],
        group_metadata: &ConsumerGroupMetadata,
    ) -> Result<(), ContainerError>;
    async fn commit_transaction(&self) -> Result<(), ContainerError>;
    async fn abort_transaction(&self) -> Result<(), ContainerError>;
    async fn flush(&self, timeout: Duration) -> Result<(), ContainerError>;
    async fn close(&self, timeout: Duration);
}
