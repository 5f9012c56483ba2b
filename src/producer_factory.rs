//! Transactional producer factory (C4). Adapted from the host project's
//! `transaction::TransactionalProducer`/`KafkaTransaction` pair, generalized
//! from a single long-lived producer into a bounded cache keyed by
//! `(transactional_id_prefix, suffix)`.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::client::traits::{ConsumerGroupMetadata, Producer, ProducerRecord};
use crate::client::RdKafkaProducer;
use crate::config::KafkaClientConfig;
use crate::error::ProducerFactoryError;
use crate::model::{OffsetAndMetadata, TopicPartition};

/// How a caller's suffix is chosen from the bounded pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuffixStrategy {
    /// EOS-V2: deterministic mapping from `(group_id, topic, partition)` so
    /// the same logical work unit always reuses the same `transactional.id`.
    PerConsumerPartition,
    /// EOS-V1 (legacy): one suffix per originating thread.
    PerThread,
}

/// `(transactionalIdPrefix, suffix)` - the cache key. Two consumers in the
/// same group must never hold producers with the same suffix simultaneously.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProducerKey {
    pub prefix: String,
    pub suffix: u64,
}

impl ProducerKey {
    pub fn transactional_id(&self) -> String {
        format!("{}-{}", self.prefix, self.suffix)
    }
}

struct Slot {
    producer: Arc<dyn Producer>,
    in_use: bool,
}

struct Inner {
    slots: HashMap<ProducerKey, Slot>,
    free_suffixes: Vec<u64>,
}

/// Bounded cache of transactional producers. One instance is shared across
/// every single-threaded container in a concurrent group.
pub struct ProducerFactory {
    client_config: KafkaClientConfig,
    transactional_id_prefix: String,
    max_cache: u64,
    strategy: SuffixStrategy,
    max_age: Duration,
    inner: Mutex<Inner>,
    available: Condvar,
}

impl ProducerFactory {
    pub fn new(
        client_config: KafkaClientConfig,
        transactional_id_prefix: impl Into<String>,
        max_cache: u64,
        strategy: SuffixStrategy,
        max_age: Duration,
    ) -> Self {
        Self {
            client_config,
            transactional_id_prefix: transactional_id_prefix.into(),
            max_cache,
            strategy,
            max_age,
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                free_suffixes: (0..max_cache).collect(),
            }),
            available: Condvar::new(),
        }
    }

    /// Deterministic suffix for EOS-V2 group-aware fencing; `PerThread`
    /// ignores the arguments and is handled by the caller passing a
    /// thread-local suffix directly via `create_producer_for_suffix`.
    pub fn suffix_for(&self, group_id: &str, topic: &str, partition: i32) -> u64 {
        match self.strategy {
            SuffixStrategy::PerConsumerPartition => {
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                use std::hash::{Hash, Hasher};
                (group_id, topic, partition).hash(&mut hasher);
                hasher.finish() % self.max_cache.max(1)
            }
            SuffixStrategy::PerThread => {
                thread_suffix_hash() % self.max_cache.max(1)
            }
        }
    }

    /// Acquire or create the producer for `suffix`, blocking up to `max_age`
    /// if every slot is in use.
    pub fn create_producer(&self, suffix: u64) -> Result<Arc<dyn Producer>, ProducerFactoryError> {
        let key = ProducerKey {
            prefix: self.transactional_id_prefix.clone(),
            suffix,
        };
        let deadline = Instant::now() + self.max_age;
        let mut guard = self.inner.lock().unwrap();
        loop {
            if let Some(slot) = guard.slots.get_mut(&key) {
                if !slot.in_use {
                    slot.in_use = true;
                    return Ok(slot.producer.clone());
                }
            } else {
                let created = RdKafkaProducer::transactional(
                    &self.client_config,
                    &key.transactional_id(),
                    Duration::from_secs(10),
                )
                .map_err(|e| ProducerFactoryError::Creation(into_kafka_error(e)))?;
                let producer: Arc<dyn Producer> = Arc::new(created);
                guard.slots.insert(
                    key.clone(),
                    Slot {
                        producer: producer.clone(),
                        in_use: true,
                    },
                );
                guard.free_suffixes.retain(|s| *s != suffix);
                return Ok(producer);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ProducerFactoryError::NoProducerAvailable {
                    waited_ms: self.max_age.as_millis() as u64,
                });
            }
            let (g, timeout_result) = self
                .available
                .wait_timeout(guard, deadline - now)
                .unwrap();
            guard = g;
            if timeout_result.timed_out() {
                return Err(ProducerFactoryError::NoProducerAvailable {
                    waited_ms: self.max_age.as_millis() as u64,
                });
            }
        }
    }

    /// Release a slot back to the pool after a successful commit.
    pub fn release(&self, suffix: u64) {
        let key = ProducerKey {
            prefix: self.transactional_id_prefix.clone(),
            suffix,
        };
        let mut guard = self.inner.lock().unwrap();
        if let Some(slot) = guard.slots.get_mut(&key) {
            slot.in_use = false;
        }
        self.available.notify_one();
    }

    /// A producer fenced during commit must never be reused at its epoch;
    /// drop the slot entirely so the next `create_producer` call builds a
    /// fresh producer (new epoch) under the same transactional id.
    pub fn invalidate(&self, suffix: u64) {
        let key = ProducerKey {
            prefix: self.transactional_id_prefix.clone(),
            suffix,
        };
        warn!(transactional_id = %key.transactional_id(), "invalidating fenced producer slot");
        let mut guard = self.inner.lock().unwrap();
        guard.slots.remove(&key);
        guard.free_suffixes.push(suffix);
        self.available.notify_one();
    }
}

fn thread_suffix_hash() -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    hasher.finish()
}

/// One transactional poll-batch's worth of work: begin, send, commit offsets,
/// commit - or abort, with the producer returned to the factory's cache
/// either way. Grounded in the host project's `KafkaTransaction` helper.
pub struct KafkaTransaction<'a> {
    producer: Arc<dyn Producer>,
    factory: &'a ProducerFactory,
    suffix: u64,
    committed: bool,
}

impl<'a> KafkaTransaction<'a> {
    pub async fn begin(factory: &'a ProducerFactory, suffix: u64) -> Result<Self, ProducerFactoryError> {
        let producer = factory.create_producer(suffix)?;
        producer
            .begin_transaction()
            .await
            .map_err(|e| ProducerFactoryError::Kafka(into_kafka_error(e)))?;
        Ok(Self {
            producer,
            factory,
            suffix,
            committed: false,
        })
    }

    pub async fn send(&self, record: ProducerRecord) -> Result<(), ProducerFactoryError> {
        self.producer
            .send(record)
            .await
            .map_err(|e| ProducerFactoryError::Kafka(into_kafka_error(e)))
    }

    pub async fn commit(
        mut self,
        offsets: &[(TopicPartition, OffsetAndMetadata)],
        group_metadata: &ConsumerGroupMetadata,
    ) -> Result<(), ProducerFactoryError> {
        self.producer
            .send_offsets_to_transaction(offsets, group_metadata)
            .await
            .map_err(|_| ProducerFactoryError::Fenced {
                prefix: self.factory.transactional_id_prefix.clone(),
                suffix: self.suffix,
            })?;
        match self.producer.commit_transaction().await {
            Ok(()) => {
                debug!(suffix = self.suffix, "transaction committed");
                self.committed = true;
                self.factory.release(self.suffix);
                Ok(())
            }
            Err(e) => {
                self.factory.invalidate(self.suffix);
                self.committed = true;
                Err(ProducerFactoryError::Kafka(into_kafka_error(e)))
            }
        }
    }

    pub async fn abort(mut self) {
        drop(self.producer.abort_transaction().await);
        self.committed = true;
        self.factory.release(self.suffix);
    }
}

impl Drop for KafkaTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            // Caller dropped the handle without committing or aborting - the
            // producer is in an unknown state, so the slot is discarded
            // rather than risk reuse mid-transaction.
            self.factory.invalidate(self.suffix);
        }
    }
}

fn into_kafka_error(e: crate::error::ContainerError) -> rdkafka::error::KafkaError {
    match e {
        crate::error::ContainerError::Kafka { source, .. } => source,
        crate::error::ContainerError::CommitFailed { source, .. } => source,
        crate::error::ContainerError::ConsumerCreation(source) => source,
        crate::error::ContainerError::Auth(source) => source,
        _ => rdkafka::error::KafkaError::Canceled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> KafkaClientConfig {
        KafkaClientConfig::with_bootstrap_servers("localhost:9092")
    }

    #[test]
    fn per_consumer_partition_suffix_is_deterministic_and_bounded() {
        let factory = ProducerFactory::new(config(), "orders-group", 4, SuffixStrategy::PerConsumerPartition, Duration::from_secs(1));
        let a = factory.suffix_for("orders-group", "orders", 0);
        let b = factory.suffix_for("orders-group", "orders", 0);
        assert_eq!(a, b);
        assert!(a < 4);
    }

    #[test]
    fn different_partitions_usually_hash_to_different_suffixes() {
        let factory = ProducerFactory::new(config(), "orders-group", 16, SuffixStrategy::PerConsumerPartition, Duration::from_secs(1));
        let a = factory.suffix_for("orders-group", "orders", 0);
        let b = factory.suffix_for("orders-group", "orders", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn per_thread_suffix_is_stable_within_one_thread() {
        let factory = ProducerFactory::new(config(), "orders-group", 4, SuffixStrategy::PerThread, Duration::from_secs(1));
        let a = factory.suffix_for("ignored", "ignored", 0);
        let b = factory.suffix_for("ignored", "ignored", 0);
        assert_eq!(a, b);
        assert!(a < 4);
    }

    #[test]
    fn producer_key_formats_transactional_id_as_prefix_dash_suffix() {
        let key = ProducerKey {
            prefix: "orders-group".to_string(),
            suffix: 3,
        };
        assert_eq!(key.transactional_id(), "orders-group-3");
    }
}
