//! The only module that talks `rdkafka` for the consumer side. Adapted from
//! the host project's `common_kafka::kafka_consumer::SingleTopicConsumer`,
//! generalized to arbitrary subscriptions and wired for manual rebalance
//! observation instead of auto-commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rdkafka::consumer::{
    BaseConsumer, Consumer as RdConsumer, ConsumerContext, Rebalance,
};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::topic_partition_list::TopicPartitionList;
use rdkafka::{ClientConfig, ClientContext, Offset as RdOffset};
use tracing::{debug, warn};

use crate::client::traits::{Consumer, ConsumerFactory, PollOutcome, RebalanceEvent};
use crate::config::KafkaClientConfig;
use crate::error::ContainerError;
use crate::model::{ContainerProperties, OffsetAndMetadata, Subscription, TopicPartition};
use crate::record::{ConsumerRecord, ConsumerRecords};

/// Shared between the `BaseConsumer` and its context: rebalances observed
/// during the most recent `poll()` call, drained by `RdKafkaConsumer::poll`
/// right after the underlying call returns.
#[derive(Default)]
struct RebalanceBuffer(Mutex<Vec<RebalanceEvent>>);

impl RebalanceBuffer {
    fn push(&self, event: RebalanceEvent) {
        self.0.lock().unwrap().push(event);
    }

    fn drain(&self) -> Vec<RebalanceEvent> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

struct ListenerContainerContext {
    buffer: Arc<RebalanceBuffer>,
}

impl ClientContext for ListenerContainerContext {}

impl ConsumerContext for ListenerContainerContext {
    fn pre_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Assign(tpl) => {
                debug!(?tpl, "pre_rebalance: assign");
            }
            Rebalance::Revoke(tpl) => {
                self.buffer.push(RebalanceEvent::Revoked(to_partitions(tpl)));
            }
            Rebalance::Error(e) => {
                warn!(error = %e, "rebalance error");
                self.buffer.push(RebalanceEvent::Lost(Vec::new()));
            }
        }
    }

    fn post_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        if let Rebalance::Assign(tpl) = rebalance {
            self.buffer.push(RebalanceEvent::Assigned(to_partitions(tpl)));
        }
    }
}

fn to_partitions(tpl: &TopicPartitionList) -> Vec<TopicPartition> {
    tpl.elements()
        .iter()
        .map(|e| TopicPartition::new(e.topic(), e.partition()))
        .collect()
}

fn to_consumer_record(msg: &BorrowedMessage<'_>) -> ConsumerRecord {
    let headers = msg
        .headers()
        .map(|h| {
            (0..h.count())
                .filter_map(|i| {
                    let header = h.get(i);
                    Some((header.key.to_string(), header.value?.to_vec()))
                })
                .collect()
        })
        .unwrap_or_default();
    ConsumerRecord {
        partition: TopicPartition::new(msg.topic(), msg.partition()),
        offset: msg.offset(),
        key: msg.key().map(|k| k.to_vec()),
        value: msg.payload().map(|v| v.to_vec()),
        headers,
        timestamp: msg
            .timestamp()
            .to_millis()
            .map(|ms| std::time::UNIX_EPOCH + Duration::from_millis(ms.max(0) as u64)),
    }
}

pub struct RdKafkaConsumer {
    inner: BaseConsumer<ListenerContainerContext>,
    buffer: Arc<RebalanceBuffer>,
    offset_reset_latest: bool,
}

impl RdKafkaConsumer {
    pub fn new(
        client_config: &KafkaClientConfig,
        group_id: &str,
        client_id: &str,
        group_instance_id: Option<&str>,
    ) -> Result<Self, ContainerError> {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &client_config.bootstrap_servers)
            .set("group.id", group_id)
            .set("client.id", client_id)
            .set("statistics.interval.ms", client_config.statistics_interval_ms.to_string())
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", &client_config.auto_offset_reset)
            .set("session.timeout.ms", client_config.session_timeout_ms.to_string())
            .set("max.poll.interval.ms", client_config.max_poll_interval_ms.to_string());

        if let Some(instance_id) = group_instance_id {
            config.set("group.instance.id", instance_id);
        }

        if client_config.kafka_tls {
            config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        }

        let buffer = Arc::new(RebalanceBuffer::default());
        let context = ListenerContainerContext {
            buffer: buffer.clone(),
        };

        let inner: BaseConsumer<ListenerContainerContext> = config
            .create_with_context(context)
            .map_err(ContainerError::ConsumerCreation)?;

        Ok(Self {
            inner,
            buffer,
            offset_reset_latest: client_config.auto_offset_reset == "latest",
        })
    }
}

impl Consumer for RdKafkaConsumer {
    fn subscribe(&mut self, properties: &ContainerProperties) -> Result<(), ContainerError> {
        match &properties.subscription {
            Subscription::Topics(topics) => {
                let refs: Vec<&str> = topics.iter().map(String::as_str).collect();
                self.inner
                    .subscribe(&refs)
                    .map_err(|e| ContainerError::Kafka {
                        partition: TopicPartition::new(topics.first().cloned().unwrap_or_default(), -1),
                        source: e,
                    })
            }
            Subscription::Pattern(pattern) => {
                let topic = format!("^{pattern}");
                self.inner
                    .subscribe(&[topic.as_str()])
                    .map_err(|e| ContainerError::Kafka {
                        partition: TopicPartition::new(pattern.clone(), -1),
                        source: e,
                    })
            }
            Subscription::Assignment(partitions) => {
                let mut tpl = TopicPartitionList::new();
                for tp in partitions {
                    tpl.add_partition(&tp.topic, tp.partition);
                }
                self.inner.assign(&tpl).map_err(|e| ContainerError::Kafka {
                    partition: partitions.first().cloned().unwrap_or(TopicPartition::new("", -1)),
                    source: e,
                })?;
                self.buffer.push(RebalanceEvent::Assigned(partitions.clone()));
                Ok(())
            }
        }
    }

    fn poll(&mut self, timeout: Duration) -> Result<PollOutcome, ContainerError> {
        let mut records = Vec::new();
        if let Some(result) = self.inner.poll(timeout) {
            match result {
                Ok(msg) => records.push(to_consumer_record(&msg)),
                Err(KafkaError::NoMessageReceived) => {}
                Err(e) => {
                    return Err(ContainerError::Kafka {
                        partition: TopicPartition::new("", -1),
                        source: e,
                    })
                }
            }
        }
        Ok(PollOutcome {
            records: ConsumerRecords { records },
            rebalance: self.buffer.drain(),
        })
    }

    fn commit_sync(
        &mut self,
        offsets: &[(TopicPartition, OffsetAndMetadata)],
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let tpl = to_tpl(offsets);
        self.inner
            .commit(&tpl, rdkafka::consumer::CommitMode::Sync)
            .map_err(|e| commit_error(offsets, e))
    }

    fn commit_async(
        &mut self,
        offsets: &[(TopicPartition, OffsetAndMetadata)],
    ) -> Result<(), ContainerError> {
        let tpl = to_tpl(offsets);
        self.inner
            .commit(&tpl, rdkafka::consumer::CommitMode::Async)
            .map_err(|e| commit_error(offsets, e))
    }

    fn seek(&mut self, partition: &TopicPartition, offset: i64) -> Result<(), ContainerError> {
        self.inner
            .seek(&partition.topic, partition.partition, RdOffset::Offset(offset), Duration::from_secs(5))
            .map_err(|e| ContainerError::Kafka {
                partition: partition.clone(),
                source: e,
            })
    }

    fn seek_to_beginning(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError> {
        for tp in partitions {
            self.inner
                .seek(&tp.topic, tp.partition, RdOffset::Beginning, Duration::from_secs(5))
                .map_err(|e| ContainerError::Kafka {
                    partition: tp.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }

    fn seek_to_end(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError> {
        for tp in partitions {
            self.inner
                .seek(&tp.topic, tp.partition, RdOffset::End, Duration::from_secs(5))
                .map_err(|e| ContainerError::Kafka {
                    partition: tp.clone(),
                    source: e,
                })?;
        }
        Ok(())
    }

    fn position(&self, partition: &TopicPartition) -> Result<i64, ContainerError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition(&partition.topic, partition.partition);
        let positions = self.inner.position().map_err(|e| ContainerError::Kafka {
            partition: partition.clone(),
            source: e,
        })?;
        for el in positions.elements() {
            if el.topic() == partition.topic && el.partition() == partition.partition {
                return match el.offset() {
                    RdOffset::Offset(o) => Ok(o),
                    _ => Ok(0),
                };
            }
        }
        Ok(0)
    }

    fn committed(
        &self,
        partitions: &[TopicPartition],
        timeout: Duration,
    ) -> Result<HashMap<TopicPartition, i64>, ContainerError> {
        let mut tpl = TopicPartitionList::new();
        for tp in partitions {
            tpl.add_partition(&tp.topic, tp.partition);
        }
        let committed = self
            .inner
            .committed_offsets(tpl, timeout)
            .map_err(|e| ContainerError::Kafka {
                partition: partitions.first().cloned().unwrap_or(TopicPartition::new("", -1)),
                source: e,
            })?;
        let mut out = HashMap::new();
        for el in committed.elements() {
            if let RdOffset::Offset(o) = el.offset() {
                out.insert(TopicPartition::new(el.topic(), el.partition()), o);
            }
        }
        Ok(out)
    }

    fn pause(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError> {
        let mut tpl = TopicPartitionList::new();
        for tp in partitions {
            tpl.add_partition(&tp.topic, tp.partition);
        }
        self.inner.pause(&tpl).map_err(|e| ContainerError::Kafka {
            partition: partitions.first().cloned().unwrap_or(TopicPartition::new("", -1)),
            source: e,
        })
    }

    fn resume(&mut self, partitions: &[TopicPartition]) -> Result<(), ContainerError> {
        let mut tpl = TopicPartitionList::new();
        for tp in partitions {
            tpl.add_partition(&tp.topic, tp.partition);
        }
        self.inner.resume(&tpl).map_err(|e| ContainerError::Kafka {
            partition: partitions.first().cloned().unwrap_or(TopicPartition::new("", -1)),
            source: e,
        })
    }

    fn assignment(&self) -> Vec<TopicPartition> {
        self.inner
            .assignment()
            .map(|tpl| to_partitions(&tpl))
            .unwrap_or_default()
    }

    fn wakeup(&self) {
        // BaseConsumer does not expose wakeup(); a poll with a short timeout
        // achieves the same "return promptly" effect during shutdown.
    }

    fn close(&mut self, _timeout: Duration) {
        self.inner.unsubscribe();
    }

    fn group_metadata(&self) -> Option<crate::client::traits::ConsumerGroupMetadata> {
        self.inner
            .group_metadata()
            .map(crate::client::traits::ConsumerGroupMetadata)
    }

    fn reset_policy_is_latest(&self) -> bool {
        self.offset_reset_latest
    }
}

/// Builds a fresh `RdKafkaConsumer` per container start, per the
/// `ConsumerFactory` contract: the core never reuses a closed consumer.
pub struct RdKafkaConsumerFactory {
    client_config: KafkaClientConfig,
    group_instance_id: Option<String>,
}

impl RdKafkaConsumerFactory {
    pub fn new(client_config: KafkaClientConfig, group_instance_id: Option<String>) -> Self {
        Self {
            client_config,
            group_instance_id,
        }
    }
}

impl ConsumerFactory for RdKafkaConsumerFactory {
    fn create(
        &self,
        group_id: &str,
        client_id_prefix: &str,
        client_id_suffix: &str,
    ) -> Result<Box<dyn Consumer>, ContainerError> {
        let client_id = format!("{client_id_prefix}-{client_id_suffix}");
        let consumer = RdKafkaConsumer::new(
            &self.client_config,
            group_id,
            &client_id,
            self.group_instance_id.as_deref(),
        )?;
        Ok(Box::new(consumer))
    }
}

fn to_tpl(offsets: &[(TopicPartition, OffsetAndMetadata)]) -> TopicPartitionList {
    let mut tpl = TopicPartitionList::new();
    for (tp, offset) in offsets {
        tpl.add_partition_offset(&tp.topic, tp.partition, RdOffset::Offset(offset.offset))
            .ok();
    }
    tpl
}

fn commit_error(offsets: &[(TopicPartition, OffsetAndMetadata)], e: KafkaError) -> ContainerError {
    ContainerError::Kafka {
        partition: offsets
            .first()
            .map(|(tp, _)| tp.clone())
            .unwrap_or(TopicPartition::new("", -1)),
        source: e,
    }
}
