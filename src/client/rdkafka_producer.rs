//! Adapted from the host project's `common_kafka::transaction` module: a
//! `FutureProducer` wrapped with transactional-id configuration and the
//! begin/commit/abort lifecycle, generalized behind the `Producer` trait.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer as RdProducer};
use rdkafka::ClientConfig;
use tracing::debug;

use crate::client::traits::{ConsumerGroupMetadata, Producer, ProducerRecord};
use crate::config::KafkaClientConfig;
use crate::error::ContainerError;
use crate::model::{OffsetAndMetadata, TopicPartition};

pub struct RdKafkaProducer {
    inner: FutureProducer,
    send_timeout: Duration,
}

impl RdKafkaProducer {
    pub fn non_transactional(client_config: &KafkaClientConfig) -> Result<Self, ContainerError> {
        let config = base_client_config(client_config);
        let inner: FutureProducer = config.create().map_err(kafka_err)?;
        Ok(Self {
            inner,
            send_timeout: Duration::from_millis(client_config.message_timeout_ms as u64),
        })
    }

    pub fn transactional(
        client_config: &KafkaClientConfig,
        transactional_id: &str,
        init_timeout: Duration,
    ) -> Result<Self, ContainerError> {
        let mut config = base_client_config(client_config);
        config.set("transactional.id", transactional_id);
        debug!(transactional_id, "creating transactional producer");
        let inner: FutureProducer = config.create().map_err(kafka_err)?;
        inner.init_transactions(init_timeout).map_err(kafka_err)?;
        Ok(Self {
            inner,
            send_timeout: Duration::from_millis(client_config.message_timeout_ms as u64),
        })
    }
}

fn base_client_config(client_config: &KafkaClientConfig) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", &client_config.bootstrap_servers)
        .set("statistics.interval.ms", client_config.statistics_interval_ms.to_string())
        .set("linger.ms", client_config.linger_ms.to_string())
        .set("message.timeout.ms", client_config.message_timeout_ms.to_string())
        .set("compression.codec", &client_config.compression_codec)
        .set("queue.buffering.max.kbytes", (client_config.queue_mib * 1024).to_string())
        .set("queue.buffering.max.messages", client_config.queue_messages.to_string());
    if client_config.kafka_tls {
        config
            .set("security.protocol", "ssl")
            .set("enable.ssl.certificate.verification", "false");
    }
    config
}

fn kafka_err(e: KafkaError) -> ContainerError {
    ContainerError::Kafka {
        partition: TopicPartition::new("", -1),
        source: e,
    }
}

#[async_trait]
impl Producer for RdKafkaProducer {
    async fn begin_transaction(&self) -> Result<(), ContainerError> {
        self.inner.begin_transaction().map_err(kafka_err)
    }

    async fn send(&self, record: ProducerRecord) -> Result<(), ContainerError> {
        let mut future_record = FutureRecord::to(&record.topic);
        if let Some(key) = record.key.as_deref() {
            future_record = future_record.key(key);
        }
        if let Some(value) = record.value.as_deref() {
            future_record = future_record.payload(value);
        }
        if let Some(partition) = record.partition {
            future_record = future_record.partition(partition);
        }
        if !record.headers.is_empty() {
            let mut headers = rdkafka::message::OwnedHeaders::new();
            for (k, v) in &record.headers {
                headers = headers.insert(rdkafka::message::Header {
                    key: k.as_str(),
                    value: Some(v.as_slice()),
                });
            }
            future_record = future_record.headers(headers);
        }

        match self.inner.send(future_record, self.send_timeout).await {
            Ok(_) => Ok(()),
            Err((e, _)) => Err(kafka_err(e)),
        }
    }

    async fn send_offsets_to_transaction(
        &self,
        offsets: &[(TopicPartition, OffsetAndMetadata)],
        group_metadata: &ConsumerGroupMetadata,
    ) -> Result<(), ContainerError> {
        let mut tpl = rdkafka::TopicPartitionList::new();
        for (tp, offset) in offsets {
            tpl.add_partition_offset(&tp.topic, tp.partition, rdkafka::Offset::Offset(offset.offset))
                .ok();
        }
        self.inner
            .send_offsets_to_transaction(&tpl, &group_metadata.0, Duration::from_secs(10))
            .map_err(kafka_err)
    }

    async fn commit_transaction(&self) -> Result<(), ContainerError> {
        self.inner
            .commit_transaction(Duration::from_secs(10))
            .map_err(kafka_err)
    }

    async fn abort_transaction(&self) -> Result<(), ContainerError> {
        self.inner
            .abort_transaction(Duration::from_secs(10))
            .map_err(kafka_err)
    }

    async fn flush(&self, timeout: Duration) -> Result<(), ContainerError> {
        self.inner.flush(timeout).map_err(kafka_err)
    }

    async fn close(&self, timeout: Duration) {
        drop(self.inner.flush(timeout));
    }
}
