//! The record shape handed to listeners and interceptors. Deliberately
//! independent of `rdkafka::message::BorrowedMessage`'s lifetime-bound
//! representation: by the time a record reaches user code it has been
//! copied out of the client library's internal buffers, since the listener
//! may run on a different task than the poll thread that produced it.

use std::time::SystemTime;

use crate::model::TopicPartition;

#[derive(Debug, Clone)]
pub struct ConsumerRecord {
    pub partition: TopicPartition,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    /// `None` represents a record whose payload could not be decoded -
    /// see `SerializationError` in the error taxonomy. The
    /// `deserialization-exception` header carries the failure detail.
    pub value: Option<Vec<u8>>,
    pub headers: Vec<(String, Vec<u8>)>,
    pub timestamp: Option<SystemTime>,
}

impl ConsumerRecord {
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn is_poison_pill(&self) -> bool {
        self.value.is_none()
    }
}

/// A batch of records as returned by one poll, grouped in delivery order.
#[derive(Debug, Clone, Default)]
pub struct ConsumerRecords {
    pub records: Vec<ConsumerRecord>,
}

impl ConsumerRecords {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Group by partition, preserving the relative (per-partition) order
    /// records were returned in - used for `sub_batch_per_partition`.
    pub fn by_partition(&self) -> Vec<(TopicPartition, Vec<&ConsumerRecord>)> {
        let mut order: Vec<TopicPartition> = Vec::new();
        let mut groups: std::collections::HashMap<TopicPartition, Vec<&ConsumerRecord>> =
            std::collections::HashMap::new();
        for record in &self.records {
            groups
                .entry(record.partition.clone())
                .or_insert_with(|| {
                    order.push(record.partition.clone());
                    Vec::new()
                })
                .push(record);
        }
        order
            .into_iter()
            .map(|tp| {
                let records = groups.remove(&tp).unwrap_or_default();
                (tp, records)
            })
            .collect()
    }
}
