//! Retry-topic headers (§6): client-agnostic in meaning, carried as plain
//! `(name, bytes)` pairs on `ConsumerRecord`/`ProducerRecord` - exact byte
//! representation is fixed here so every hop in the chain agrees on it.

pub const ORIGINAL_TOPIC: &str = "spring.kafka.original-topic";
pub const ORIGINAL_PARTITION: &str = "spring.kafka.original-partition";
pub const ORIGINAL_OFFSET: &str = "spring.kafka.original-offset";
pub const ORIGINAL_TIMESTAMP: &str = "spring.kafka.original-timestamp";
pub const ATTEMPTS: &str = "spring.kafka.attempts";
pub const EXCEPTION_FQCN: &str = "spring.kafka.exception-fqcn";
pub const EXCEPTION_STACKTRACE: &str = "spring.kafka.exception-stacktrace";
pub const BACKOFF_DEADLINE: &str = "spring.kafka.backoff-deadline";

/// The decoded retry-header set for one record, threaded along the chain.
#[derive(Debug, Clone)]
pub struct RetryHeaders {
    pub original_topic: String,
    pub original_partition: i32,
    pub original_offset: i64,
    pub original_timestamp_ms: i64,
    pub attempts: u32,
    pub exception_fqcn: String,
    pub exception_stacktrace: String,
    pub backoff_deadline_ms: i64,
}

impl RetryHeaders {
    pub fn to_header_pairs(&self) -> Vec<(String, Vec<u8>)> {
        vec![
            (ORIGINAL_TOPIC.to_string(), self.original_topic.as_bytes().to_vec()),
            (ORIGINAL_PARTITION.to_string(), self.original_partition.to_be_bytes().to_vec()),
            (ORIGINAL_OFFSET.to_string(), self.original_offset.to_be_bytes().to_vec()),
            (ORIGINAL_TIMESTAMP.to_string(), self.original_timestamp_ms.to_be_bytes().to_vec()),
            (ATTEMPTS.to_string(), self.attempts.to_be_bytes().to_vec()),
            (EXCEPTION_FQCN.to_string(), self.exception_fqcn.as_bytes().to_vec()),
            (EXCEPTION_STACKTRACE.to_string(), self.exception_stacktrace.as_bytes().to_vec()),
            (BACKOFF_DEADLINE.to_string(), self.backoff_deadline_ms.to_be_bytes().to_vec()),
        ]
    }

    pub fn from_header_pairs(headers: &[(String, Vec<u8>)]) -> Option<Self> {
        let get_str = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| String::from_utf8(v.clone()).ok())
        };
        let get_i32 = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.as_slice().try_into().ok())
                .map(i32::from_be_bytes)
        };
        let get_i64 = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.as_slice().try_into().ok())
                .map(i64::from_be_bytes)
        };
        let get_u32 = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| k == name)
                .and_then(|(_, v)| v.as_slice().try_into().ok())
                .map(u32::from_be_bytes)
        };

        Some(Self {
            original_topic: get_str(ORIGINAL_TOPIC)?,
            original_partition: get_i32(ORIGINAL_PARTITION)?,
            original_offset: get_i64(ORIGINAL_OFFSET)?,
            original_timestamp_ms: get_i64(ORIGINAL_TIMESTAMP)?,
            attempts: get_u32(ATTEMPTS)?,
            exception_fqcn: get_str(EXCEPTION_FQCN).unwrap_or_default(),
            exception_stacktrace: get_str(EXCEPTION_STACKTRACE).unwrap_or_default(),
            backoff_deadline_ms: get_i64(BACKOFF_DEADLINE).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_round_trip() {
        let headers = RetryHeaders {
            original_topic: "orders".to_string(),
            original_partition: 2,
            original_offset: 41,
            original_timestamp_ms: 1_700_000_000_000,
            attempts: 1,
            exception_fqcn: "IllegalStateException".to_string(),
            exception_stacktrace: "boom".to_string(),
            backoff_deadline_ms: 1_700_000_001_000,
        };
        let pairs = headers.to_header_pairs();
        let decoded = RetryHeaders::from_header_pairs(&pairs).unwrap();
        assert_eq!(decoded.original_topic, "orders");
        assert_eq!(decoded.original_partition, 2);
        assert_eq!(decoded.attempts, 1);
    }
}
