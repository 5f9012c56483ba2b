use rdkafka::error::KafkaError;
use thiserror::Error;

use crate::model::TopicPartition;

/// Errors surfaced by the poll loop and container lifecycle.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("failed to create consumer: {0}")]
    ConsumerCreation(#[source] KafkaError),

    #[error("kafka error on {partition}: {source}")]
    Kafka {
        partition: TopicPartition,
        #[source]
        source: KafkaError,
    },

    #[error("commit failed after {attempts} attempts: {source}")]
    CommitFailed {
        attempts: u32,
        #[source]
        source: KafkaError,
    },

    #[error("producer fenced while committing transaction")]
    Fenced,

    #[error("authentication/authorization failure: {0}")]
    Auth(#[source] KafkaError),

    #[error("fatal error in poll loop: {0}")]
    Fatal(String),

    #[error("onPartitionsAssigned handler failed: {0}")]
    AssignmentHandlerFailed(String),
}

/// Errors from the transactional/non-transactional producer factory (C4).
#[derive(Debug, Error)]
pub enum ProducerFactoryError {
    #[error("no free transactional-id suffix available after waiting {waited_ms}ms")]
    NoProducerAvailable { waited_ms: u64 },

    #[error("failed to create producer: {0}")]
    Creation(#[source] KafkaError),

    #[error("producer fenced; slot {prefix}-{suffix} invalidated")]
    Fenced { prefix: String, suffix: u64 },

    #[error("kafka error: {0}")]
    Kafka(#[source] KafkaError),
}

/// Errors from computing or publishing into a retry-topic chain (C6).
#[derive(Debug, Error)]
pub enum RetryTopologyError {
    #[error("max_attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    #[error("no destination configured for attempt {attempt} of topic {topic}")]
    NoDestinationForAttempt { topic: String, attempt: u32 },

    #[error("dead-letter publish failed: {0}")]
    DltPublishFailed(#[source] KafkaError),
}

/// Errors from the error-handler pipeline (C5).
#[derive(Debug, Error)]
pub enum ErrorHandlerError {
    #[error("after-rollback processor failed: {0}")]
    AfterRollbackFailed(String),

    #[error(transparent)]
    Retry(#[from] RetryTopologyError),
}
