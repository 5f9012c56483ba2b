//! Core consumer-side runtime of a Kafka client integration framework: a
//! managed listener container that polls one or more consumers, dispatches
//! records to user code, coordinates offset commits under several
//! acknowledgment modes, and implements a non-blocking retry/dead-letter
//! pipeline built from auxiliary topics.
//!
//! Out of scope: annotation discovery and bean wiring, payload conversion,
//! administrative topic creation, metrics transport, and JAAS/security
//! wiring - these are external collaborators the registrar and consumer
//! factory are expected to supply.

pub mod ack;
pub mod client;
pub mod config;
pub mod container;
pub mod error;
pub mod error_handler;
pub mod events;
pub mod interceptor;
pub mod listener;
pub mod model;
pub mod offset_tracker;
pub mod producer_factory;
pub mod rebalance;
pub mod record;
pub mod registry;
pub mod retry;
pub mod seek;
pub mod test_support;

pub use ack::{AckSignal, Acknowledgment};
pub use client::{Consumer, ConsumerFactory, Producer, RdKafkaConsumer, RdKafkaConsumerFactory, RdKafkaProducer};
pub use config::KafkaClientConfig;
pub use container::{ConcurrentContainer, ContainerState, SingleThreadedContainer};
pub use error::{ContainerError, ErrorHandlerError, ProducerFactoryError, RetryTopologyError};
pub use error_handler::{Decision, ErrorClassifier, ErrorHandlerPipeline};
pub use events::{ContainerEvent, Event, EventPublisher, TracingEventPublisher};
pub use listener::{BatchListener, Dispatcher, Listener, ListenerContext, RecordListener};
pub use model::{AckMode, AssignmentCommitOption, ContainerProperties, TopicPartition};
pub use offset_tracker::OffsetTracker;
pub use producer_factory::{KafkaTransaction, ProducerFactory, ProducerKey, SuffixStrategy};
pub use rebalance::RebalanceListener;
pub use registry::ListenerEndpointRegistry;
pub use retry::{Backoff, RetryTopology, RetryTopologyConfig};
