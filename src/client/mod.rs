//! Client-library adapter layer. `traits` defines the `Consumer`/`Producer`
//! abstraction the rest of the crate is written against; the two `rdkafka_*`
//! modules are the only place that calls `rdkafka` directly.

pub mod rdkafka_consumer;
pub mod rdkafka_producer;
pub mod traits;

pub use rdkafka_consumer::{RdKafkaConsumer, RdKafkaConsumerFactory};
pub use rdkafka_producer::RdKafkaProducer;
pub use traits::{
    Consumer, ConsumerFactory, ConsumerGroupMetadata, PollOutcome, Producer, ProducerRecord,
    RebalanceEvent,
};
