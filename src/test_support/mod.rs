//! Test harness (C14): pure in-memory fakes for unit tests, plus a
//! `MockCluster`-backed helper for broker-level integration tests.

pub mod fake_consumer;
pub mod fake_producer;
pub mod mock_broker;

pub use fake_consumer::{FakeConsumer, FakeConsumerFactory};
pub use fake_producer::FakeProducer;
pub use mock_broker::create_mock_kafka;
