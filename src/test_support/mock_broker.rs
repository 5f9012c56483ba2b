//! Broker-backed test harness (C14), mirroring the host project's
//! `common_kafka::test::create_mock_kafka`: spins up an in-process
//! `rdkafka::mocking::MockCluster` and a real `RdKafkaProducer` pointed at
//! it, for tests that need to exercise the actual wire path.

use rdkafka::mocking::MockCluster;
use rdkafka::producer::DefaultProducerContext;

use crate::client::RdKafkaProducer;
use crate::config::KafkaClientConfig;

pub fn create_mock_kafka() -> (MockCluster<'static, DefaultProducerContext>, RdKafkaProducer) {
    let cluster = MockCluster::new(1).expect("failed to create mock brokers");
    let config = KafkaClientConfig {
        bootstrap_servers: cluster.bootstrap_servers(),
        kafka_tls: false,
        statistics_interval_ms: 0,
        linger_ms: 0,
        queue_mib: 50,
        queue_messages: 1000,
        message_timeout_ms: 5000,
        compression_codec: "none".to_string(),
        session_timeout_ms: 6000,
        max_poll_interval_ms: 300_000,
        auto_offset_reset: "earliest".to_string(),
    };
    let producer = RdKafkaProducer::non_transactional(&config).expect("failed to create mocked producer");
    (cluster, producer)
}
