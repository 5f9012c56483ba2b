//! Broker-connectivity configuration (§4.8, C11). `ContainerProperties` (§3)
//! stays Kafka-library-independent; `KafkaClientConfig` is the layer the
//! consumer/producer factories consult to materialize an `rdkafka::ClientConfig`.
//! Modeled on the host project's per-concern `envconfig::Envconfig` structs.

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct KafkaClientConfig {
    #[envconfig(default = "localhost:9092")]
    pub bootstrap_servers: String,

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "10000")]
    pub statistics_interval_ms: u32,

    #[envconfig(default = "20")]
    pub linger_ms: u32,

    #[envconfig(default = "400")]
    pub queue_mib: u32,

    #[envconfig(default = "10000000")]
    pub queue_messages: u32,

    #[envconfig(default = "20000")]
    pub message_timeout_ms: u32,

    #[envconfig(default = "none")]
    pub compression_codec: String,

    #[envconfig(default = "10000")]
    pub session_timeout_ms: u32,

    #[envconfig(default = "300000")]
    pub max_poll_interval_ms: u32,

    #[envconfig(default = "earliest")]
    pub auto_offset_reset: String,
}

impl KafkaClientConfig {
    /// Convenience constructor for tests and embedders that don't want to
    /// thread the process environment through `envconfig`.
    pub fn with_bootstrap_servers(bootstrap_servers: impl Into<String>) -> Self {
        Self {
            bootstrap_servers: bootstrap_servers.into(),
            kafka_tls: false,
            statistics_interval_ms: 10_000,
            linger_ms: 20,
            queue_mib: 400,
            queue_messages: 10_000_000,
            message_timeout_ms: 20_000,
            compression_codec: "none".to_string(),
            session_timeout_ms: 10_000,
            max_poll_interval_ms: 300_000,
            auto_offset_reset: "earliest".to_string(),
        }
    }
}
