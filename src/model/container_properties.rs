use std::time::Duration;

use super::ack_mode::{AckMode, AssignmentCommitOption};

/// What to subscribe to: explicit topic names, a regex pattern, or a fixed
/// set of partitions assigned up front (bypassing group rebalancing).
#[derive(Debug, Clone)]
pub enum Subscription {
    Topics(Vec<String>),
    Pattern(String),
    Assignment(Vec<crate::model::TopicPartition>),
}

/// Configuration snapshot frozen at container start. Nothing in here
/// changes for the lifetime of a single `SingleThreadedContainer` run;
/// a restart re-reads a (possibly new) `ContainerProperties`.
#[derive(Debug, Clone)]
pub struct ContainerProperties {
    pub subscription: Subscription,
    pub group_id: String,
    pub ack_mode: AckMode,
    pub poll_timeout: Duration,
    pub poll_timeout_while_paused: Duration,
    pub idle_event_interval: Option<Duration>,
    pub idle_before_data_multiplier: u32,
    pub idle_partition_event_interval: Option<Duration>,
    pub transactional: bool,
    pub commit_sync: bool,
    pub sync_commit_timeout: Duration,
    pub commit_retries: u32,
    pub auth_exception_retry_interval: Option<Duration>,
    pub no_poll_threshold: f64,
    pub monitor_interval: Duration,
    pub pause_immediate: bool,
    pub stop_immediate: bool,
    pub sub_batch_per_partition: bool,
    pub async_acks: bool,
    pub assignment_commit_option: AssignmentCommitOption,
    pub client_id_prefix: String,
    pub group_instance_id: Option<String>,
    pub shutdown_timeout: Duration,
    pub stop_container_when_fenced: bool,
    pub ack_count: u32,
    pub ack_time: Duration,
}

impl ContainerProperties {
    /// Construct properties for a plain topic subscription with the
    /// defaults the host project uses for its own consumers: `earliest`
    /// reset semantics live in `KafkaClientConfig`, not here - this struct
    /// is Kafka-client-library independent.
    pub fn new(group_id: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            subscription: Subscription::Topics(topics),
            group_id: group_id.into(),
            ack_mode: AckMode::Batch,
            poll_timeout: Duration::from_millis(5000),
            poll_timeout_while_paused: Duration::from_millis(1000),
            idle_event_interval: None,
            idle_before_data_multiplier: 5,
            idle_partition_event_interval: None,
            transactional: false,
            commit_sync: true,
            sync_commit_timeout: Duration::from_secs(5),
            commit_retries: 3,
            auth_exception_retry_interval: None,
            no_poll_threshold: 3.0,
            monitor_interval: Duration::from_secs(30),
            pause_immediate: false,
            stop_immediate: false,
            sub_batch_per_partition: false,
            async_acks: false,
            assignment_commit_option: AssignmentCommitOption::Never,
            client_id_prefix: String::new(),
            group_instance_id: None,
            shutdown_timeout: Duration::from_secs(10),
            stop_container_when_fenced: false,
            ack_count: 1,
            ack_time: Duration::from_millis(5000),
        }
    }
}
