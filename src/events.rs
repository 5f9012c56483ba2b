//! Structured lifecycle events (C10). The container never logs lifecycle
//! transitions directly to `tracing` *and* expects a caller to separately
//! correlate them - it emits one of these through an injected `EventPublisher`,
//! and logs at `debug!`/`info!` alongside, so both structured consumers and
//! plain log tailing see the same transitions.

use std::time::SystemTime;

use crate::model::TopicPartition;

#[derive(Debug, Clone)]
pub enum ContainerEvent {
    Starting,
    Started,
    FailedToStart { reason: String },
    Idle { partitions: Vec<TopicPartition> },
    IdlePartition { partition: TopicPartition },
    NonResponsive { time_since_last_poll_ms: u64 },
    Stopped,
    ContainerStopped { cause: Option<String> },
    RebalanceAssigned { partitions: Vec<TopicPartition> },
    RebalanceRevoked { partitions: Vec<TopicPartition> },
    RebalanceLost { partitions: Vec<TopicPartition> },
}

/// `(source, container-id, timestamp, details)` per the wire shape in the
/// external-interfaces section: the event kind plus the container that
/// raised it and when.
#[derive(Debug, Clone)]
pub struct Event {
    pub container_id: String,
    pub timestamp: SystemTime,
    pub kind: ContainerEvent,
}

impl Event {
    pub fn new(container_id: impl Into<String>, kind: ContainerEvent) -> Self {
        Self {
            container_id: container_id.into(),
            timestamp: SystemTime::now(),
            kind,
        }
    }
}

/// Injected publisher. Must tolerate concurrent calls from multiple
/// containers - the default logs via `tracing` and is always safe to share.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: Event);
}

/// Default publisher: structured `tracing` events, one per container
/// lifecycle transition, at a level proportional to severity.
#[derive(Default)]
pub struct TracingEventPublisher;

impl EventPublisher for TracingEventPublisher {
    fn publish(&self, event: Event) {
        use tracing::{debug, error, info, warn};
        let id = &event.container_id;
        match &event.kind {
            ContainerEvent::Starting => info!(container_id = %id, "container starting"),
            ContainerEvent::Started => info!(container_id = %id, "container started"),
            ContainerEvent::FailedToStart { reason } => {
                error!(container_id = %id, reason, "container failed to start")
            }
            ContainerEvent::Idle { partitions } => {
                debug!(container_id = %id, ?partitions, "container idle")
            }
            ContainerEvent::IdlePartition { partition } => {
                debug!(container_id = %id, %partition, "partition idle")
            }
            ContainerEvent::NonResponsive {
                time_since_last_poll_ms,
            } => warn!(
                container_id = %id,
                time_since_last_poll_ms,
                "consumer appears non-responsive"
            ),
            ContainerEvent::Stopped => info!(container_id = %id, "container stopped"),
            ContainerEvent::ContainerStopped { cause } => {
                info!(container_id = %id, ?cause, "container stopped with cause")
            }
            ContainerEvent::RebalanceAssigned { partitions } => {
                info!(container_id = %id, ?partitions, "partitions assigned")
            }
            ContainerEvent::RebalanceRevoked { partitions } => {
                info!(container_id = %id, ?partitions, "partitions revoked")
            }
            ContainerEvent::RebalanceLost { partitions } => {
                warn!(container_id = %id, ?partitions, "partitions lost")
            }
        }
    }
}

/// Test/inspection publisher that just records every event it sees.
#[derive(Default)]
pub struct RecordingEventPublisher {
    events: std::sync::Mutex<Vec<Event>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl EventPublisher for RecordingEventPublisher {
    fn publish(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}
