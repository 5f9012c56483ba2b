//! Concurrent container (C8, §4.2): a façade over N independent
//! single-threaded containers sharing one `ContainerProperties` and consumer
//! factory. Concurrency is clamped to the partition count when it is known
//! statically (explicit assignment).

use std::sync::Arc;
use std::time::Duration;

use crate::client::traits::ConsumerFactory;
use crate::container::single::{ContainerState, SingleThreadedContainer};
use crate::error::ContainerError;
use crate::error_handler::ErrorHandlerPipeline;
use crate::events::EventPublisher;
use crate::listener::Listener;
use crate::model::{ContainerProperties, Subscription, TopicPartition};
use crate::producer_factory::ProducerFactory;
use crate::rebalance::RebalanceListener;

/// Supervises `concurrency` children named `<id>-0` .. `<id>-(N-1)`.
/// `Listener`/`ErrorHandlerPipeline` are not `Clone`, so the caller supplies
/// a factory closure invoked once per child.
pub struct ConcurrentContainer {
    id: String,
    children: Vec<SingleThreadedContainer>,
}

impl ConcurrentContainer {
    pub fn new(
        id: impl Into<String>,
        concurrency: u32,
        properties: ContainerProperties,
        consumer_factory: Arc<dyn ConsumerFactory>,
        mut make_listener: impl FnMut() -> Listener,
        mut make_error_handler: impl FnMut() -> ErrorHandlerPipeline,
    ) -> Self {
        let id = id.into();
        let concurrency = clamp_concurrency(concurrency, &properties);
        let mut children = Vec::with_capacity(concurrency as usize);
        for i in 0..concurrency {
            let child_id = format!("{id}-{i}");
            let mut child_properties = properties.clone();
            child_properties.client_id_prefix = format!("{}-{i}", properties.client_id_prefix);
            children.push(SingleThreadedContainer::new(
                child_id,
                child_properties,
                consumer_factory.clone(),
                make_listener(),
                make_error_handler(),
            ));
        }
        Self { id, children }
    }

    pub fn with_rebalance_listener(mut self, listener: Arc<dyn RebalanceListener>) -> Self {
        self.children = self
            .children
            .into_iter()
            .map(|c| c.with_rebalance_listener(listener.clone()))
            .collect();
        self
    }

    pub fn with_event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.children = self
            .children
            .into_iter()
            .map(|c| c.with_event_publisher(publisher.clone()))
            .collect();
        self
    }

    pub fn with_producer_factory(mut self, factory: Arc<ProducerFactory>) -> Self {
        self.children = self
            .children
            .into_iter()
            .map(|c| c.with_producer_factory(factory.clone()))
            .collect();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn start(&self) -> Result<(), ContainerError> {
        for child in &self.children {
            child.start().await?;
        }
        Ok(())
    }

    pub async fn stop(&self, timeout: Duration) {
        for child in &self.children {
            child.stop(timeout).await;
        }
    }

    pub fn pause(&self) {
        for child in &self.children {
            child.pause();
        }
    }

    pub fn resume(&self) {
        for child in &self.children {
            child.resume();
        }
    }

    pub fn states(&self) -> Vec<ContainerState> {
        self.children.iter().map(|c| c.state()).collect()
    }

    /// Union of every child's live assignment, as published by its poll
    /// thread on the most recent rebalance (§4.2).
    pub fn assigned_partitions(&self) -> Vec<TopicPartition> {
        let mut seen = std::collections::HashSet::new();
        self.children
            .iter()
            .flat_map(|c| c.assignment())
            .filter(|tp| seen.insert(tp.clone()))
            .collect()
    }
}

fn clamp_concurrency(requested: u32, properties: &ContainerProperties) -> u32 {
    match &properties.subscription {
        Subscription::Assignment(partitions) => requested.min(partitions.len().max(1) as u32),
        _ => requested,
    }
    .max(1)
}
