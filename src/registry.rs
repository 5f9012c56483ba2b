//! Container registry (C9): starts, stops, and pauses named containers,
//! binding each to an externally supplied endpoint descriptor rather than
//! discovering them by annotation scanning (that discovery step is out of
//! scope - see module docs on `lib.rs`).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::container::ConcurrentContainer;
use crate::error::ContainerError;

/// One registered endpoint: a name plus the concurrent container that
/// services it. The registrar (external collaborator) is responsible for
/// building the container with its listener, properties, and factories
/// already wired.
pub struct ListenerEndpointRegistry {
    containers: HashMap<String, Arc<ConcurrentContainer>>,
}

impl ListenerEndpointRegistry {
    pub fn new() -> Self {
        Self {
            containers: HashMap::new(),
        }
    }

    pub fn register(&mut self, id: impl Into<String>, container: Arc<ConcurrentContainer>) {
        let id = id.into();
        info!(endpoint = %id, "registering listener endpoint");
        self.containers.insert(id, container);
    }

    pub fn get(&self, id: &str) -> Option<Arc<ConcurrentContainer>> {
        self.containers.get(id).cloned()
    }

    pub async fn start(&self, id: &str) -> Result<(), ContainerError> {
        match self.containers.get(id) {
            Some(container) => container.start().await,
            None => Err(ContainerError::Fatal(format!("no endpoint registered for {id}"))),
        }
    }

    pub async fn start_all(&self) -> Result<(), ContainerError> {
        for (id, container) in &self.containers {
            if let Err(e) = container.start().await {
                warn!(endpoint = %id, error = %e, "endpoint failed to start");
                return Err(e);
            }
        }
        Ok(())
    }

    pub async fn stop(&self, id: &str, timeout: Duration) {
        if let Some(container) = self.containers.get(id) {
            container.stop(timeout).await;
        }
    }

    pub async fn stop_all(&self, timeout: Duration) {
        for container in self.containers.values() {
            container.stop(timeout).await;
        }
    }

    pub fn pause(&self, id: &str) {
        if let Some(container) = self.containers.get(id) {
            container.pause();
        }
    }

    pub fn resume(&self, id: &str) {
        if let Some(container) = self.containers.get(id) {
            container.resume();
        }
    }

    pub fn endpoint_ids(&self) -> Vec<String> {
        self.containers.keys().cloned().collect()
    }
}

impl Default for ListenerEndpointRegistry {
    fn default() -> Self {
        Self::new()
    }
}
