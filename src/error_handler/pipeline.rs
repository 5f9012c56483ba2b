//! Error handler pipeline (C5, §4.5): classify, track attempts, decide.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use std::time::Duration;

use crate::error_handler::classifier::ErrorClassifier;
use crate::listener::BoxedListenerError;
use crate::model::TopicPartition;
use crate::retry::{RetryHeaders, RetryTopology};

/// What the container does next after a listener error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing more can be done (no DLT configured to route to); commit/ack
    /// and proceed as if the record had succeeded.
    Handled,
    /// Seek the consumer back to the failing offset and abandon the batch.
    SeekAndRetry { partition: TopicPartition, offset: i64 },
    /// Retry budget not yet exhausted and `seeksAfterHandling=false`: keep
    /// the record buffered in memory and redeliver it after `delay` without
    /// seeking or touching the consumer's position.
    Retain {
        partition: TopicPartition,
        offset: i64,
        delay: Duration,
    },
    /// Publish to the next hop in the retry chain (or the DLT if exhausted).
    DeadLetter { topic: String },
    /// Unrecoverable; the container should stop.
    Fatal,
}

/// Default error-handler implementation (§4.5 steps 1-3).
pub struct ErrorHandlerPipeline {
    classifier: ErrorClassifier,
    retry_topology: Option<RetryTopology>,
    seeks_after_handling: bool,
    attempts: HashMap<(String, i32, i64), u32>,
}

impl ErrorHandlerPipeline {
    pub fn new(
        classifier: ErrorClassifier,
        retry_topology: Option<RetryTopology>,
        seeks_after_handling: bool,
    ) -> Self {
        Self {
            classifier,
            retry_topology,
            seeks_after_handling,
            attempts: HashMap::new(),
        }
    }

    /// Record a listener failure for `(tp, offset)` and decide what happens
    /// next. `error_kind` comes from `ListenerError::kind()`.
    pub fn handle(
        &mut self,
        tp: &TopicPartition,
        offset: i64,
        error: &BoxedListenerError,
    ) -> Decision {
        let key = (tp.topic.clone(), tp.partition, offset);
        let attempt = self.attempts.entry(key.clone()).or_insert(0);
        *attempt += 1;
        let attempt_count = *attempt;

        if !self.classifier.is_retryable(error.kind()) {
            debug!(partition = %tp, offset, kind = error.kind(), "error not classified as retryable");
            return self.route_to_dlt_or_fatal(error.kind(), tp, offset, &key);
        }

        let budget = self
            .retry_topology
            .as_ref()
            .map(|t| t.max_attempts())
            .unwrap_or(u32::MAX);

        if attempt_count < budget {
            if self.seeks_after_handling {
                warn!(partition = %tp, offset, attempt = attempt_count, "retrying via seek");
                Decision::SeekAndRetry {
                    partition: tp.clone(),
                    offset,
                }
            } else {
                let delay = self
                    .retry_topology
                    .as_ref()
                    .and_then(|t| t.destination_for_attempt(attempt_count))
                    .map(|d| d.delay)
                    .unwrap_or(Duration::ZERO);
                warn!(partition = %tp, offset, attempt = attempt_count, ?delay, "retaining record in memory for redelivery");
                Decision::Retain {
                    partition: tp.clone(),
                    offset,
                    delay,
                }
            }
        } else {
            self.attempts.remove(&key);
            self.route_to_dlt_or_fatal(error.kind(), tp, offset, &key)
        }
    }

    fn route_to_dlt_or_fatal(
        &mut self,
        error_kind: &str,
        tp: &TopicPartition,
        offset: i64,
        key: &(String, i32, i64),
    ) -> Decision {
        self.attempts.remove(key);
        match &self.retry_topology {
            Some(topology) => match topology.dlt_for(error_kind) {
                Some(dlt) => Decision::DeadLetter {
                    topic: dlt.name.clone(),
                },
                None => {
                    warn!(partition = %tp, offset, "no dlt configured; dropping");
                    Decision::Handled
                }
            },
            None => Decision::Handled,
        }
    }

    pub fn attempt_count(&self, tp: &TopicPartition, offset: i64) -> u32 {
        self.attempts
            .get(&(tp.topic.clone(), tp.partition, offset))
            .copied()
            .unwrap_or(0)
    }

    /// Build the retry headers for re-publishing a failed record to the
    /// next hop in the chain.
    pub fn build_retry_headers(
        &self,
        original: &TopicPartition,
        offset: i64,
        attempt: u32,
        error: &BoxedListenerError,
        backoff_deadline_ms: i64,
    ) -> RetryHeaders {
        RetryHeaders {
            original_topic: original.topic.clone(),
            original_partition: original.partition,
            original_offset: offset,
            original_timestamp_ms: now_millis(),
            attempts: attempt,
            exception_fqcn: error.kind().to_string(),
            exception_stacktrace: error.to_string(),
            backoff_deadline_ms,
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::GenericListenerError;
    use crate::model::DltStrategy;
    use crate::retry::{Backoff, RetryTopologyConfig};
    use std::collections::HashSet;
    use std::time::Duration;

    fn topology() -> RetryTopology {
        RetryTopology::build(RetryTopologyConfig {
            main_topic: "orders".to_string(),
            max_attempts: 3,
            backoff: Backoff::Fixed(Duration::from_millis(500)),
            dlt_strategy: DltStrategy::FailOnError,
            reusable_retry_topic: false,
            timeout: Duration::from_secs(5),
            num_partitions: 1,
            replicas: 1,
            dlt_matching_exceptions: HashSet::new(),
        })
        .unwrap()
    }

    fn err() -> BoxedListenerError {
        Box::new(GenericListenerError::new("IllegalStateException", "boom"))
    }

    #[test]
    fn retries_until_budget_exhausted_then_routes_to_dlt() {
        let classifier = ErrorClassifier::allow_list(["IllegalStateException"]);
        let mut pipeline = ErrorHandlerPipeline::new(classifier, Some(topology()), false);
        let tp = TopicPartition::new("orders", 0);

        assert_eq!(
            pipeline.handle(&tp, 10, &err()),
            Decision::Retain {
                partition: tp.clone(),
                offset: 10,
                delay: Duration::from_millis(500),
            }
        );
        assert_eq!(
            pipeline.handle(&tp, 10, &err()),
            Decision::Retain {
                partition: tp.clone(),
                offset: 10,
                delay: Duration::from_millis(500),
            }
        );
        assert_eq!(
            pipeline.handle(&tp, 10, &err()),
            Decision::DeadLetter {
                topic: "orders-dlt".to_string()
            }
        );
    }

    #[test]
    fn unclassified_error_routes_straight_to_dlt() {
        let classifier = ErrorClassifier::allow_list(["SomeOtherError"]);
        let mut pipeline = ErrorHandlerPipeline::new(classifier, Some(topology()), false);
        let tp = TopicPartition::new("orders", 0);
        assert_eq!(
            pipeline.handle(&tp, 1, &err()),
            Decision::DeadLetter {
                topic: "orders-dlt".to_string()
            }
        );
    }

    #[test]
    fn seeks_after_handling_seeks_instead_of_committing() {
        let classifier = ErrorClassifier::allow_list(["IllegalStateException"]);
        let mut pipeline = ErrorHandlerPipeline::new(classifier, Some(topology()), true);
        let tp = TopicPartition::new("orders", 1);
        assert_eq!(
            pipeline.handle(&tp, 5, &err()),
            Decision::SeekAndRetry {
                partition: tp,
                offset: 5
            }
        );
    }
}
