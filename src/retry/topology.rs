//! Retry-topic chain computation (C6, §4.6). Given a main topic and a
//! backoff/attempts/DLT declaration, builds the ordered `DestinationTopic`
//! chain the error handler routes failed records through.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::RetryTopologyError;
use crate::model::{DestinationKind, DestinationTopic, DltStrategy};

#[derive(Debug, Clone)]
pub enum Backoff {
    Fixed(Duration),
    Exponential { initial: Duration, multiplier: f64 },
    Custom(Vec<Duration>),
}

impl Backoff {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { initial, multiplier } => {
                let millis = initial.as_millis() as f64 * multiplier.powi(attempt as i32 - 1);
                Duration::from_millis(millis.round() as u64)
            }
            Backoff::Custom(delays) => delays
                .get((attempt as usize).saturating_sub(1))
                .copied()
                .unwrap_or_else(|| *delays.last().unwrap_or(&Duration::ZERO)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryTopologyConfig {
    pub main_topic: String,
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub dlt_strategy: DltStrategy,
    /// Collapse every retry hop into one reusable topic when the backoff is
    /// constant; the delay then comes from the `attempt` header, not topic
    /// identity.
    pub reusable_retry_topic: bool,
    pub timeout: Duration,
    pub num_partitions: i32,
    pub replicas: i32,
    /// Per-DLT exception-kind matching; empty set is the generic catch-all.
    pub dlt_matching_exceptions: HashSet<String>,
}

/// The computed chain for one main topic: `main` (attempt 0, not itself a
/// `DestinationTopic` entry) followed by `maxAttempts - 1` retry hops and a
/// terminal DLT (unless `NO_DLT`).
pub struct RetryTopology {
    main_topic: String,
    chain: Vec<DestinationTopic>,
}

impl RetryTopology {
    pub fn build(config: RetryTopologyConfig) -> Result<Self, RetryTopologyError> {
        if config.max_attempts < 1 {
            return Err(RetryTopologyError::InvalidMaxAttempts(config.max_attempts));
        }

        let mut chain = Vec::new();
        if config.reusable_retry_topic {
            if let Backoff::Fixed(delay) = &config.backoff {
                chain.push(DestinationTopic {
                    name: format!("{}-retry", config.main_topic),
                    suffix: "retry".to_string(),
                    kind: DestinationKind::ReusableRetry,
                    delay: *delay,
                    num_partitions: config.num_partitions,
                    replicas: config.replicas,
                    dlt_strategy: config.dlt_strategy,
                    timeout: config.timeout,
                    matching_exceptions: HashSet::new(),
                });
            } else {
                return Err(RetryTopologyError::InvalidMaxAttempts(config.max_attempts));
            }
        } else {
            for attempt in 1..config.max_attempts {
                let delay = config.backoff.delay_for_attempt(attempt);
                chain.push(DestinationTopic {
                    name: format!("{}-retry-{}", config.main_topic, delay.as_millis()),
                    suffix: format!("retry-{}", delay.as_millis()),
                    kind: DestinationKind::Retry,
                    delay,
                    num_partitions: config.num_partitions,
                    replicas: config.replicas,
                    dlt_strategy: config.dlt_strategy,
                    timeout: config.timeout,
                    matching_exceptions: HashSet::new(),
                });
            }
        }

        match config.dlt_strategy {
            DltStrategy::NoDlt => {}
            _ => chain.push(DestinationTopic {
                name: format!("{}-dlt", config.main_topic),
                suffix: "dlt".to_string(),
                kind: DestinationKind::Dlt,
                delay: Duration::ZERO,
                num_partitions: config.num_partitions,
                replicas: config.replicas,
                dlt_strategy: config.dlt_strategy,
                timeout: config.timeout,
                matching_exceptions: config.dlt_matching_exceptions,
            }),
        }

        Ok(Self {
            main_topic: config.main_topic,
            chain,
        })
    }

    pub fn main_topic(&self) -> &str {
        &self.main_topic
    }

    /// The destination a record entering its `attempt`-th retry (1-indexed,
    /// matching the `attempts` header after increment) should be published
    /// to. Returns `None` past the end of the chain.
    pub fn destination_for_attempt(&self, attempt: u32) -> Option<&DestinationTopic> {
        if attempt == 0 {
            return None;
        }
        self.chain.get((attempt - 1) as usize)
    }

    /// Classifier matching for the DLT (§4.6): the first `DestinationTopic`
    /// whose `matching_exceptions` contains `error_kind`, else the generic
    /// terminal destination.
    pub fn dlt_for(&self, error_kind: &str) -> Option<&DestinationTopic> {
        self.chain
            .iter()
            .find(|d| d.kind == DestinationKind::Dlt && d.matching_exceptions.contains(error_kind))
            .or_else(|| self.chain.iter().find(|d| d.is_terminal()))
    }

    pub fn chain(&self) -> &[DestinationTopic] {
        &self.chain
    }

    pub fn max_attempts(&self) -> u32 {
        // chain.len() retry hops plus the implicit main attempt, minus the
        // DLT entry if present.
        let retry_hops = self
            .chain
            .iter()
            .filter(|d| matches!(d.kind, DestinationKind::Retry | DestinationKind::ReusableRetry))
            .count() as u32;
        retry_hops + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RetryTopologyConfig {
        RetryTopologyConfig {
            main_topic: "orders".to_string(),
            max_attempts: 4,
            backoff: Backoff::Custom(vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ]),
            dlt_strategy: DltStrategy::FailOnError,
            reusable_retry_topic: false,
            timeout: Duration::from_secs(5),
            num_partitions: 1,
            replicas: 1,
            dlt_matching_exceptions: HashSet::new(),
        }
    }

    #[test]
    fn s3_chain_has_three_retries_and_a_dlt() {
        // S3: exponential 1000/2000/4000ms, maxAttempts=3 retry hops + DLT.
        let topology = RetryTopology::build(config()).unwrap();
        let names: Vec<&str> = topology.chain().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["orders-retry-1000", "orders-retry-2000", "orders-retry-4000", "orders-dlt"]
        );
        assert_eq!(topology.max_attempts(), 4);
        assert!(topology.destination_for_attempt(4).is_none());
        assert_eq!(topology.destination_for_attempt(1).unwrap().name, "orders-retry-1000");
    }

    #[test]
    fn no_dlt_leaves_last_retry_terminal() {
        let mut cfg = config();
        cfg.dlt_strategy = DltStrategy::NoDlt;
        let topology = RetryTopology::build(cfg).unwrap();
        assert_eq!(topology.chain().len(), 3);
        assert!(topology.chain().last().unwrap().is_terminal());
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let mut cfg = config();
        cfg.max_attempts = 0;
        assert!(matches!(
            RetryTopology::build(cfg),
            Err(RetryTopologyError::InvalidMaxAttempts(0))
        ));
    }
}
