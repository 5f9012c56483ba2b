use std::collections::HashSet;
use std::time::Duration;

/// What role a topic plays in a retry chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Main,
    Retry,
    ReusableRetry,
    Dlt,
    NoOps,
}

/// What happens when publication to a DLT itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DltStrategy {
    /// Propagate the publish failure and stop the container.
    FailOnError,
    /// Loop back into the retry chain instead of propagating.
    AlwaysRetryOnError,
    /// There is no DLT; the last retry hop is terminal (silent drop + log).
    NoDlt,
}

/// One hop in a retry chain: the main topic, one of its retry topics, or
/// the terminal dead-letter topic.
#[derive(Debug, Clone)]
pub struct DestinationTopic {
    pub name: String,
    pub suffix: String,
    pub kind: DestinationKind,
    pub delay: Duration,
    pub num_partitions: i32,
    pub replicas: i32,
    pub dlt_strategy: DltStrategy,
    pub timeout: Duration,
    /// Exception kinds this destination is restricted to matching for DLT
    /// routing purposes. Empty means "the generic catch-all".
    pub matching_exceptions: HashSet<String>,
}

impl DestinationTopic {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, DestinationKind::Dlt | DestinationKind::NoOps)
    }
}
