//! Non-blocking retry-topic engine (C6, §4.6).

pub mod headers;
pub mod topology;

pub use headers::RetryHeaders;
pub use topology::{Backoff, RetryTopology, RetryTopologyConfig};
