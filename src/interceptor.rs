//! Record/batch interceptors (§6 external interfaces). Invoked strictly
//! between `beginTransaction` and the listener call when a transaction
//! manager is configured (S2), otherwise immediately before/after dispatch.

use async_trait::async_trait;

use crate::listener::BoxedListenerError;
use crate::record::{ConsumerRecord, ConsumerRecords};

#[async_trait]
pub trait RecordInterceptor: Send + Sync {
    /// Returning `None` means "skip this record" - it is neither dispatched
    /// to the listener nor acked.
    async fn intercept(&self, record: ConsumerRecord) -> Option<ConsumerRecord>;
    async fn success(&self, _record: &ConsumerRecord) {}
    async fn failure(&self, _record: &ConsumerRecord, _error: &BoxedListenerError) {}
}

#[async_trait]
pub trait BatchInterceptor: Send + Sync {
    async fn intercept(&self, records: ConsumerRecords) -> Option<ConsumerRecords>;
    async fn success(&self, _records: &ConsumerRecords) {}
    async fn failure(&self, _records: &ConsumerRecords, _error: &BoxedListenerError) {}
}

/// No-op interceptor used when an endpoint registers none of its own.
#[derive(Default)]
pub struct NoOpRecordInterceptor;

#[async_trait]
impl RecordInterceptor for NoOpRecordInterceptor {
    async fn intercept(&self, record: ConsumerRecord) -> Option<ConsumerRecord> {
        Some(record)
    }
}

#[derive(Default)]
pub struct NoOpBatchInterceptor;

#[async_trait]
impl BatchInterceptor for NoOpBatchInterceptor {
    async fn intercept(&self, records: ConsumerRecords) -> Option<ConsumerRecords> {
        Some(records)
    }
}
