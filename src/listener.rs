//! Listener dispatch (§9 design notes): rather than reflecting over method
//! parameters the way the source does, the container computes an explicit
//! binding once at start - here, just the `Dispatcher` variant and the
//! `ListenerFlags` a listener advertises - and calls straight through a
//! trait object afterwards.

use async_trait::async_trait;

use crate::ack::Acknowledgment;
use crate::record::{ConsumerRecord, ConsumerRecords};
use crate::seek::SeekCallback;

/// Classification tag for listener errors, used by the error-handler
/// pipeline's allow/deny classifier and by DLT matching-exception sets.
/// The Rust analogue of matching on a thrown exception's class name.
pub trait ListenerError: std::error::Error + Send + Sync + 'static {
    fn kind(&self) -> &str;
}

pub type BoxedListenerError = Box<dyn ListenerError>;

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct GenericListenerError {
    pub kind: String,
    pub message: String,
}

impl ListenerError for GenericListenerError {
    fn kind(&self) -> &str {
        &self.kind
    }
}

impl GenericListenerError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// What the container must wire up for a given listener: whether it wants
/// a manual-ack handle, the consumer handle, or the seek callback injected
/// into its invocation context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListenerFlags {
    pub needs_ack: bool,
    pub needs_consumer: bool,
    pub needs_seek_callback: bool,
}

/// How records from a single poll are handed to the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatcher {
    SingleRecord,
    Batch,
    /// Batch listener, but dispatched once per partition instead of once
    /// per poll - only meaningful when the listener is a batch listener and
    /// transactions are active (§4.1).
    SubBatchPerPartition,
}

/// Context passed alongside a record/batch to the listener: the manual-ack
/// handle (present only for `MANUAL`/`MANUAL_IMMEDIATE` ack modes) and the
/// seek callback (always present).
pub struct ListenerContext {
    pub ack: Option<Acknowledgment>,
    pub seek: SeekCallback,
}

#[async_trait]
pub trait RecordListener: Send + Sync {
    async fn on_message(
        &self,
        record: ConsumerRecord,
        ctx: ListenerContext,
    ) -> Result<(), BoxedListenerError>;

    fn flags(&self) -> ListenerFlags {
        ListenerFlags::default()
    }
}

#[async_trait]
pub trait BatchListener: Send + Sync {
    async fn on_message_batch(
        &self,
        records: ConsumerRecords,
        ctx: ListenerContext,
    ) -> Result<(), BoxedListenerError>;

    fn flags(&self) -> ListenerFlags {
        ListenerFlags::default()
    }
}

/// Unifies the two listener shapes behind the `Dispatcher` tag so the
/// container can hold one trait object regardless of which kind of listener
/// an endpoint registered.
pub enum Listener {
    Record(Box<dyn RecordListener>),
    Batch(Box<dyn BatchListener>),
    SubBatchPerPartition(Box<dyn BatchListener>),
}

impl Listener {
    pub fn dispatcher(&self) -> Dispatcher {
        match self {
            Listener::Record(_) => Dispatcher::SingleRecord,
            Listener::Batch(_) => Dispatcher::Batch,
            Listener::SubBatchPerPartition(_) => Dispatcher::SubBatchPerPartition,
        }
    }

    pub fn flags(&self) -> ListenerFlags {
        match self {
            Listener::Record(l) => l.flags(),
            Listener::Batch(l) | Listener::SubBatchPerPartition(l) => l.flags(),
        }
    }
}
