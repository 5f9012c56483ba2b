//! Error handler pipeline (C5, §4.5).

pub mod after_rollback;
pub mod classifier;
pub mod pipeline;

pub use after_rollback::{AfterRollbackProcessor, SeekToFirstFailedOffset};
pub use classifier::ErrorClassifier;
pub use pipeline::{Decision, ErrorHandlerPipeline};
