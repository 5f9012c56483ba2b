//! After-rollback processor (§4.5): runs once a transactional abort has
//! completed, deciding where each rolled-back partition should resume.

use crate::model::TopicPartition;

/// Default behavior: seek every partition that had work rolled back back to
/// its first failed offset so it is redelivered on the next poll.
pub trait AfterRollbackProcessor: Send + Sync {
    /// Returns the `(partition, offset)` pairs to seek to. The container
    /// performs the actual seek; this hook only decides the target.
    fn process(&self, rolled_back: &[(TopicPartition, i64)]) -> Vec<(TopicPartition, i64)>;
}

#[derive(Default)]
pub struct SeekToFirstFailedOffset;

impl AfterRollbackProcessor for SeekToFirstFailedOffset {
    fn process(&self, rolled_back: &[(TopicPartition, i64)]) -> Vec<(TopicPartition, i64)> {
        rolled_back.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_processor_seeks_back_to_every_failed_offset() {
        let processor = SeekToFirstFailedOffset;
        let rolled_back = vec![
            (TopicPartition::new("foo", 1), 1),
            (TopicPartition::new("foo", 2), 0),
        ];
        assert_eq!(processor.process(&rolled_back), rolled_back);
    }
}
