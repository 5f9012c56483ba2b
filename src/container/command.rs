//! Lock-free external command queue (§4.1, §5): pause/resume/stop requests
//! cross from arbitrary caller threads to the poll thread over a
//! `std::sync::mpsc` channel, drained once per iteration.

use crate::model::TopicPartition;

#[derive(Debug, Clone)]
pub enum Command {
    Pause,
    Resume,
    PausePartition(TopicPartition),
    ResumePartition(TopicPartition),
    Stop,
}
