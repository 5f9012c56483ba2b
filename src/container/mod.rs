//! Listener container (C7, C8, §4.1-4.2).

pub mod command;
pub mod concurrent;
pub mod single;

pub use command::Command;
pub use concurrent::ConcurrentContainer;
pub use single::{ContainerState, SingleThreadedContainer};
