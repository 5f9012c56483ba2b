mod ack_mode;
mod container_properties;
mod destination_topic;
mod partition_state;
mod topic_partition;

pub use ack_mode::{AckMode, AssignmentCommitOption};
pub use container_properties::{ContainerProperties, Subscription};
pub use destination_topic::{DestinationKind, DestinationTopic, DltStrategy};
pub use partition_state::PartitionState;
pub use topic_partition::{OffsetAndMetadata, TopicPartition};
