pub mod message;
pub mod move_task;
pub mod queue_attrs;
pub mod receipt;
pub mod subscription;
pub mod topic_attrs;

pub use message::{Message, MessageAttributeValue, MessageAttributes, SystemAttributes, MAX_MESSAGE_BYTES};
pub use move_task::{MoveTask, MoveTaskStatus};
pub use queue_attrs::{DeduplicationScope, QueueAttributes, RedrivePolicy, ThroughputLimit};
pub use receipt::ReceiptHandle;
pub use subscription::{Protocol, Subscription};
pub use topic_attrs::TopicAttributes;
