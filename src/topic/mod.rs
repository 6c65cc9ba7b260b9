pub mod core;
pub mod publish;

pub use core::TopicCore;
pub use publish::{check_batch_size, check_single_size, deliver_to, PublishInput, PUBLISH_SIZE_CAP_BYTES};
