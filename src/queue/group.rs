// FIFO message-group state (§4.1.1, §9 Design Notes): one ordered sequence
// plus an advisory lock per `messageGroupId`, interned for the life of the
// queue. Enqueue and receive serialise under this lock; groups are
// otherwise independent of each other.

use crate::model::Message;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Default)]
pub struct FifoGroup {
    pub messages: VecDeque<Message>,
    /// Per-group deduplication ids, used only when the queue's
    /// deduplication-scope is `messageGroup` (§4.1.2 step 4, "fair" queues).
    pub dedup: HashMap<String, String>,
    /// Count of messages from this group currently in flight. While this is
    /// nonzero, receive must skip the group entirely (§4.1.3).
    pub in_flight_count: usize,
}

impl FifoGroup {
    pub fn is_idle_and_empty(&self) -> bool {
        self.in_flight_count == 0 && self.messages.is_empty()
    }
}
