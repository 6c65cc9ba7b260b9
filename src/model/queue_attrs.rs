// Queue attributes and redrive policy (§3). Field names mirror the
// CloudFormation-style naming used for these resources elsewhere in the
// pack (see `VanOvermeire-rusty-cdk`'s `cloud-infra-core/src/sqs/dto.rs`).

use crate::arn::Arn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeduplicationScope {
    Queue,
    MessageGroup,
}

impl Default for DeduplicationScope {
    fn default() -> Self {
        DeduplicationScope::Queue
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThroughputLimit {
    PerQueue,
    PerMessageGroupId,
}

impl Default for ThroughputLimit {
    fn default() -> Self {
        ThroughputLimit::PerQueue
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedrivePolicy {
    #[serde(rename = "deadLetterTargetArn")]
    pub dead_letter_target_arn: Arn,
    #[serde(rename = "maxReceiveCount")]
    pub max_receive_count: u32,
}

#[derive(Debug, Clone)]
pub struct QueueAttributes {
    pub visibility_timeout: Duration,
    pub redrive_policy: Option<RedrivePolicy>,
    pub fifo: bool,
    pub deduplication_scope: DeduplicationScope,
    pub throughput_limit: ThroughputLimit,
    pub attributes: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    pub policy: Option<serde_json::Value>,
}

impl Default for QueueAttributes {
    fn default() -> Self {
        Self {
            visibility_timeout: Duration::from_secs(30),
            redrive_policy: None,
            fifo: false,
            deduplication_scope: DeduplicationScope::default(),
            throughput_limit: ThroughputLimit::default(),
            attributes: HashMap::new(),
            tags: HashMap::new(),
            policy: None,
        }
    }
}

impl QueueAttributes {
    /// "Fair" FIFO mode (§9 Open Question): per-group deduplication, no
    /// actual per-group throughput isolation.
    pub fn is_fair_fifo(&self) -> bool {
        self.fifo
            && self.deduplication_scope == DeduplicationScope::MessageGroup
            && self.throughput_limit == ThroughputLimit::PerMessageGroupId
    }
}
