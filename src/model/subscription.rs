// Subscription data model (§3).

use crate::arn::Arn;
use crate::filter::CompiledFilterPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Sqs,
}

impl Protocol {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sqs" => Some(Protocol::Sqs),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub subscription_arn: Arn,
    pub topic_arn: Arn,
    pub protocol: Protocol,
    /// Queue ARN the subscription delivers to.
    pub endpoint: Arn,
    pub raw: bool,
    pub filter_policy_json: Option<String>,
    /// Precompiled at subscribe-time (and rebuilt on SetSubscriptionAttributes),
    /// per §9 Design Notes, rather than re-parsed on every publish.
    pub compiled_filter: Option<CompiledFilterPolicy>,
}
