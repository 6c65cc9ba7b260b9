// PublishAction (§4.2): filter-policy evaluation, raw-vs-envelope body
// materialisation, and the 256 KiB size cap. Target-queue lookup is left to
// the bus facade (arena-style resolution, §9 Design Notes); a plan entry
// whose queue has since been deleted simply yields no delivery here.

use crate::arn::Arn;
use crate::error::{BusError, Result};
use crate::model::{MessageAttributeValue, MessageAttributes, Subscription};
use crate::queue::SendInput;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

pub const PUBLISH_SIZE_CAP_BYTES: usize = 262_144;

#[derive(Debug, Clone)]
pub struct PublishInput {
    pub message: String,
    pub subject: Option<String>,
    pub message_attributes: MessageAttributes,
    pub message_group_id: Option<String>,
    pub message_deduplication_id: Option<String>,
}

pub fn payload_size(input: &PublishInput) -> usize {
    let attrs: usize = input
        .message_attributes
        .iter()
        .map(|(name, value)| name.len() + value.byte_len())
        .sum();
    input.message.len() + input.subject.as_ref().map_or(0, |s| s.len()) + attrs
}

pub fn check_single_size(input: &PublishInput) -> Result<()> {
    let size = payload_size(input);
    if size > PUBLISH_SIZE_CAP_BYTES {
        return Err(BusError::InvalidParameter(format!(
            "publish payload of {size} bytes exceeds the 262,144 byte limit"
        )));
    }
    Ok(())
}

pub fn check_batch_size(inputs: &[&PublishInput]) -> Result<()> {
    let total: usize = inputs.iter().map(|i| payload_size(i)).sum();
    if total > PUBLISH_SIZE_CAP_BYTES {
        return Err(BusError::BatchRequestTooLong(total));
    }
    Ok(())
}

/// Evaluate `subscription`'s filter policy against `input` and, on a match,
/// materialise the `SendInput` that should be handed to the target queue's
/// `send` path. Returns `None` when the filter rejects the message.
pub fn deliver_to(
    subscription: &Subscription,
    topic_arn: &Arn,
    message_id: &str,
    input: &PublishInput,
    timestamp: DateTime<Utc>,
) -> Option<SendInput> {
    if let Some(filter) = &subscription.compiled_filter {
        if !filter.matches(&input.message_attributes) {
            tracing::trace!(
                subscription = %subscription.subscription_arn,
                "filter policy suppressed delivery"
            );
            return None;
        }
    }

    let (body, message_attributes) = if subscription.raw {
        (input.message.clone(), input.message_attributes.clone())
    } else {
        let envelope = build_envelope(topic_arn, message_id, input, timestamp);
        let mut attrs = MessageAttributes::new();
        attrs.insert(
            "TopicArn".to_string(),
            MessageAttributeValue::string("String", topic_arn.as_str()),
        );
        (envelope, attrs)
    };

    Some(SendInput {
        body,
        message_attributes,
        delay_seconds: 0,
        message_group_id: input.message_group_id.clone(),
        message_deduplication_id: input.message_deduplication_id.clone(),
    })
}

fn build_envelope(
    topic_arn: &Arn,
    message_id: &str,
    input: &PublishInput,
    timestamp: DateTime<Utc>,
) -> String {
    let mut envelope = serde_json::Map::new();
    envelope.insert("Type".into(), json!("Notification"));
    envelope.insert("MessageId".into(), json!(message_id));
    envelope.insert("TopicArn".into(), json!(topic_arn.as_str()));
    if let Some(subject) = &input.subject {
        envelope.insert("Subject".into(), json!(subject));
    }
    envelope.insert("Message".into(), json!(input.message));
    envelope.insert(
        "Timestamp".into(),
        json!(timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()),
    );
    envelope.insert("SignatureVersion".into(), json!("1"));
    envelope.insert("Signature".into(), json!("EXAMPLE"));
    envelope.insert("SigningCertURL".into(), json!("EXAMPLE"));
    envelope.insert("UnsubscribeURL".into(), json!("EXAMPLE"));
    if !input.message_attributes.is_empty() {
        let mut attrs_json = serde_json::Map::new();
        for (name, value) in &input.message_attributes {
            attrs_json.insert(
                name.clone(),
                json!({
                    "Type": value.data_type,
                    "Value": value.string_value.clone().unwrap_or_default(),
                }),
            );
        }
        envelope.insert("MessageAttributes".into(), Value::Object(attrs_json));
    }
    Value::Object(envelope).to_string()
}
