// Message data model (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const MAX_MESSAGE_BYTES: usize = 1_048_576;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttributeValue {
    #[serde(rename = "DataType")]
    pub data_type: String,
    #[serde(rename = "StringValue", skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(rename = "BinaryValue", skip_serializing_if = "Option::is_none")]
    pub binary_value: Option<Vec<u8>>,
}

impl MessageAttributeValue {
    pub fn string(data_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            string_value: Some(value.into()),
            binary_value: None,
        }
    }

    pub fn binary(data_type: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            data_type: data_type.into(),
            string_value: None,
            binary_value: Some(value),
        }
    }

    /// Bytes counted toward the 1 MiB / 256 KiB size caps (§4.1.2, §4.2):
    /// `bytes(dataType) + bytes(stringValue) + len(binaryValue)`.
    pub fn byte_len(&self) -> usize {
        self.data_type.len()
            + self.string_value.as_ref().map_or(0, |s| s.len())
            + self.binary_value.as_ref().map_or(0, |b| b.len())
    }
}

pub type MessageAttributes = HashMap<String, MessageAttributeValue>;

/// Attributes the emulator maintains itself, as opposed to user-supplied
/// `messageAttributes` (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemAttributes {
    pub approximate_receive_count: u32,
    pub sent_timestamp: Option<DateTime<Utc>>,
    pub approximate_first_receive_timestamp: Option<DateTime<Utc>>,
    pub message_group_id: Option<String>,
    pub message_deduplication_id: Option<String>,
    pub sequence_number: Option<u128>,
    pub dead_letter_queue_source_arn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub body: String,
    pub md5_of_body: String,
    pub message_attributes: MessageAttributes,
    pub system_attributes: SystemAttributes,
}

impl Message {
    /// Total size counted against the 1 MiB per-message cap: UTF-8 bytes of
    /// the body plus, for every attribute, name + dataType + stringValue +
    /// binaryValue bytes (§4.1.2 step 1).
    pub fn size_bytes(body: &str, attributes: &MessageAttributes) -> usize {
        let attrs: usize = attributes
            .iter()
            .map(|(name, value)| name.len() + value.byte_len())
            .sum();
        body.len() + attrs
    }

    pub fn md5_hex(body: &str) -> String {
        format!("{:x}", md5::compute(body.as_bytes()))
    }

    /// Strip the receive-lifecycle system attributes before redriving a
    /// message into a DLQ or moving it back out of one (§4.1.7, §4.3): the
    /// destination timestamps the arrival freshly and starts the receive
    /// count over.
    pub fn strip_receive_lifecycle(&mut self) {
        self.system_attributes.approximate_receive_count = 0;
        self.system_attributes.approximate_first_receive_timestamp = None;
        self.system_attributes.sent_timestamp = None;
    }
}
