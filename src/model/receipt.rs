// Receipt handle (§3): the sole credential for delete / change-visibility.
// Structurally validated before any state mutation is attempted.

use crate::arn::Arn;
use crate::error::{BusError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHandle {
    pub token: Uuid,
    pub queue_arn: Arn,
    pub message_id: String,
    pub issued_at: DateTime<Utc>,
}

impl ReceiptHandle {
    pub fn new(queue_arn: Arn, message_id: String, issued_at: DateTime<Utc>) -> Self {
        Self {
            token: Uuid::new_v4(),
            queue_arn,
            message_id,
            issued_at,
        }
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{} {} {} {}",
            self.token,
            self.queue_arn.as_str(),
            self.message_id,
            self.issued_at.timestamp()
        );
        BASE64.encode(raw)
    }

    pub fn decode(handle: &str) -> Result<Self> {
        let raw = BASE64
            .decode(handle)
            .ok()
            .and_then(|b| String::from_utf8(b).ok())
            .ok_or(BusError::ReceiptHandleIsInvalid)?;
        let mut parts = raw.splitn(4, ' ');
        let (token, queue_arn, message_id, epoch) = match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some(t), Some(q), Some(m), Some(e)) => (t, q, m, e),
            _ => return Err(BusError::ReceiptHandleIsInvalid),
        };
        let token = Uuid::parse_str(token).map_err(|_| BusError::ReceiptHandleIsInvalid)?;
        let queue_arn = Arn::parse(queue_arn).map_err(|_| BusError::ReceiptHandleIsInvalid)?;
        let epoch_seconds: i64 = epoch.parse().map_err(|_| BusError::ReceiptHandleIsInvalid)?;
        let issued_at = Utc
            .timestamp_opt(epoch_seconds, 0)
            .single()
            .ok_or(BusError::ReceiptHandleIsInvalid)?;
        Ok(Self {
            token,
            queue_arn,
            message_id: message_id.to_string(),
            issued_at,
        })
    }
}
