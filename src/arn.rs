// ARN parsing and minting (§3, §4.4, §6). Resources are looked up by name,
// arena-style, rather than held via pointers (§9 Design Notes), so an Arn is
// just an interned, validated string.

use crate::error::{BusError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Arn(String);

impl Arn {
    pub fn queue(partition: &str, region: &str, account: &str, name: &str) -> Self {
        Arn(format!("arn:{partition}:sqs:{region}:{account}:{name}"))
    }

    pub fn topic(partition: &str, region: &str, account: &str, name: &str) -> Self {
        Arn(format!("arn:{partition}:sns:{region}:{account}:{name}"))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.matches(':').count() < 5 || !raw.starts_with("arn:") {
            return Err(BusError::InvalidParameter(format!("malformed ARN: {raw}")));
        }
        Ok(Arn(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last colon-delimited segment (§4.4: "ARN parsing is last-colon-split
    /// into name").
    pub fn name(&self) -> Result<&str> {
        match self.0.rsplit_once(':') {
            Some((_, name)) if !name.is_empty() => Ok(name),
            _ => Err(BusError::InvalidParameter(format!(
                "malformed ARN: {}",
                self.0
            ))),
        }
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Queue URL (§6): `https://sqs.<region>.amazonaws.com/<account>/<name>`
/// (or a configured service-URL base).
pub fn queue_url(base: &str, account: &str, name: &str) -> String {
    format!("{base}/{account}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_arn_is_bit_exact() {
        let arn = Arn::queue("aws", "us-east-1", "000000000000", "my-queue");
        assert_eq!(arn.as_str(), "arn:aws:sqs:us-east-1:000000000000:my-queue");
        assert_eq!(arn.name().unwrap(), "my-queue");
    }

    #[test]
    fn topic_arn_is_bit_exact() {
        let arn = Arn::topic("aws", "us-east-1", "000000000000", "my-topic");
        assert_eq!(arn.as_str(), "arn:aws:sns:us-east-1:000000000000:my-topic");
    }

    #[test]
    fn malformed_arn_is_rejected() {
        assert!(Arn::parse("not-an-arn").is_err());
        assert!(Arn::parse("arn:aws:sqs").is_err());
    }

    #[test]
    fn queue_url_matches_spec_shape() {
        assert_eq!(
            queue_url("https://sqs.us-east-1.amazonaws.com", "000000000000", "q"),
            "https://sqs.us-east-1.amazonaws.com/000000000000/q"
        );
    }
}
