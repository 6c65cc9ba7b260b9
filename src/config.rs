/// Bus-wide configuration: the identity (partition/region/account) ARNs are
/// minted against, and the base URL used to build queue URLs (§6).
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub partition: String,
    pub region: String,
    pub account_id: String,
    /// Base used for queue URLs, e.g. `https://sqs.<region>.amazonaws.com`.
    /// Overridable so the emulator can be addressed at a local bind address
    /// during tests.
    pub service_url_base: Option<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            partition: "aws".to_string(),
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
            service_url_base: None,
        }
    }
}

impl BusConfig {
    pub fn queue_url_base(&self) -> String {
        self.service_url_base
            .clone()
            .unwrap_or_else(|| format!("https://sqs.{}.amazonaws.com", self.region))
    }
}
