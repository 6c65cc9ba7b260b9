// Topic attributes (§3).

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct TopicAttributes {
    pub attributes: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    /// Opaque permission-policy document (§4.2: Add/Remove permission).
    pub policy: Option<serde_json::Value>,
}
