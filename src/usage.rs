// UsageTracker (§2, §11): a write-only append log of operations, used only
// to generate a coarse IAM policy document grouping actions by service.
// Statement shape mirrors `VanOvermeire-rusty-cdk`'s IAM DTOs
// (`cloud-infra-core/src/iam/dto.rs`): a versioned document of `Statement`s,
// each an effect plus an action list.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct UsageEvent {
    pub service: String,
    pub action: String,
    pub success: bool,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct UsageTracker {
    events: Mutex<Vec<UsageEvent>>,
}

#[derive(Debug, Serialize)]
pub struct IamPolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<IamStatement>,
}

#[derive(Debug, Serialize)]
pub struct IamStatement {
    #[serde(rename = "Sid")]
    pub sid: String,
    #[serde(rename = "Effect")]
    pub effect: String,
    #[serde(rename = "Action")]
    pub action: Vec<String>,
    #[serde(rename = "Resource")]
    pub resource: String,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, service: impl Into<String>, action: impl Into<String>, success: bool, at: DateTime<Utc>) {
        self.events.lock().push(UsageEvent {
            service: service.into(),
            action: action.into(),
            success,
            at,
        });
    }

    pub fn events(&self) -> Vec<UsageEvent> {
        self.events.lock().clone()
    }

    /// One `Allow` statement per service observed, naming every distinct
    /// action recorded against it, on resource `"*"`.
    pub fn generate_policy(&self) -> IamPolicyDocument {
        let mut by_service: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for event in self.events.lock().iter() {
            let actions = by_service.entry(event.service.clone()).or_default();
            if !actions.contains(&event.action) {
                actions.push(event.action.clone());
            }
        }
        let statement = by_service
            .into_iter()
            .map(|(service, mut actions)| {
                actions.sort();
                IamStatement {
                    sid: format!("{service}Access"),
                    effect: "Allow".to_string(),
                    action: actions,
                    resource: "*".to_string(),
                }
            })
            .collect();
        IamPolicyDocument {
            version: "2012-10-17".to_string(),
            statement,
        }
    }
}
