// TopicCore (§3, §4.2): attributes, subscription index, and the compiled
// publish plan. The plan is a snapshot published behind a lock and rebuilt
// whenever the subscription set changes; publish reads it without taking a
// topic-level lock (§9 Design Notes).

use crate::arn::Arn;
use crate::model::{Subscription, TopicAttributes};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

pub struct TopicCore {
    pub name: String,
    pub arn: Arn,
    pub created_at: DateTime<Utc>,
    pub attributes: Mutex<TopicAttributes>,
    subscriptions: DashMap<Arn, Arc<Subscription>>,
    plan: RwLock<Arc<Vec<Arc<Subscription>>>>,
}

impl TopicCore {
    pub fn new(
        name: String,
        arn: Arn,
        attributes: TopicAttributes,
        created_at: DateTime<Utc>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            arn,
            created_at,
            attributes: Mutex::new(attributes),
            subscriptions: DashMap::new(),
            plan: RwLock::new(Arc::new(Vec::new())),
        })
    }

    pub fn add_subscription(&self, subscription: Arc<Subscription>) {
        self.subscriptions
            .insert(subscription.subscription_arn.clone(), subscription);
        self.rebuild_plan();
    }

    pub fn remove_subscription(&self, subscription_arn: &Arn) -> Option<Arc<Subscription>> {
        let removed = self.subscriptions.remove(subscription_arn).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_plan();
        }
        removed
    }

    pub fn subscription(&self, subscription_arn: &Arn) -> Option<Arc<Subscription>> {
        self.subscriptions
            .get(subscription_arn)
            .map(|e| e.value().clone())
    }

    /// Used by `SetSubscriptionAttributes` to swap in a recompiled filter
    /// policy without changing identity or plan membership order.
    pub fn replace_subscription(&self, subscription: Arc<Subscription>) {
        self.subscriptions
            .insert(subscription.subscription_arn.clone(), subscription);
        self.rebuild_plan();
    }

    pub fn subscriptions(&self) -> Vec<Arc<Subscription>> {
        self.subscriptions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn plan(&self) -> Arc<Vec<Arc<Subscription>>> {
        self.plan.read().clone()
    }

    fn rebuild_plan(&self) {
        let snapshot: Vec<Arc<Subscription>> =
            self.subscriptions.iter().map(|e| e.value().clone()).collect();
        tracing::debug!(topic = %self.arn, subscriptions = snapshot.len(), "rebuilt publish plan");
        *self.plan.write() = Arc::new(snapshot);
    }
}
