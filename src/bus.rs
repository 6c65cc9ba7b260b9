// BusFacade (§4.4): the single in-process object the wire layer talks to.
// Holds the four concurrent keyed collections (queues, topics, subscriptions,
// move-tasks), validates input, resolves ARNs arena-style, and records every
// operation — success or failure — with the usage tracker.

use crate::arn::{self, Arn};
use crate::config::BusConfig;
use crate::error::{BusError, Result};
use crate::model::{
    Message, MoveTask, MoveTaskStatus, Protocol, QueueAttributes, RedrivePolicy, Subscription,
    TopicAttributes,
};
use crate::move_task::{self, QueueResolver};
use crate::pagination::paginate;
use crate::queue::{QueueCore, ReceiveInput, ReceivedMessage, SendInput, SendOutput};
use crate::sequence::SequenceGenerator;
use crate::time::{CancellationToken, TimeProvider};
use crate::topic::{self, PublishInput, TopicCore};
use crate::usage::{IamPolicyDocument, UsageTracker};
use dashmap::DashMap;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const MAX_BATCH_ENTRIES: usize = 10;

/// Live view of a queue's attributes: the stored settings plus the computed
/// counts (§3) that only make sense read fresh off the queue itself.
#[derive(Debug, Clone)]
pub struct QueueAttributesSnapshot {
    pub visibility_timeout: Duration,
    pub redrive_policy: Option<RedrivePolicy>,
    pub fifo: bool,
    pub deduplication_scope: crate::model::DeduplicationScope,
    pub throughput_limit: crate::model::ThroughputLimit,
    pub attributes: HashMap<String, String>,
    pub tags: HashMap<String, String>,
    pub policy: Option<serde_json::Value>,
    pub approximate_number_of_messages: usize,
    pub approximate_number_of_messages_not_visible: usize,
    pub approximate_number_of_messages_delayed: usize,
}

pub struct PublishBatchEntry {
    pub id: String,
    pub input: PublishInput,
}

#[derive(Debug, Clone)]
pub struct PublishBatchSuccess {
    pub id: String,
    pub message_id: String,
}

#[derive(Debug, Clone)]
pub struct PublishBatchFailure {
    pub id: String,
    pub error: BusError,
}

#[derive(Debug, Clone, Default)]
pub struct PublishBatchResult {
    pub successful: Vec<PublishBatchSuccess>,
    pub failed: Vec<PublishBatchFailure>,
}

pub struct MessageBus {
    config: BusConfig,
    time: Arc<dyn TimeProvider>,
    sequence: Arc<SequenceGenerator>,
    queues: DashMap<String, Arc<QueueCore>>,
    topics: DashMap<String, Arc<TopicCore>>,
    subscription_owner: DashMap<Arn, Arn>,
    move_tasks: DashMap<String, Arc<MoveTask>>,
    move_task_cancel: DashMap<String, CancellationToken>,
    usage: UsageTracker,
}

impl MessageBus {
    pub fn new(config: BusConfig, time: Arc<dyn TimeProvider>) -> Arc<Self> {
        Arc::new(Self {
            config,
            time,
            sequence: Arc::new(SequenceGenerator::new()),
            queues: DashMap::new(),
            topics: DashMap::new(),
            subscription_owner: DashMap::new(),
            move_tasks: DashMap::new(),
            move_task_cancel: DashMap::new(),
            usage: UsageTracker::new(),
        })
    }

    fn record(&self, service: &str, action: &str, success: bool) {
        tracing::debug!(service, action, success, "bus operation recorded");
        self.usage.record(service, action, success, self.time.now());
    }

    /// Records a failed usage event when `result` is `Err`, otherwise passes
    /// it through untouched. Centralizes "record on both success and
    /// failure" for every resource lookup a public operation depends on; the
    /// caller still records its own success after doing its own work.
    fn checkpoint<T>(&self, service: &str, action: &str, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.record(service, action, false);
        }
        result
    }

    pub fn usage_policy(&self) -> IamPolicyDocument {
        self.usage.generate_policy()
    }

    fn queue_arn(&self, name: &str) -> Arn {
        Arn::queue(&self.config.partition, &self.config.region, &self.config.account_id, name)
    }

    fn topic_arn(&self, name: &str) -> Arn {
        Arn::topic(&self.config.partition, &self.config.region, &self.config.account_id, name)
    }

    fn resolve_queue_by_arn(&self, target: &Arn) -> Option<Arc<QueueCore>> {
        let name = target.name().ok()?;
        self.queues.get(name).map(|e| e.value().clone())
    }

    // ---------------------------------------------------------------- queue

    pub fn create_queue(&self, name: String, attributes: QueueAttributes) -> Result<String> {
        let mut attributes = attributes;
        attributes.fifo = name.ends_with(".fifo");

        if let Some(policy) = &attributes.redrive_policy {
            self.checkpoint(
                "sqs",
                "CreateQueue",
                self.validate_redrive_target(policy, attributes.fifo),
            )?;
        }

        if let Some(existing) = self.queues.get(&name) {
            if queue_attributes_equivalent(&existing.attributes.read(), &attributes) {
                self.record("sqs", "CreateQueue", true);
                return Ok(existing.url.clone());
            }
            self.record("sqs", "CreateQueue", false);
            return Err(BusError::QueueNameExists(name));
        }

        let arn = self.queue_arn(&name);
        let url = arn::queue_url(&self.config.queue_url_base(), &self.config.account_id, &name);
        let queue = QueueCore::new(
            name.clone(),
            arn,
            url.clone(),
            attributes,
            Arc::clone(&self.sequence),
            Arc::clone(&self.time),
            self.time.now(),
        );
        self.queues.insert(name, queue);
        self.record("sqs", "CreateQueue", true);
        Ok(url)
    }

    /// Checks that a redrive policy's dead-letter target exists and that its
    /// FIFO-ness matches the source queue's — SQS requires a FIFO queue's
    /// DLQ to be FIFO too, and vice versa, since a standard DLQ can't carry
    /// a redriven message's `MessageGroupId` requirement.
    fn validate_redrive_target(&self, policy: &RedrivePolicy, source_fifo: bool) -> Result<()> {
        let target_name = policy.dead_letter_target_arn.name()?;
        let target = self.queues.get(target_name).ok_or_else(|| {
            BusError::QueueDoesNotExist(policy.dead_letter_target_arn.as_str().to_string())
        })?;
        if target.is_fifo() != source_fifo {
            return Err(BusError::InvalidParameter(format!(
                "dead-letter target {target_name} must match the source queue's FIFO setting"
            )));
        }
        Ok(())
    }

    pub fn delete_queue(&self, name: &str) -> Result<()> {
        let arn = self.queue_arn(name);
        let still_referenced = self.queues.iter().any(|entry| {
            entry.key() != name
                && entry
                    .value()
                    .attributes
                    .read()
                    .redrive_policy
                    .as_ref()
                    .is_some_and(|p| p.dead_letter_target_arn == arn)
        });
        if still_referenced {
            self.record("sqs", "DeleteQueue", false);
            return Err(BusError::InvalidParameter(format!(
                "queue {name} is still referenced as a dead-letter target"
            )));
        }
        match self.queues.remove(name) {
            Some(_) => {
                self.record("sqs", "DeleteQueue", true);
                Ok(())
            }
            None => {
                self.record("sqs", "DeleteQueue", false);
                Err(BusError::QueueDoesNotExist(name.to_string()))
            }
        }
    }

    pub fn get_queue(&self, name: &str) -> Result<Arc<QueueCore>> {
        self.queues
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| BusError::QueueDoesNotExist(name.to_string()))
    }

    pub fn list_queues(
        &self,
        name_prefix: Option<&str>,
        continuation_token: Option<&str>,
        max_results: usize,
    ) -> Result<(Vec<String>, Option<String>)> {
        let names: Vec<String> = self
            .queues
            .iter()
            .map(|e| e.key().clone())
            .filter(|n| name_prefix.map_or(true, |p| n.starts_with(p)))
            .collect();
        let page = self.checkpoint(
            "sqs",
            "ListQueues",
            paginate(names, |n| n.clone(), continuation_token, max_results),
        )?;
        self.record("sqs", "ListQueues", true);
        Ok(page)
    }

    pub fn send_message(&self, queue_name: &str, input: SendInput) -> Result<SendOutput> {
        let queue = self.checkpoint("sqs", "SendMessage", self.get_queue(queue_name))?;
        let result = queue.send(input);
        self.record("sqs", "SendMessage", result.is_ok());
        result
    }

    pub async fn receive_message(
        &self,
        queue_name: &str,
        input: ReceiveInput,
        cancel: CancellationToken,
    ) -> Result<Vec<ReceivedMessage>> {
        let queue = self.checkpoint("sqs", "ReceiveMessage", self.get_queue(queue_name))?;
        let sink = self.redrive_sink();
        let received = queue.receive(input, cancel, sink.as_ref()).await;
        self.record("sqs", "ReceiveMessage", true);
        Ok(received)
    }

    /// Built once per call so the closure borrows only `self`'s queue map,
    /// not the bus as a whole, for the duration of `receive`. A redrive that
    /// can't land (DLQ deleted since, or FIFO DLQ given a groupless message)
    /// is logged rather than silently dropped.
    fn redrive_sink(&self) -> Box<dyn Fn(&Arn, Message) + Send + Sync + '_> {
        Box::new(move |target: &Arn, message: Message| match self.resolve_queue_by_arn(target) {
            Some(dlq) => {
                if let Err(e) = dlq.enqueue_from_redrive(message) {
                    tracing::warn!(
                        target = %target,
                        error = %e,
                        "failed to redrive message into dead-letter queue"
                    );
                }
            }
            None => {
                tracing::warn!(target = %target, "dead-letter queue target no longer exists, message dropped");
            }
        })
    }

    pub fn delete_message(&self, queue_name: &str, receipt_handle: &str) -> Result<()> {
        let queue = self.checkpoint("sqs", "DeleteMessage", self.get_queue(queue_name))?;
        let result = queue.delete_message(receipt_handle);
        self.record("sqs", "DeleteMessage", result.is_ok());
        result
    }

    pub fn change_message_visibility(
        &self,
        queue_name: &str,
        receipt_handle: &str,
        new_timeout: Duration,
    ) -> Result<()> {
        let queue = self.checkpoint("sqs", "ChangeMessageVisibility", self.get_queue(queue_name))?;
        let result = queue.change_message_visibility(receipt_handle, new_timeout);
        self.record("sqs", "ChangeMessageVisibility", result.is_ok());
        result
    }

    pub fn purge_queue(&self, queue_name: &str) -> Result<()> {
        let queue = self.checkpoint("sqs", "PurgeQueue", self.get_queue(queue_name))?;
        let result = queue.purge();
        self.record("sqs", "PurgeQueue", result.is_ok());
        result
    }

    pub fn tag_queue(&self, queue_name: &str, tags: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        let queue = self.checkpoint("sqs", "TagQueue", self.get_queue(queue_name))?;
        queue.attributes.write().tags.extend(tags);
        self.record("sqs", "TagQueue", true);
        Ok(())
    }

    pub fn untag_queue(&self, queue_name: &str, keys: &[String]) -> Result<()> {
        let queue = self.checkpoint("sqs", "UntagQueue", self.get_queue(queue_name))?;
        let mut attrs = queue.attributes.write();
        for key in keys {
            attrs.tags.remove(key);
        }
        self.record("sqs", "UntagQueue", true);
        Ok(())
    }

    pub fn list_queue_tags(&self, queue_name: &str) -> Result<HashMap<String, String>> {
        let queue = self.checkpoint("sqs", "ListQueueTags", self.get_queue(queue_name))?;
        let tags = queue.attributes.read().tags.clone();
        self.record("sqs", "ListQueueTags", true);
        Ok(tags)
    }

    pub fn get_queue_attributes(&self, queue_name: &str) -> Result<QueueAttributesSnapshot> {
        let queue = self.checkpoint("sqs", "GetQueueAttributes", self.get_queue(queue_name))?;
        let attrs = queue.attributes.read().clone();
        self.record("sqs", "GetQueueAttributes", true);
        Ok(QueueAttributesSnapshot {
            visibility_timeout: attrs.visibility_timeout,
            redrive_policy: attrs.redrive_policy,
            fifo: attrs.fifo,
            deduplication_scope: attrs.deduplication_scope,
            throughput_limit: attrs.throughput_limit,
            attributes: attrs.attributes,
            tags: attrs.tags,
            policy: attrs.policy,
            approximate_number_of_messages: queue.approximate_number_of_messages(),
            approximate_number_of_messages_not_visible: queue.approximate_number_not_visible(),
            approximate_number_of_messages_delayed: queue.approximate_number_delayed(),
        })
    }

    /// Applies `mutate` to a snapshot of the queue's current attributes and
    /// commits the result, rejecting changes to the FIFO flag (immutable
    /// after creation, §3) and redrive policies whose target doesn't exist
    /// or doesn't match the queue's FIFO setting (§3: "target must exist at
    /// the moment of policy-set").
    pub fn set_queue_attributes(
        &self,
        queue_name: &str,
        mutate: impl FnOnce(&mut QueueAttributes),
    ) -> Result<()> {
        let queue = self.checkpoint("sqs", "SetQueueAttributes", self.get_queue(queue_name))?;
        let mut patched = queue.attributes.read().clone();
        let fifo_before = patched.fifo;
        mutate(&mut patched);

        if patched.fifo != fifo_before {
            self.record("sqs", "SetQueueAttributes", false);
            return Err(BusError::InvalidParameter(
                "fifo flag is immutable after creation".to_string(),
            ));
        }
        if let Some(policy) = &patched.redrive_policy {
            self.checkpoint(
                "sqs",
                "SetQueueAttributes",
                self.validate_redrive_target(policy, patched.fifo),
            )?;
        }

        *queue.attributes.write() = patched;
        self.record("sqs", "SetQueueAttributes", true);
        Ok(())
    }

    // ---------------------------------------------------------------- topic

    pub fn create_topic(&self, name: String) -> Result<String> {
        if let Some(existing) = self.topics.get(&name) {
            self.record("sns", "CreateTopic", true);
            return Ok(existing.arn.as_str().to_string());
        }
        let arn = self.topic_arn(&name);
        let topic = TopicCore::new(name.clone(), arn.clone(), TopicAttributes::default(), self.time.now());
        self.topics.insert(name, topic);
        self.record("sns", "CreateTopic", true);
        Ok(arn.as_str().to_string())
    }

    pub fn delete_topic(&self, name: &str) -> Result<()> {
        match self.topics.remove(name) {
            Some((_, topic)) => {
                for sub in topic.subscriptions() {
                    self.subscription_owner.remove(&sub.subscription_arn);
                }
                self.record("sns", "DeleteTopic", true);
                Ok(())
            }
            None => {
                self.record("sns", "DeleteTopic", false);
                Err(BusError::TopicNotFound(name.to_string()))
            }
        }
    }

    pub fn get_topic(&self, name: &str) -> Result<Arc<TopicCore>> {
        self.topics
            .get(name)
            .map(|e| e.value().clone())
            .ok_or_else(|| BusError::TopicNotFound(name.to_string()))
    }

    pub fn list_topics(
        &self,
        continuation_token: Option<&str>,
        max_results: usize,
    ) -> Result<(Vec<String>, Option<String>)> {
        let names: Vec<String> = self.topics.iter().map(|e| e.key().clone()).collect();
        let page = self.checkpoint(
            "sns",
            "ListTopics",
            paginate(names, |n| n.clone(), continuation_token, max_results),
        )?;
        self.record("sns", "ListTopics", true);
        Ok(page)
    }

    pub fn tag_topic(&self, topic_name: &str, tags: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        let topic = self.checkpoint("sns", "TagResource", self.get_topic(topic_name))?;
        topic.attributes.lock().tags.extend(tags);
        self.record("sns", "TagResource", true);
        Ok(())
    }

    pub fn get_topic_attributes(&self, topic_name: &str) -> Result<TopicAttributes> {
        let topic = self.checkpoint("sns", "GetTopicAttributes", self.get_topic(topic_name))?;
        let attrs = topic.attributes.lock().clone();
        self.record("sns", "GetTopicAttributes", true);
        Ok(attrs)
    }

    pub fn set_topic_attributes(
        &self,
        topic_name: &str,
        mutate: impl FnOnce(&mut TopicAttributes),
    ) -> Result<()> {
        let topic = self.checkpoint("sns", "SetTopicAttributes", self.get_topic(topic_name))?;
        mutate(&mut topic.attributes.lock());
        self.record("sns", "SetTopicAttributes", true);
        Ok(())
    }

    /// Appends a statement to the topic's `Policy` document under `sid`
    /// (§4.2 Permissions), rejecting a duplicate `Sid`.
    pub fn add_permission(&self, topic_name: &str, sid: String, statement: serde_json::Value) -> Result<()> {
        let topic = self.checkpoint("sns", "AddPermission", self.get_topic(topic_name))?;
        let mut attrs = topic.attributes.lock();
        let mut doc = attrs
            .policy
            .clone()
            .unwrap_or_else(|| json!({"Version": "2012-10-17", "Statement": []}));

        let Some(mut entry) = statement.as_object().cloned() else {
            self.record("sns", "AddPermission", false);
            return Err(BusError::InvalidParameter("permission statement must be a JSON object".to_string()));
        };

        let statements = doc
            .get_mut("Statement")
            .and_then(|s| s.as_array_mut())
            .ok_or_else(|| BusError::InternalError("malformed policy document".to_string()))?;
        if statements.iter().any(|s| s.get("Sid").and_then(|v| v.as_str()) == Some(sid.as_str())) {
            self.record("sns", "AddPermission", false);
            return Err(BusError::InvalidParameter(format!("a statement with Sid {sid} already exists")));
        }

        entry.insert("Sid".to_string(), json!(sid));
        statements.push(serde_json::Value::Object(entry));
        attrs.policy = Some(doc);
        self.record("sns", "AddPermission", true);
        Ok(())
    }

    /// Removes the statement keyed by `sid`; deletes the `Policy` attribute
    /// entirely once no statements remain (§4.2 Permissions).
    pub fn remove_permission(&self, topic_name: &str, sid: &str) -> Result<()> {
        let topic = self.checkpoint("sns", "RemovePermission", self.get_topic(topic_name))?;
        let mut attrs = topic.attributes.lock();
        let Some(mut doc) = attrs.policy.clone() else {
            self.record("sns", "RemovePermission", false);
            return Err(BusError::InvalidParameter(format!("no statement with Sid {sid}")));
        };

        let removed = {
            let statements = doc
                .get_mut("Statement")
                .and_then(|s| s.as_array_mut())
                .ok_or_else(|| BusError::InternalError("malformed policy document".to_string()))?;
            let before = statements.len();
            statements.retain(|s| s.get("Sid").and_then(|v| v.as_str()) != Some(sid));
            before != statements.len()
        };
        if !removed {
            self.record("sns", "RemovePermission", false);
            return Err(BusError::InvalidParameter(format!("no statement with Sid {sid}")));
        }

        let now_empty = doc.get("Statement").and_then(|s| s.as_array()).map_or(true, |a| a.is_empty());
        attrs.policy = if now_empty { None } else { Some(doc) };
        self.record("sns", "RemovePermission", true);
        Ok(())
    }

    pub fn subscribe(
        &self,
        topic_name: &str,
        protocol: &str,
        endpoint_arn: Arn,
        raw: bool,
        filter_policy_json: Option<String>,
    ) -> Result<String> {
        let topic = self.checkpoint("sns", "Subscribe", self.get_topic(topic_name))?;
        let Some(protocol) = Protocol::parse(protocol) else {
            self.record("sns", "Subscribe", false);
            return Err(BusError::UnsupportedOperation(format!(
                "unsupported subscription protocol: {protocol}"
            )));
        };

        let endpoint_name = self.checkpoint("sns", "Subscribe", endpoint_arn.name())?;
        if !self.queues.contains_key(endpoint_name) {
            self.record("sns", "Subscribe", false);
            return Err(BusError::QueueDoesNotExist(endpoint_arn.as_str().to_string()));
        }

        let compiled_filter = match &filter_policy_json {
            Some(json) => Some(self.checkpoint(
                "sns",
                "Subscribe",
                crate::filter::CompiledFilterPolicy::compile(json),
            )?),
            None => None,
        };

        let subscription_arn = self.checkpoint(
            "sns",
            "Subscribe",
            Arn::parse(&format!("{}:{}", topic.arn.as_str(), Uuid::new_v4())),
        )?;
        let subscription = Arc::new(Subscription {
            subscription_arn: subscription_arn.clone(),
            topic_arn: topic.arn.clone(),
            protocol,
            endpoint: endpoint_arn,
            raw,
            filter_policy_json,
            compiled_filter,
        });
        topic.add_subscription(subscription);
        self.subscription_owner.insert(subscription_arn.clone(), topic.arn.clone());
        self.record("sns", "Subscribe", true);
        Ok(subscription_arn.as_str().to_string())
    }

    pub fn unsubscribe(&self, subscription_arn: &Arn) -> Result<()> {
        let Some((_, topic_arn)) = self.subscription_owner.remove(subscription_arn) else {
            self.record("sns", "Unsubscribe", false);
            return Err(BusError::SubscriptionNotFound(subscription_arn.as_str().to_string()));
        };
        let topic_name = self.checkpoint("sns", "Unsubscribe", topic_arn.name())?;
        if let Some(topic) = self.topics.get(topic_name) {
            topic.remove_subscription(subscription_arn);
        }
        self.record("sns", "Unsubscribe", true);
        Ok(())
    }

    pub fn set_subscription_filter_policy(
        &self,
        subscription_arn: &Arn,
        filter_policy_json: Option<String>,
    ) -> Result<()> {
        let topic_arn = self.checkpoint(
            "sns",
            "SetSubscriptionAttributes",
            self.subscription_owner
                .get(subscription_arn)
                .map(|e| e.value().clone())
                .ok_or_else(|| BusError::SubscriptionNotFound(subscription_arn.as_str().to_string())),
        )?;
        let topic_name = self.checkpoint("sns", "SetSubscriptionAttributes", topic_arn.name())?;
        let topic = self.checkpoint("sns", "SetSubscriptionAttributes", self.get_topic(topic_name))?;
        let existing = self.checkpoint(
            "sns",
            "SetSubscriptionAttributes",
            topic
                .subscription(subscription_arn)
                .ok_or_else(|| BusError::SubscriptionNotFound(subscription_arn.as_str().to_string())),
        )?;
        let compiled_filter = match &filter_policy_json {
            Some(json) => Some(self.checkpoint(
                "sns",
                "SetSubscriptionAttributes",
                crate::filter::CompiledFilterPolicy::compile(json),
            )?),
            None => None,
        };
        let updated = Arc::new(Subscription {
            filter_policy_json,
            compiled_filter,
            ..(*existing).clone()
        });
        topic.replace_subscription(updated);
        self.record("sns", "SetSubscriptionAttributes", true);
        Ok(())
    }

    pub fn publish(&self, topic_name: &str, input: PublishInput) -> Result<String> {
        self.checkpoint("sns", "Publish", topic::check_single_size(&input))?;
        let topic = self.checkpoint("sns", "Publish", self.get_topic(topic_name))?;
        let message_id = Uuid::new_v4().to_string();
        let timestamp = self.time.now();

        for subscription in topic.plan().iter() {
            let Some(send_input) =
                topic::deliver_to(subscription, &topic.arn, &message_id, &input, timestamp)
            else {
                continue;
            };
            match self.resolve_queue_by_arn(&subscription.endpoint) {
                Some(destination) => {
                    if let Err(e) = destination.send(send_input) {
                        tracing::warn!(
                            subscription = %subscription.subscription_arn,
                            destination = %subscription.endpoint,
                            error = %e,
                            "failed to deliver published message to subscribed queue"
                        );
                    }
                }
                None => {
                    tracing::warn!(
                        subscription = %subscription.subscription_arn,
                        destination = %subscription.endpoint,
                        "subscribed queue no longer exists, message dropped"
                    );
                }
            }
        }

        self.record("sns", "Publish", true);
        Ok(message_id)
    }

    pub fn publish_batch(&self, topic_name: &str, entries: Vec<PublishBatchEntry>) -> Result<PublishBatchResult> {
        if entries.is_empty() {
            self.record("sns", "PublishBatch", false);
            return Err(BusError::EmptyBatchRequest);
        }
        if entries.len() > MAX_BATCH_ENTRIES {
            self.record("sns", "PublishBatch", false);
            return Err(BusError::TooManyEntriesInBatchRequest(entries.len()));
        }
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.id.clone()) {
                self.record("sns", "PublishBatch", false);
                return Err(BusError::BatchEntryIdsNotDistinct);
            }
        }

        let mut result = PublishBatchResult::default();
        let mut valid_entries = Vec::new();
        for entry in entries {
            match topic::check_single_size(&entry.input) {
                Ok(()) => valid_entries.push(entry),
                Err(error) => result.failed.push(PublishBatchFailure { id: entry.id, error }),
            }
        }

        let refs: Vec<&PublishInput> = valid_entries.iter().map(|e| &e.input).collect();
        self.checkpoint("sns", "PublishBatch", topic::check_batch_size(&refs))?;

        for entry in valid_entries {
            match self.publish(topic_name, entry.input) {
                Ok(message_id) => result.successful.push(PublishBatchSuccess { id: entry.id, message_id }),
                Err(error) => result.failed.push(PublishBatchFailure { id: entry.id, error }),
            }
        }
        self.record("sns", "PublishBatch", result.failed.is_empty());
        Ok(result)
    }

    // ------------------------------------------------------------ move task

    pub fn start_move_task(
        self: &Arc<Self>,
        source_queue_name: &str,
        destination_queue_name: Option<&str>,
        rate_limit_per_second: u32,
    ) -> Result<String> {
        let source = self.checkpoint("sqs", "StartMessageMoveTask", self.get_queue(source_queue_name))?;

        let is_dlq = self.queues.iter().any(|entry| {
            entry
                .value()
                .attributes
                .read()
                .redrive_policy
                .as_ref()
                .is_some_and(|p| p.dead_letter_target_arn == source.arn)
        });
        if !is_dlq {
            self.record("sqs", "StartMessageMoveTask", false);
            return Err(BusError::InvalidParameter(format!(
                "{source_queue_name} is not configured as a dead-letter queue"
            )));
        }

        let already_running = self.move_tasks.iter().any(|entry| {
            entry.value().source_queue_arn == source.arn
                && entry.value().status() == MoveTaskStatus::Running
        });
        if already_running {
            self.record("sqs", "StartMessageMoveTask", false);
            return Err(BusError::UnsupportedOperation(format!(
                "a move task is already running for {source_queue_name}"
            )));
        }

        let destination_arn = self.checkpoint(
            "sqs",
            "StartMessageMoveTask",
            destination_queue_name
                .map(|name| self.get_queue(name).map(|q| q.arn.clone()))
                .transpose(),
        )?;

        let task_handle = Uuid::new_v4().to_string();
        let to_move = source.approximate_number_of_messages() as u64;
        let task = Arc::new(MoveTask::new(
            task_handle.clone(),
            source.arn.clone(),
            destination_arn,
            rate_limit_per_second,
            to_move,
        ));
        self.move_tasks.insert(task_handle.clone(), Arc::clone(&task));

        let cancel = CancellationToken::new();
        self.move_task_cancel.insert(task_handle.clone(), cancel.clone());

        let bus = Arc::clone(self);
        let resolver: QueueResolver = Arc::new(move |target: &Arn| bus.resolve_queue_by_arn(target));

        tokio::spawn(move_task::run(task, source, Arc::clone(&self.time), resolver, cancel));
        self.record("sqs", "StartMessageMoveTask", true);
        Ok(task_handle)
    }

    pub fn cancel_move_task(&self, task_handle: &str) -> Result<()> {
        let task = self.checkpoint(
            "sqs",
            "CancelMessageMoveTask",
            self.move_tasks
                .get(task_handle)
                .map(|e| e.value().clone())
                .ok_or_else(|| BusError::MoveTaskNotFound(task_handle.to_string())),
        )?;
        task.set_status(MoveTaskStatus::Cancelling);
        if let Some(cancel) = self.move_task_cancel.get(task_handle) {
            cancel.cancel();
        }
        self.record("sqs", "CancelMessageMoveTask", true);
        Ok(())
    }

    pub fn list_message_move_tasks(&self, source_queue_name: Option<&str>) -> Result<Vec<Arc<MoveTask>>> {
        let source_arn = source_queue_name.map(|n| self.queue_arn(n));
        let tasks = self
            .move_tasks
            .iter()
            .filter(|e| source_arn.as_ref().map_or(true, |arn| &e.value().source_queue_arn == arn))
            .map(|e| e.value().clone())
            .collect();
        self.record("sqs", "ListMessageMoveTasks", true);
        Ok(tasks)
    }
}

fn queue_attributes_equivalent(a: &QueueAttributes, b: &QueueAttributes) -> bool {
    a.fifo == b.fifo
        && a.visibility_timeout == b.visibility_timeout
        && a.redrive_policy == b.redrive_policy
        && a.deduplication_scope == b.deduplication_scope
        && a.throughput_limit == b.throughput_limit
}
