// QueueCore (§2, §4.1): ready structure, in-flight map, FIFO group map with
// per-group locks, deduplication maps, visibility-timeout policy, redrive
// policy, and attributes/tags.

use crate::arn::Arn;
use crate::error::{BusError, Result};
use crate::model::{
    Message, MessageAttributes, QueueAttributes, ReceiptHandle, RedrivePolicy, SystemAttributes,
    MAX_MESSAGE_BYTES,
};
use crate::queue::group::FifoGroup;
use crate::queue::visibility::InFlightEntry;
use crate::sequence::SequenceGenerator;
use crate::time::{CancellationToken, TimeProvider};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SendInput {
    pub body: String,
    pub message_attributes: MessageAttributes,
    pub delay_seconds: u32,
    pub message_group_id: Option<String>,
    pub message_deduplication_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendOutput {
    pub message_id: String,
    pub md5_of_body: String,
    pub sequence_number: Option<u128>,
}

#[derive(Debug, Clone)]
pub struct ReceiveInput {
    pub max_number_of_messages: usize,
    pub visibility_timeout: Option<Duration>,
    pub wait_time: Duration,
}

#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message: Message,
    pub receipt_handle: String,
}

pub struct QueueCore {
    pub name: String,
    pub arn: Arn,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub attributes: RwLock<QueueAttributes>,
    ready: SegQueue<Message>,
    fifo_groups: DashMap<String, Arc<Mutex<FifoGroup>>>,
    in_flight: DashMap<String, InFlightEntry>,
    dedup: DashMap<String, String>,
    delayed_count: AtomicUsize,
    sent_total: AtomicU64,
    deleted_total: AtomicU64,
    dlq_out_total: AtomicU64,
    purging: std::sync::atomic::AtomicBool,
    sequence: Arc<SequenceGenerator>,
    time: Arc<dyn TimeProvider>,
    notify: Notify,
}

impl QueueCore {
    pub fn new(
        name: String,
        arn: Arn,
        url: String,
        attributes: QueueAttributes,
        sequence: Arc<SequenceGenerator>,
        time: Arc<dyn TimeProvider>,
        created_at: DateTime<Utc>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            arn,
            url,
            created_at,
            attributes: RwLock::new(attributes),
            ready: SegQueue::new(),
            fifo_groups: DashMap::new(),
            in_flight: DashMap::new(),
            dedup: DashMap::new(),
            delayed_count: AtomicUsize::new(0),
            sent_total: AtomicU64::new(0),
            deleted_total: AtomicU64::new(0),
            dlq_out_total: AtomicU64::new(0),
            purging: std::sync::atomic::AtomicBool::new(false),
            sequence,
            time,
            notify: Notify::new(),
        })
    }

    pub fn is_fifo(&self) -> bool {
        self.attributes.read().fifo
    }

    // ---- computed attributes (§3) ----

    pub fn approximate_number_of_messages(&self) -> usize {
        let standard = self.ready.len();
        let fifo: usize = self
            .fifo_groups
            .iter()
            .map(|g| g.value().lock().messages.len())
            .sum();
        standard + fifo
    }

    pub fn approximate_number_not_visible(&self) -> usize {
        self.in_flight.len()
    }

    pub fn approximate_number_delayed(&self) -> usize {
        self.delayed_count.load(Ordering::SeqCst)
    }

    pub fn totals(&self) -> (u64, u64, u64) {
        (
            self.sent_total.load(Ordering::SeqCst),
            self.deleted_total.load(Ordering::SeqCst),
            self.dlq_out_total.load(Ordering::SeqCst),
        )
    }

    // ---- send (§4.1.2) ----

    pub fn send(self: &Arc<Self>, input: SendInput) -> Result<SendOutput> {
        let (fifo, dedup_scope, is_fair) = {
            let attrs = self.attributes.read();
            (attrs.fifo, attrs.deduplication_scope, attrs.is_fair_fifo())
        };

        if fifo && input.message_group_id.is_none() {
            return Err(BusError::InvalidParameter(
                "FIFO queues require MessageGroupId".into(),
            ));
        }

        let size = Message::size_bytes(&input.body, &input.message_attributes);
        if size > MAX_MESSAGE_BYTES {
            return Err(BusError::MessageTooLarge(size));
        }

        let message_id = Uuid::new_v4().to_string();
        let md5_of_body = Message::md5_hex(&input.body);

        if fifo {
            let dedup_id = input
                .message_deduplication_id
                .clone()
                .unwrap_or_else(|| derive_dedup_id(&input.body));

            use crate::model::DeduplicationScope;
            let existing = if is_fair {
                self.group_dedup_try_insert(
                    input.message_group_id.as_deref().unwrap(),
                    &dedup_id,
                    &message_id,
                )
            } else if dedup_scope == DeduplicationScope::Queue || !is_fair {
                self.dedup_try_insert(&dedup_id, &message_id)
            } else {
                None
            };

            if let Some(existing_message_id) = existing {
                return Ok(SendOutput {
                    message_id: existing_message_id,
                    md5_of_body,
                    sequence_number: None,
                });
            }

            let mut message = Message {
                message_id: message_id.clone(),
                body: input.body,
                md5_of_body: md5_of_body.clone(),
                message_attributes: input.message_attributes,
                system_attributes: SystemAttributes::default(),
            };
            let seq = self.sequence.next();
            message.system_attributes.sequence_number = Some(seq);
            message.system_attributes.message_group_id = input.message_group_id.clone();
            message.system_attributes.message_deduplication_id = Some(dedup_id);
            message.system_attributes.sent_timestamp = Some(self.time.now());
            self.enqueue_fifo(input.message_group_id.unwrap(), message);
            self.sent_total.fetch_add(1, Ordering::SeqCst);
            return Ok(SendOutput {
                message_id,
                md5_of_body,
                sequence_number: Some(seq),
            });
        }

        let message = Message {
            message_id: message_id.clone(),
            body: input.body,
            md5_of_body: md5_of_body.clone(),
            message_attributes: input.message_attributes,
            system_attributes: SystemAttributes::default(),
        };

        if input.delay_seconds > 0 {
            self.schedule_delayed_send(message, Duration::from_secs(input.delay_seconds as u64));
        } else {
            self.enqueue_ready(message);
        }
        self.sent_total.fetch_add(1, Ordering::SeqCst);
        Ok(SendOutput {
            message_id,
            md5_of_body,
            sequence_number: None,
        })
    }

    fn dedup_try_insert(&self, dedup_id: &str, message_id: &str) -> Option<String> {
        use dashmap::mapref::entry::Entry;
        match self.dedup.entry(dedup_id.to_string()) {
            Entry::Occupied(e) => Some(e.get().clone()),
            Entry::Vacant(e) => {
                e.insert(message_id.to_string());
                None
            }
        }
    }

    fn group_dedup_try_insert(&self, group_id: &str, dedup_id: &str, message_id: &str) -> Option<String> {
        let group_arc = self
            .fifo_groups
            .entry(group_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(FifoGroup::default())))
            .clone();
        let mut group = group_arc.lock();
        if let Some(existing) = group.dedup.get(dedup_id) {
            return Some(existing.clone());
        }
        group.dedup.insert(dedup_id.to_string(), message_id.to_string());
        None
    }

    fn enqueue_fifo(&self, group_id: String, message: Message) {
        let group_arc = self
            .fifo_groups
            .entry(group_id)
            .or_insert_with(|| Arc::new(Mutex::new(FifoGroup::default())))
            .clone();
        group_arc.lock().messages.push_back(message);
        self.notify.notify_one();
    }

    fn enqueue_ready(&self, mut message: Message) {
        message.system_attributes.sent_timestamp = Some(self.time.now());
        self.ready.push(message);
        self.notify.notify_one();
    }

    fn schedule_delayed_send(self: &Arc<Self>, message: Message, delay: Duration) {
        self.delayed_count.fetch_add(1, Ordering::SeqCst);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.time.sleep(delay).await;
            this.delayed_count.fetch_sub(1, Ordering::SeqCst);
            this.enqueue_ready(message);
        });
    }

    /// Enqueue a message carrying the redrive rules of §4.1.7: strips the
    /// receive-lifecycle system attributes, requires `MessageGroupId` on
    /// FIFO targets, and otherwise behaves exactly like a normal send. Used
    /// both for receive-pipeline DLQ redirection and by the move worker.
    pub fn enqueue_from_redrive(self: &Arc<Self>, mut message: Message) -> Result<()> {
        message.strip_receive_lifecycle();
        let fifo = self.is_fifo();
        if fifo {
            let group_id = message
                .system_attributes
                .message_group_id
                .clone()
                .ok_or_else(|| {
                    BusError::InvalidParameter(
                        "FIFO queue requires MessageGroupId on redriven message".into(),
                    )
                })?;
            let seq = self.sequence.next();
            message.system_attributes.sequence_number = Some(seq);
            message.system_attributes.sent_timestamp = Some(self.time.now());
            self.enqueue_fifo(group_id, message);
        } else {
            self.enqueue_ready(message);
        }
        self.sent_total.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    // ---- receive (§4.1.3) ----

    pub async fn receive(
        self: &Arc<Self>,
        input: ReceiveInput,
        cancel: CancellationToken,
        redrive_sink: &(dyn Fn(&Arn, Message) + Send + Sync),
    ) -> Vec<ReceivedMessage> {
        let max = input.max_number_of_messages.max(1);
        let mut out = self.drain_once(max, input.visibility_timeout, redrive_sink);
        if out.is_empty() && input.wait_time > Duration::ZERO && !cancel.is_cancelled() {
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = self.time.sleep(input.wait_time) => {}
                _ = cancel.cancelled() => { return out; }
            }
            out = self.drain_once(max, input.visibility_timeout, redrive_sink);
        }
        out
    }

    fn drain_once(
        self: &Arc<Self>,
        max: usize,
        visibility_timeout: Option<Duration>,
        redrive_sink: &(dyn Fn(&Arn, Message) + Send + Sync),
    ) -> Vec<ReceivedMessage> {
        let (fifo, vis_timeout, redrive_policy) = {
            let attrs = self.attributes.read();
            (
                attrs.fifo,
                visibility_timeout.unwrap_or(attrs.visibility_timeout),
                attrs.redrive_policy.clone(),
            )
        };

        let mut out = Vec::new();
        if fifo {
            for group_ref in self.fifo_groups.iter() {
                if out.len() >= max {
                    break;
                }
                let group_arc = group_ref.value().clone();
                let group_id = group_ref.key().clone();
                let mut group = group_arc.lock();
                if group.in_flight_count > 0 {
                    continue;
                }
                while out.len() < max {
                    let Some(msg) = group.messages.pop_front() else {
                        break;
                    };
                    match self.process_candidate(
                        msg,
                        &redrive_policy,
                        vis_timeout,
                        Some(group_id.clone()),
                        redrive_sink,
                    ) {
                        Some(received) => {
                            group.in_flight_count += 1;
                            out.push(received);
                        }
                        None => {}
                    }
                }
            }
        } else {
            while out.len() < max {
                let Some(msg) = self.ready.pop() else {
                    break;
                };
                if let Some(received) =
                    self.process_candidate(msg, &redrive_policy, vis_timeout, None, redrive_sink)
                {
                    out.push(received);
                }
            }
        }
        out
    }

    fn process_candidate(
        self: &Arc<Self>,
        mut message: Message,
        redrive_policy: &Option<RedrivePolicy>,
        vis_timeout: Duration,
        group_id: Option<String>,
        redrive_sink: &(dyn Fn(&Arn, Message) + Send + Sync),
    ) -> Option<ReceivedMessage> {
        if let Some(policy) = redrive_policy {
            if message.system_attributes.approximate_receive_count >= policy.max_receive_count {
                message.system_attributes.dead_letter_queue_source_arn =
                    Some(self.arn.as_str().to_string());
                tracing::warn!(
                    source = %self.arn,
                    target = %policy.dead_letter_target_arn,
                    receive_count = message.system_attributes.approximate_receive_count,
                    "redirecting message to dead-letter queue after max receives"
                );
                self.dlq_out_total.fetch_add(1, Ordering::SeqCst);
                redrive_sink(&policy.dead_letter_target_arn, message);
                return None;
            }
        }

        message.system_attributes.approximate_receive_count += 1;
        if message.system_attributes.approximate_first_receive_timestamp.is_none() {
            message.system_attributes.approximate_first_receive_timestamp = Some(self.time.now());
        }

        let handle = ReceiptHandle::new(self.arn.clone(), message.message_id.clone(), self.time.now());
        let key = handle.token.to_string();
        let encoded = handle.encode();
        let timer = self.spawn_visibility_timer(key.clone(), vis_timeout);
        self.in_flight.insert(
            key,
            InFlightEntry {
                message: message.clone(),
                group_id,
                timer,
            },
        );
        Some(ReceivedMessage {
            message,
            receipt_handle: encoded,
        })
    }

    fn spawn_visibility_timer(self: &Arc<Self>, key: String, duration: Duration) -> tokio::task::JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.time.sleep(duration).await;
            if this.resolve_in_flight(&key, true).is_some() {
                tracing::debug!(queue = %this.arn, "visibility timeout expired, message requeued");
            }
        })
    }

    /// Only the first of (timer-fire, delete, changeVisibility(0)) to remove
    /// the entry acts (§4.1.5); `DashMap::remove` is the race-free gate.
    fn resolve_in_flight(&self, key: &str, requeue: bool) -> Option<()> {
        let (_, entry) = self.in_flight.remove(key)?;
        entry.timer.abort();
        match entry.group_id {
            Some(group_id) => {
                if let Some(group_ref) = self.fifo_groups.get(&group_id) {
                    let group_arc = group_ref.value().clone();
                    drop(group_ref);
                    let mut group = group_arc.lock();
                    group.in_flight_count = group.in_flight_count.saturating_sub(1);
                    if requeue {
                        group.messages.push_front(entry.message);
                    }
                    if group.is_idle_and_empty() {
                        group.dedup.clear();
                    }
                }
            }
            None => {
                if requeue {
                    self.ready.push(entry.message);
                }
            }
        }
        if requeue {
            self.notify.notify_one();
        }
        Some(())
    }

    // ---- delete / change-visibility (§4.1.4, §4.1.5) ----

    pub fn delete_message(&self, receipt_handle: &str) -> Result<()> {
        let handle = ReceiptHandle::decode(receipt_handle)?;
        if handle.queue_arn != self.arn {
            return Err(BusError::ReceiptHandleIsInvalid);
        }
        let key = handle.token.to_string();
        if self.resolve_in_flight(&key, false).is_some() {
            self.deleted_total.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            Err(BusError::ReceiptHandleIsInvalid)
        }
    }

    pub fn change_message_visibility(self: &Arc<Self>, receipt_handle: &str, new_timeout: Duration) -> Result<()> {
        let handle = ReceiptHandle::decode(receipt_handle)?;
        if handle.queue_arn != self.arn {
            return Err(BusError::ReceiptHandleIsInvalid);
        }
        let key = handle.token.to_string();
        if new_timeout.is_zero() {
            if self.resolve_in_flight(&key, true).is_some() {
                Ok(())
            } else {
                Err(BusError::ReceiptHandleIsInvalid)
            }
        } else {
            match self.in_flight.get_mut(&key) {
                Some(mut entry) => {
                    entry.timer.abort();
                    entry.timer = self.spawn_visibility_timer(key.clone(), new_timeout);
                    Ok(())
                }
                None => Err(BusError::ReceiptHandleIsInvalid),
            }
        }
    }

    /// Pull one message off the front of the queue for the move worker
    /// (§4.3), bypassing the receive pipeline entirely — no receipt handle,
    /// no receive-count increment. The source is, by invariant, a DLQ.
    pub fn drain_one_for_move(&self) -> Option<Message> {
        if self.is_fifo() {
            for group_ref in self.fifo_groups.iter() {
                let group_arc = group_ref.value().clone();
                let mut group = group_arc.lock();
                if let Some(msg) = group.messages.pop_front() {
                    return Some(msg);
                }
            }
            None
        } else {
            self.ready.pop()
        }
    }

    // ---- purge (§4.1.6) ----

    pub fn purge(&self) -> Result<()> {
        if self.purging.swap(true, Ordering::SeqCst) {
            return Err(BusError::PurgeQueueInProgress);
        }
        while self.ready.pop().is_some() {}
        for entry in self.in_flight.iter() {
            entry.value().timer.abort();
        }
        self.in_flight.clear();
        self.dedup.clear();
        self.fifo_groups.clear();
        self.purging.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn derive_dedup_id(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    BASE64.encode(digest)
}
