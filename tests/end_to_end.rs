// End-to-end scenarios driven entirely through `MessageBus`'s public surface.

use bus_emulator::{BusConfig, MessageBus};
use bus_emulator::arn::Arn;
use bus_emulator::bus::{PublishBatchEntry, PublishBatchResult};
use bus_emulator::error::BusError;
use bus_emulator::model::{MessageAttributes, QueueAttributes, RedrivePolicy};
use bus_emulator::queue::{ReceiveInput, SendInput};
use bus_emulator::time::{CancellationToken, FakeClock};
use bus_emulator::topic::PublishInput;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn test_bus() -> (Arc<MessageBus>, Arc<FakeClock>) {
    let clock = FakeClock::epoch();
    let bus = MessageBus::new(BusConfig::default(), clock.clone());
    (bus, clock)
}

fn send_input(body: &str) -> SendInput {
    SendInput {
        body: body.to_string(),
        message_attributes: MessageAttributes::new(),
        delay_seconds: 0,
        message_group_id: None,
        message_deduplication_id: None,
    }
}

fn receive_once(max: usize) -> ReceiveInput {
    ReceiveInput {
        max_number_of_messages: max,
        visibility_timeout: None,
        wait_time: Duration::ZERO,
    }
}

// Basic send/receive/delete on a standard queue, raw body round-trip and
// md5OfBody correctness.
#[tokio::test]
async fn standard_queue_round_trip_preserves_body_and_md5() {
    let (bus, _clock) = test_bus();
    bus.create_queue("orders".into(), QueueAttributes::default()).unwrap();

    let sent = bus.send_message("orders", send_input("hello world")).unwrap();
    assert_eq!(sent.md5_of_body, bus_emulator::model::Message::md5_hex("hello world"));

    let received = bus
        .receive_message("orders", receive_once(10), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].message.body, "hello world");
    assert_eq!(received[0].message.md5_of_body, sent.md5_of_body);
    assert_eq!(received[0].message.system_attributes.approximate_receive_count, 1);

    bus.delete_message("orders", &received[0].receipt_handle).unwrap();
    assert_eq!(bus.get_queue("orders").unwrap().approximate_number_of_messages(), 0);
}

// FIFO ordering within a single message group is preserved through the bus
// facade, and each successful send mints an increasing sequence number.
#[tokio::test]
async fn fifo_queue_preserves_group_order_through_the_facade() {
    let (bus, _clock) = test_bus();
    bus.create_queue("orders.fifo".into(), QueueAttributes::default()).unwrap();

    for body in ["first", "second", "third"] {
        let mut input = send_input(body);
        input.message_group_id = Some("group-a".into());
        bus.send_message("orders.fifo", input).unwrap();
    }

    let received = bus
        .receive_message("orders.fifo", receive_once(10), CancellationToken::new())
        .await
        .unwrap();
    let bodies: Vec<&str> = received.iter().map(|r| r.message.body.as_str()).collect();
    assert_eq!(bodies, vec!["first", "second", "third"]);
}

// A FIFO send with a duplicate deduplication id returns the original
// messageId rather than enqueuing a second copy.
#[tokio::test]
async fn duplicate_deduplication_id_returns_the_first_message_id() {
    let (bus, _clock) = test_bus();
    bus.create_queue("dedup.fifo".into(), QueueAttributes::default()).unwrap();

    let mut input = send_input("payload");
    input.message_group_id = Some("group-a".into());
    input.message_deduplication_id = Some("dedupe-1".into());
    let first = bus.send_message("dedup.fifo", input.clone()).unwrap();
    let second = bus.send_message("dedup.fifo", input).unwrap();

    assert_eq!(first.message_id, second.message_id);
    assert_eq!(bus.get_queue("dedup.fifo").unwrap().approximate_number_of_messages(), 1);
}

// After maxReceiveCount deliveries a message is redirected to the
// configured dead-letter queue instead of being redelivered again.
#[tokio::test]
async fn message_is_redriven_to_dead_letter_queue_after_max_receives() {
    let (bus, clock) = test_bus();
    bus.create_queue("dlq".into(), QueueAttributes::default()).unwrap();

    let mut main_attrs = QueueAttributes::default();
    main_attrs.redrive_policy = Some(RedrivePolicy {
        dead_letter_target_arn: Arn::queue("aws", "us-east-1", "000000000000", "dlq"),
        max_receive_count: 2,
    });
    bus.create_queue("main".into(), main_attrs).unwrap();

    bus.send_message("main", send_input("retry-me")).unwrap();

    let short_visibility = ReceiveInput {
        max_number_of_messages: 1,
        visibility_timeout: Some(Duration::from_secs(1)),
        wait_time: Duration::ZERO,
    };

    for expected_count in 1..=2u32 {
        let received = bus
            .receive_message("main", short_visibility.clone(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(received.len(), 1, "delivery {expected_count} should succeed from main");
        assert_eq!(received[0].message.system_attributes.approximate_receive_count, expected_count);
        clock.advance(Duration::from_secs(2));
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
    }

    // Third attempt after the second visibility expiry must find nothing
    // left on main - it was redirected to the DLQ instead.
    let after_dlq = bus
        .receive_message("main", short_visibility, CancellationToken::new())
        .await
        .unwrap();
    assert!(after_dlq.is_empty());

    let dlq_messages = bus
        .receive_message("dlq", receive_once(10), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(dlq_messages.len(), 1);
    assert_eq!(dlq_messages[0].message.body, "retry-me");
    assert_eq!(
        dlq_messages[0].message.system_attributes.dead_letter_queue_source_arn,
        Some(Arn::queue("aws", "us-east-1", "000000000000", "main").as_str().to_string())
    );

    let (sent, _deleted, dlq_out) = bus.get_queue("main").unwrap().totals();
    assert_eq!(sent, 1);
    assert_eq!(dlq_out, 1);
}

// Raw delivery carries the published body through to the subscribed queue
// verbatim; only one queue message is produced per matching subscription.
#[tokio::test]
async fn topic_publish_delivers_raw_body_to_a_single_subscribed_queue() {
    let (bus, _clock) = test_bus();
    bus.create_queue("notifications".into(), QueueAttributes::default()).unwrap();
    bus.create_topic("alerts".into()).unwrap();

    let queue_arn = Arn::queue("aws", "us-east-1", "000000000000", "notifications");
    bus.subscribe("alerts", "sqs", queue_arn, true, None).unwrap();

    bus.publish(
        "alerts",
        PublishInput {
            message: "raw payload".into(),
            subject: None,
            message_attributes: MessageAttributes::new(),
            message_group_id: None,
            message_deduplication_id: None,
        },
    )
    .unwrap();

    let received = bus
        .receive_message("notifications", receive_once(10), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].message.body, "raw payload");
}

// Non-raw delivery wraps the message in the SNS notification envelope JSON.
#[tokio::test]
async fn topic_publish_wraps_message_in_envelope_when_not_raw() {
    let (bus, _clock) = test_bus();
    bus.create_queue("notifications".into(), QueueAttributes::default()).unwrap();
    bus.create_topic("alerts".into()).unwrap();

    let queue_arn = Arn::queue("aws", "us-east-1", "000000000000", "notifications");
    bus.subscribe("alerts", "sqs", queue_arn, false, None).unwrap();

    bus.publish(
        "alerts",
        PublishInput {
            message: "enveloped payload".into(),
            subject: Some("heads up".into()),
            message_attributes: MessageAttributes::new(),
            message_group_id: None,
            message_deduplication_id: None,
        },
    )
    .unwrap();

    let received = bus
        .receive_message("notifications", receive_once(10), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(received.len(), 1);
    let envelope: serde_json::Value = serde_json::from_str(&received[0].message.body).unwrap();
    assert_eq!(envelope["Type"], "Notification");
    assert_eq!(envelope["Message"], "enveloped payload");
    assert_eq!(envelope["Subject"], "heads up");
    assert_eq!(envelope["TopicArn"], "arn:aws:sns:us-east-1:000000000000:alerts");
}

// A non-matching filter policy suppresses delivery to that subscription
// without affecting other subscriptions on the same topic.
#[tokio::test]
async fn filter_policy_suppresses_non_matching_deliveries() {
    let (bus, _clock) = test_bus();
    bus.create_queue("matches".into(), QueueAttributes::default()).unwrap();
    bus.create_queue("all".into(), QueueAttributes::default()).unwrap();
    bus.create_topic("events".into()).unwrap();

    let matches_arn = Arn::queue("aws", "us-east-1", "000000000000", "matches");
    let all_arn = Arn::queue("aws", "us-east-1", "000000000000", "all");
    bus.subscribe(
        "events",
        "sqs",
        matches_arn,
        true,
        Some(r#"{"eventType": ["order.created"]}"#.to_string()),
    )
    .unwrap();
    bus.subscribe("events", "sqs", all_arn, true, None).unwrap();

    let mut attrs = MessageAttributes::new();
    attrs.insert(
        "eventType".into(),
        bus_emulator::model::MessageAttributeValue::string("String", "order.shipped"),
    );
    bus.publish(
        "events",
        PublishInput {
            message: "shipped".into(),
            subject: None,
            message_attributes: attrs,
            message_group_id: None,
            message_deduplication_id: None,
        },
    )
    .unwrap();

    let matches_received = bus
        .receive_message("matches", receive_once(10), CancellationToken::new())
        .await
        .unwrap();
    assert!(matches_received.is_empty());

    let all_received = bus
        .receive_message("all", receive_once(10), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(all_received.len(), 1);
}

// A single publish entry larger than the size cap fails the whole call;
// an oversized entry inside a batch fails only that entry.
#[tokio::test]
async fn oversized_publish_payload_is_rejected() {
    let (bus, _clock) = test_bus();
    bus.create_topic("bulk".into()).unwrap();

    let huge = "x".repeat(300_000);
    let err = bus
        .publish(
            "bulk",
            PublishInput {
                message: huge,
                subject: None,
                message_attributes: MessageAttributes::new(),
                message_group_id: None,
                message_deduplication_id: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, BusError::InvalidParameter(_)));
}

#[tokio::test]
async fn batch_publish_reports_per_entry_failure_for_one_oversized_entry() {
    let (bus, _clock) = test_bus();
    bus.create_queue("batch-target".into(), QueueAttributes::default()).unwrap();
    bus.create_topic("bulk".into()).unwrap();
    let queue_arn = Arn::queue("aws", "us-east-1", "000000000000", "batch-target");
    bus.subscribe("bulk", "sqs", queue_arn, true, None).unwrap();

    let entries = vec![
        PublishBatchEntry {
            id: "ok".into(),
            input: PublishInput {
                message: "fits fine".into(),
                subject: None,
                message_attributes: MessageAttributes::new(),
                message_group_id: None,
                message_deduplication_id: None,
            },
        },
        PublishBatchEntry {
            id: "too-big".into(),
            input: PublishInput {
                message: "y".repeat(300_000),
                subject: None,
                message_attributes: MessageAttributes::new(),
                message_group_id: None,
                message_deduplication_id: None,
            },
        },
    ];

    let PublishBatchResult { successful, failed } = bus.publish_batch("bulk", entries).unwrap();
    assert_eq!(successful.len(), 1);
    assert_eq!(successful[0].id, "ok");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, "too-big");
}

// A whole batch whose combined payload exceeds the cap fails outright, with
// no partial delivery.
#[tokio::test]
async fn batch_publish_rejects_whole_batch_when_aggregate_exceeds_cap() {
    let (bus, _clock) = test_bus();
    bus.create_topic("bulk".into()).unwrap();

    let entries: Vec<PublishBatchEntry> = (0..3)
        .map(|i| PublishBatchEntry {
            id: format!("entry-{i}"),
            input: PublishInput {
                message: "z".repeat(100_000),
                subject: None,
                message_attributes: MessageAttributes::new(),
                message_group_id: None,
                message_deduplication_id: None,
            },
        })
        .collect();

    let err = bus.publish_batch("bulk", entries).unwrap_err();
    assert!(matches!(err, BusError::BatchRequestTooLong(_)));
}

// A move task drains every message out of a dead-letter queue back into its
// source queue and reports completion once drained.
#[tokio::test]
async fn move_task_drains_dead_letter_queue_back_to_source() {
    let (bus, clock) = test_bus();
    bus.create_queue("dlq".into(), QueueAttributes::default()).unwrap();

    let mut main_attrs = QueueAttributes::default();
    main_attrs.redrive_policy = Some(RedrivePolicy {
        dead_letter_target_arn: Arn::queue("aws", "us-east-1", "000000000000", "dlq"),
        max_receive_count: 3,
    });
    bus.create_queue("main".into(), main_attrs).unwrap();

    for body in ["a", "b"] {
        bus.send_message("dlq", send_input(body)).unwrap();
    }

    let handle = bus.start_move_task("dlq", Some("main"), 100).unwrap();
    clock.advance(Duration::from_secs(1));
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    let tasks = bus.list_message_move_tasks(Some("dlq")).unwrap();
    let task = tasks.iter().find(|t| t.task_handle == handle).unwrap();
    assert_eq!(task.moved_count(), 2);

    assert_eq!(bus.get_queue("main").unwrap().approximate_number_of_messages(), 2);
    assert_eq!(bus.get_queue("dlq").unwrap().approximate_number_of_messages(), 0);
}

// ready + inFlight + delayed = sent - deleted - dlqOut holds across a mixed
// sequence of sends, receives, deletes, and an expiring visibility timeout.
#[tokio::test]
async fn message_count_invariant_holds_across_lifecycle_transitions() {
    let (bus, clock) = test_bus();
    bus.create_queue("accounting".into(), QueueAttributes::default()).unwrap();

    for i in 0..5 {
        bus.send_message("accounting", send_input(&format!("msg-{i}"))).unwrap();
    }

    let short_visibility = ReceiveInput {
        max_number_of_messages: 2,
        visibility_timeout: Some(Duration::from_secs(5)),
        wait_time: Duration::ZERO,
    };
    let received = bus
        .receive_message("accounting", short_visibility, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(received.len(), 2);
    bus.delete_message("accounting", &received[0].receipt_handle).unwrap();

    clock.advance(Duration::from_secs(10));
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;

    let queue = bus.get_queue("accounting").unwrap();
    let (sent, deleted, dlq_out) = queue.totals();
    let ready = queue.approximate_number_of_messages();
    let not_visible = queue.approximate_number_not_visible();
    let delayed = queue.approximate_number_delayed();

    assert_eq!(sent, 5);
    assert_eq!(deleted, 1);
    assert_eq!(dlq_out, 0);
    assert_eq!((ready + not_visible + delayed) as u64, sent - deleted - dlq_out);
}

// Tagging and untagging a queue through the facade is reflected on its
// attributes.
#[tokio::test]
async fn queue_tags_round_trip_through_the_facade() {
    let (bus, _clock) = test_bus();
    bus.create_queue("tagged".into(), QueueAttributes::default()).unwrap();

    let mut tags = HashMap::new();
    tags.insert("team".to_string(), "payments".to_string());
    bus.tag_queue("tagged", tags).unwrap();
    assert_eq!(
        bus.get_queue("tagged").unwrap().attributes.read().tags.get("team"),
        Some(&"payments".to_string())
    );

    bus.untag_queue("tagged", &["team".to_string()]).unwrap();
    assert!(bus.get_queue("tagged").unwrap().attributes.read().tags.is_empty());
}

// Deleting a queue still referenced as another queue's dead-letter target
// is rejected; the same delete succeeds once the reference is removed.
#[tokio::test]
async fn deleting_a_referenced_dead_letter_queue_is_rejected() {
    let (bus, _clock) = test_bus();
    bus.create_queue("dlq".into(), QueueAttributes::default()).unwrap();
    let mut main_attrs = QueueAttributes::default();
    main_attrs.redrive_policy = Some(RedrivePolicy {
        dead_letter_target_arn: Arn::queue("aws", "us-east-1", "000000000000", "dlq"),
        max_receive_count: 5,
    });
    bus.create_queue("main".into(), main_attrs).unwrap();

    let err = bus.delete_queue("dlq").unwrap_err();
    assert!(matches!(err, BusError::InvalidParameter(_)));

    bus.delete_queue("main").unwrap();
    bus.delete_queue("dlq").unwrap();
}

// Usage tracking accumulates across mixed SQS/SNS operations and the
// generated policy groups actions per service.
#[tokio::test]
async fn usage_policy_groups_recorded_actions_by_service() {
    let (bus, _clock) = test_bus();
    bus.create_queue("q".into(), QueueAttributes::default()).unwrap();
    bus.create_topic("t".into()).unwrap();
    bus.send_message("q", send_input("x")).unwrap();

    let policy = bus.usage_policy();
    let sqs_statement = policy.statement.iter().find(|s| s.sid == "sqsAccess").unwrap();
    assert!(sqs_statement.action.contains(&"CreateQueue".to_string()));
    assert!(sqs_statement.action.contains(&"SendMessage".to_string()));
    let sns_statement = policy.statement.iter().find(|s| s.sid == "snsAccess").unwrap();
    assert!(sns_statement.action.contains(&"CreateTopic".to_string()));
}

// GetQueueAttributes reflects live computed counts, not a cached snapshot
// taken at creation time.
#[tokio::test]
async fn queue_attributes_snapshot_reflects_live_computed_counts() {
    let (bus, _clock) = test_bus();
    bus.create_queue("counts".into(), QueueAttributes::default()).unwrap();
    bus.send_message("counts", send_input("one")).unwrap();
    bus.send_message("counts", send_input("two")).unwrap();

    let snapshot = bus.get_queue_attributes("counts").unwrap();
    assert_eq!(snapshot.approximate_number_of_messages, 2);
    assert_eq!(snapshot.approximate_number_of_messages_not_visible, 0);
    assert!(!snapshot.fifo);
}

// SetQueueAttributes rejects attempts to flip the immutable FIFO flag and
// rejects a redrive policy whose target queue doesn't exist.
#[tokio::test]
async fn set_queue_attributes_enforces_fifo_immutability_and_redrive_target() {
    let (bus, _clock) = test_bus();
    bus.create_queue("settings".into(), QueueAttributes::default()).unwrap();

    let flip_fifo = bus.set_queue_attributes("settings", |attrs| attrs.fifo = true);
    assert!(matches!(flip_fifo.unwrap_err(), BusError::InvalidParameter(_)));

    let missing_target = bus.set_queue_attributes("settings", |attrs| {
        attrs.redrive_policy = Some(RedrivePolicy {
            dead_letter_target_arn: Arn::queue("aws", "us-east-1", "000000000000", "nowhere"),
            max_receive_count: 3,
        });
    });
    assert!(matches!(missing_target.unwrap_err(), BusError::QueueDoesNotExist(_)));

    bus.set_queue_attributes("settings", |attrs| {
        attrs.visibility_timeout = Duration::from_secs(90);
    })
    .unwrap();
    assert_eq!(
        bus.get_queue_attributes("settings").unwrap().visibility_timeout,
        Duration::from_secs(90)
    );
}

// AddPermission/RemovePermission manage the topic's Policy document keyed
// by Sid, deleting the attribute entirely once no statements remain.
#[tokio::test]
async fn topic_permissions_round_trip_through_the_policy_document() {
    let (bus, _clock) = test_bus();
    bus.create_topic("shared".into()).unwrap();

    bus.add_permission(
        "shared",
        "AllowAccountX".into(),
        serde_json::json!({"Effect": "Allow", "Principal": {"AWS": "111111111111"}, "Action": "SNS:Publish"}),
    )
    .unwrap();

    let duplicate = bus.add_permission("shared", "AllowAccountX".into(), serde_json::json!({}));
    assert!(matches!(duplicate.unwrap_err(), BusError::InvalidParameter(_)));

    let attrs = bus.get_topic_attributes("shared").unwrap();
    let statements = attrs.policy.as_ref().unwrap()["Statement"].as_array().unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0]["Sid"], "AllowAccountX");

    bus.remove_permission("shared", "AllowAccountX").unwrap();
    assert!(bus.get_topic_attributes("shared").unwrap().policy.is_none());

    let missing = bus.remove_permission("shared", "AllowAccountX");
    assert!(matches!(missing.unwrap_err(), BusError::InvalidParameter(_)));
}

// Queue tag listing reflects TagQueue/UntagQueue mutations.
#[tokio::test]
async fn list_queue_tags_reflects_tag_mutations() {
    let (bus, _clock) = test_bus();
    bus.create_queue("tagged-list".into(), QueueAttributes::default()).unwrap();

    let mut tags = HashMap::new();
    tags.insert("env".to_string(), "prod".to_string());
    bus.tag_queue("tagged-list", tags).unwrap();
    assert_eq!(bus.list_queue_tags("tagged-list").unwrap().get("env"), Some(&"prod".to_string()));

    bus.untag_queue("tagged-list", &["env".to_string()]).unwrap();
    assert!(bus.list_queue_tags("tagged-list").unwrap().is_empty());
}
