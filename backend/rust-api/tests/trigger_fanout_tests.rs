use serde_json::json;
use carelink_api::{
    models::{
        notification::DispatchResult,
        trigger::{Announcement, AnnouncementTarget, Assessment, ChatMessage, EventDocument, MessageType},
    },
    services::trigger_service::{HandlerStage, SkipReason, TriggerOutcome},
};

mod common;

use common::{
    create_test_app, create_test_app_with, seed_chat, seed_family, seed_staff, send_json,
    test_config, RecordingPushTransport,
};

fn text_message(sender_id: &str, sender_name: Option<&str>, text: &str) -> ChatMessage {
    ChatMessage {
        sender_id: Some(sender_id.to_string()),
        sender_name: sender_name.map(str::to_string),
        message_type: MessageType::Text,
        text: Some(text.to_string()),
    }
}

fn dispatched(success_count: usize, failure_count: usize) -> TriggerOutcome {
    TriggerOutcome::Dispatched(DispatchResult {
        success_count,
        failure_count,
    })
}

#[tokio::test]
async fn test_chat_message_reaches_opted_in_participants_only() {
    let app = create_test_app().await;
    seed_chat(&app.store, "c1", &["S", "R1", "R2"]).await;
    seed_staff(&app.store, json!({ "uid": "S", "fcmTokens": ["sender-token"] })).await;
    seed_staff(
        &app.store,
        json!({ "uid": "R1", "fcmTokens": ["staff-token"], "notifyChat": false }),
    )
    .await;
    seed_family(&app.store, json!({ "uid": "R2", "fcmTokens": ["t1", "t2"] })).await;

    let outcome = app
        .state
        .triggers()
        .on_chat_message_created("c1", &text_message("S", Some("Sato"), "hello"))
        .await;

    assert_eq!(outcome, dispatched(2, 0));

    let batches = app.push.batches().await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].tokens, vec!["t1", "t2"]);
    assert_eq!(batches[0].message.title, "Sato");
    assert_eq!(batches[0].message.body, "hello");
    assert_eq!(batches[0].message.data.get("type").map(String::as_str), Some("chat"));
    assert_eq!(batches[0].message.data.get("chatId").map(String::as_str), Some("c1"));
}

#[tokio::test]
async fn test_chat_sender_is_never_notified() {
    let app = create_test_app().await;
    seed_chat(&app.store, "c1", &["S", "R1"]).await;
    seed_family(&app.store, json!({ "uid": "S", "fcmTokens": ["sender-token"] })).await;
    seed_family(&app.store, json!({ "uid": "R1", "fcmTokens": ["r1-token"] })).await;

    let outcome = app
        .state
        .triggers()
        .on_chat_message_created("c1", &text_message("S", Some("Sato"), "hi"))
        .await;

    assert_eq!(outcome, dispatched(1, 0));
    let batches = app.push.batches().await;
    assert!(!batches[0].tokens.contains(&"sender-token".to_string()));
}

#[tokio::test]
async fn test_chat_with_only_sender_is_skipped() {
    let app = create_test_app().await;
    seed_chat(&app.store, "solo", &["S"]).await;

    let outcome = app
        .state
        .triggers()
        .on_chat_message_created("solo", &text_message("S", None, "anyone?"))
        .await;

    assert_eq!(
        outcome,
        TriggerOutcome::Skipped {
            reason: SkipReason::EmptyAudience
        }
    );
    assert_eq!(app.push.call_count().await, 0);
}

#[tokio::test]
async fn test_missing_chat_is_a_no_op() {
    let app = create_test_app().await;

    let outcome = app
        .state
        .triggers()
        .on_chat_message_created("ghost", &text_message("S", None, "hello"))
        .await;

    assert_eq!(
        outcome,
        TriggerOutcome::Skipped {
            reason: SkipReason::ChatNotFound
        }
    );
    assert_eq!(app.push.call_count().await, 0);
}

#[tokio::test]
async fn test_all_recipients_opted_out_sends_nothing() {
    let app = create_test_app().await;
    seed_chat(&app.store, "c1", &["S", "R1", "R2"]).await;
    seed_staff(
        &app.store,
        json!({ "uid": "R1", "fcmTokens": ["a"], "notifyChat": false }),
    )
    .await;
    seed_family(
        &app.store,
        json!({ "uid": "R2", "fcmTokens": ["b"], "notifyChat": false }),
    )
    .await;

    let outcome = app
        .state
        .triggers()
        .on_chat_message_created("c1", &text_message("S", Some("Sato"), "hello"))
        .await;

    assert_eq!(
        outcome,
        TriggerOutcome::Skipped {
            reason: SkipReason::NoTokens
        }
    );
    assert_eq!(app.push.call_count().await, 0);
}

#[tokio::test]
async fn test_unknown_participants_are_dropped() {
    let app = create_test_app().await;
    seed_chat(&app.store, "c1", &["S", "nobody", "R1"]).await;
    seed_family(&app.store, json!({ "uid": "R1", "fcmTokens": ["r1"] })).await;

    let outcome = app
        .state
        .triggers()
        .on_chat_message_created("c1", &text_message("S", Some("Sato"), "hello"))
        .await;

    assert_eq!(outcome, dispatched(1, 0));
    assert_eq!(app.push.batches().await[0].tokens, vec!["r1"]);
}

#[tokio::test]
async fn test_staff_record_wins_over_family_record() {
    let app = create_test_app().await;
    seed_chat(&app.store, "c1", &["S", "dual"]).await;
    seed_staff(
        &app.store,
        json!({ "uid": "dual", "fcmTokens": ["staff-side"], "notifyChat": false }),
    )
    .await;
    seed_family(&app.store, json!({ "uid": "dual", "fcmTokens": ["family-side"] })).await;

    let outcome = app
        .state
        .triggers()
        .on_chat_message_created("c1", &text_message("S", None, "hello"))
        .await;

    assert_eq!(
        outcome,
        TriggerOutcome::Skipped {
            reason: SkipReason::NoTokens
        }
    );
}

#[tokio::test]
async fn test_image_message_and_unknown_sender_templates() {
    let app = create_test_app().await;
    seed_chat(&app.store, "c1", &["S", "R1"]).await;
    seed_family(&app.store, json!({ "uid": "R1", "fcmTokens": ["r1"] })).await;

    let message = ChatMessage {
        sender_id: Some("S".to_string()),
        sender_name: None,
        message_type: MessageType::Image,
        text: Some("ignored".to_string()),
    };
    app.state
        .triggers()
        .on_chat_message_created("c1", &message)
        .await;

    let batches = app.push.batches().await;
    assert_eq!(batches[0].message.title, "不明");
    assert_eq!(batches[0].message.body, "画像を送信しました");
}

#[tokio::test]
async fn test_duplicate_tokens_across_recipients_are_kept() {
    let app = create_test_app().await;
    seed_family(&app.store, json!({ "uid": "F1", "fcmTokens": ["shared", "shared"] })).await;
    seed_family(&app.store, json!({ "uid": "F2", "fcmTokens": ["shared"] })).await;

    let outcome = app
        .state
        .triggers()
        .on_event_created(
            "ev1",
            &EventDocument {
                is_published: Some(true),
                title: Some("Sports day".to_string()),
            },
        )
        .await;

    assert_eq!(outcome, dispatched(2, 0));
    assert_eq!(app.push.batches().await[0].tokens, vec!["shared", "shared"]);
}

#[tokio::test]
async fn test_specific_announcement_reaches_matching_classrooms() {
    let app = create_test_app().await;
    seed_family(
        &app.store,
        json!({ "uid": "F-A", "fcmTokens": ["a"], "children": [{ "id": "k1", "firstName": "Aoi", "classroom": "A" }] }),
    )
    .await;
    seed_family(
        &app.store,
        json!({ "uid": "F-B", "fcmTokens": ["b"], "children": [{ "id": "k2", "firstName": "Ren", "classroom": "B" }] }),
    )
    .await;
    seed_family(&app.store, json!({ "uid": "F-none", "fcmTokens": ["n"] })).await;

    let announcement = Announcement {
        target: AnnouncementTarget::Specific,
        target_classrooms: vec!["A".to_string()],
        title: Some("Field trip".to_string()),
        body: Some("Bring lunch".to_string()),
    };
    let outcome = app
        .state
        .triggers()
        .on_notification_created("n1", &announcement)
        .await;

    assert_eq!(outcome, dispatched(1, 0));
    let batches = app.push.batches().await;
    assert_eq!(batches[0].tokens, vec!["a"]);
    assert_eq!(batches[0].message.title, "Field trip");
    assert_eq!(
        batches[0].message.data.get("notificationId").map(String::as_str),
        Some("n1")
    );
}

#[tokio::test]
async fn test_announcement_to_all_and_empty_specific_reach_every_family() {
    let app = create_test_app().await;
    seed_family(
        &app.store,
        json!({ "uid": "F-A", "fcmTokens": ["a"], "children": [{ "classroom": "A" }] }),
    )
    .await;
    seed_family(&app.store, json!({ "uid": "F-none", "fcmTokens": ["n"] })).await;
    seed_family(
        &app.store,
        json!({ "uid": "F-muted", "fcmTokens": ["m"], "notifyAnnouncement": false }),
    )
    .await;

    let service = app.state.triggers();
    let all = service
        .on_notification_created("n1", &Announcement::default())
        .await;
    let empty_specific = service
        .on_notification_created(
            "n2",
            &Announcement {
                target: AnnouncementTarget::Specific,
                ..Default::default()
            },
        )
        .await;

    assert_eq!(all, dispatched(2, 0));
    assert_eq!(empty_specific, dispatched(2, 0));

    let batches = app.push.batches().await;
    assert_eq!(batches[0].tokens, vec!["a", "n"]);
    assert_eq!(batches[0].message.title, "お知らせ");
    assert_eq!(batches[0].message.body, "");
}

#[tokio::test]
async fn test_unpublished_event_sends_nothing() {
    let app = create_test_app().await;
    seed_family(&app.store, json!({ "uid": "F1", "fcmTokens": ["f1"] })).await;

    let outcome = app
        .state
        .triggers()
        .on_event_created("ev1", &EventDocument::default())
        .await;

    assert_eq!(
        outcome,
        TriggerOutcome::Skipped {
            reason: SkipReason::NotPublished
        }
    );
    assert_eq!(app.push.call_count().await, 0);
}

#[tokio::test]
async fn test_published_event_uses_fixed_title() {
    let app = create_test_app().await;
    seed_family(&app.store, json!({ "uid": "F1", "fcmTokens": ["f1"] })).await;

    app.state
        .triggers()
        .on_event_created(
            "ev1",
            &EventDocument {
                is_published: Some(true),
                title: None,
            },
        )
        .await;

    let batches = app.push.batches().await;
    assert_eq!(batches[0].message.title, "新しいイベント");
    assert_eq!(batches[0].message.body, "新しいイベントが登録されました");
    assert_eq!(batches[0].message.data.get("eventId").map(String::as_str), Some("ev1"));
}

fn assessment(published: Option<bool>, child_id: Option<&str>, first_name: Option<&str>) -> Assessment {
    Assessment {
        is_published: published,
        child_id: child_id.map(str::to_string),
        child_first_name: first_name.map(str::to_string),
        child_last_name: Some("Tanaka".to_string()),
    }
}

async fn seed_assessment_families(app: &common::TestApp) {
    seed_family(
        &app.store,
        json!({ "uid": "F1", "fcmTokens": ["f1"], "children": [{ "id": "k1", "firstName": "Yui" }] }),
    )
    .await;
    seed_family(
        &app.store,
        json!({ "uid": "F2", "fcmTokens": ["f2"], "children": [{ "id": "k2", "firstName": "Sora" }] }),
    )
    .await;
}

#[tokio::test]
async fn test_assessment_publication_edge_notifies_child_family() {
    let app = create_test_app().await;
    seed_assessment_families(&app).await;

    let before = assessment(Some(false), Some("k1"), Some("Yui"));
    let after = assessment(Some(true), Some("k1"), Some("Yui"));
    let outcome = app
        .state
        .triggers()
        .on_assessment_published("as1", Some(&before), &after)
        .await;

    assert_eq!(outcome, dispatched(1, 0));
    let batches = app.push.batches().await;
    assert_eq!(batches[0].tokens, vec!["f1"]);
    assert_eq!(batches[0].message.title, "アセスメントが公開されました");
    assert_eq!(batches[0].message.body, "Tanaka Yuiさんのアセスメントが公開されました");
}

#[tokio::test]
async fn test_assessment_matches_legacy_child_by_first_name() {
    let app = create_test_app().await;
    seed_family(
        &app.store,
        json!({ "uid": "legacy", "fcmTokens": ["l1"], "children": [{ "firstName": "Sora" }] }),
    )
    .await;

    let outcome = app
        .state
        .triggers()
        .on_assessment_published("as1", None, &assessment(Some(true), Some("k9"), Some("Sora")))
        .await;

    assert_eq!(outcome, dispatched(1, 0));
}

#[tokio::test]
async fn test_assessment_without_rising_edge_sends_nothing() {
    let app = create_test_app().await;
    seed_assessment_families(&app).await;
    let service = app.state.triggers();

    let published = assessment(Some(true), Some("k1"), Some("Yui"));
    let still_published = service
        .on_assessment_published("as1", Some(&published), &published)
        .await;
    let unpublished = service
        .on_assessment_published("as1", None, &assessment(Some(false), Some("k1"), Some("Yui")))
        .await;

    assert_eq!(
        still_published,
        TriggerOutcome::Skipped {
            reason: SkipReason::NotPublicationEdge
        }
    );
    assert_eq!(
        unpublished,
        TriggerOutcome::Skipped {
            reason: SkipReason::NotPublicationEdge
        }
    );
    assert_eq!(app.push.call_count().await, 0);
}

#[tokio::test]
async fn test_assessment_without_child_id_is_a_no_op() {
    let app = create_test_app().await;
    seed_assessment_families(&app).await;

    let outcome = app
        .state
        .triggers()
        .on_assessment_published("as1", None, &assessment(Some(true), None, Some("Yui")))
        .await;

    assert_eq!(
        outcome,
        TriggerOutcome::Skipped {
            reason: SkipReason::MissingChildId
        }
    );
    assert_eq!(app.push.call_count().await, 0);
}

#[tokio::test]
async fn test_event_opt_out_is_honoured() {
    let app = create_test_app().await;
    seed_family(&app.store, json!({ "uid": "F1", "fcmTokens": ["keep"] })).await;
    seed_family(
        &app.store,
        json!({ "uid": "F2", "fcmTokens": ["muted"], "notifyEvent": false, "notifyChat": true }),
    )
    .await;

    let outcome = app
        .state
        .triggers()
        .on_event_created(
            "ev1",
            &EventDocument {
                is_published: Some(true),
                title: None,
            },
        )
        .await;

    assert_eq!(outcome, dispatched(1, 0));
    assert_eq!(app.push.batches().await[0].tokens, vec!["keep"]);
}

#[tokio::test]
async fn test_assessment_opt_out_is_honoured() {
    let app = create_test_app().await;
    seed_family(
        &app.store,
        json!({ "uid": "F1", "fcmTokens": ["keep"], "children": [{ "id": "k1", "firstName": "Yui" }] }),
    )
    .await;
    seed_family(
        &app.store,
        json!({
            "uid": "F2",
            "fcmTokens": ["muted"],
            "notifyAssessment": false,
            "children": [{ "id": "k1", "firstName": "Yui" }]
        }),
    )
    .await;

    let outcome = app
        .state
        .triggers()
        .on_assessment_published("as1", None, &assessment(Some(true), Some("k1"), Some("Yui")))
        .await;

    assert_eq!(outcome, dispatched(1, 0));
    assert_eq!(app.push.batches().await[0].tokens, vec!["keep"]);
}

#[tokio::test]
async fn test_unusable_family_record_does_not_block_broadcast() {
    let app = create_test_app().await;
    seed_family(&app.store, json!({ "uid": "F1", "fcmTokens": ["good"] })).await;
    seed_family(&app.store, json!({ "fcmTokens": ["legacy"] })).await;
    seed_family(
        &app.store,
        json!({ "uid": "F3", "fcmTokens": ["odd"], "children": [{ "id": 42 }] }),
    )
    .await;

    let outcome = app
        .state
        .triggers()
        .on_event_created(
            "ev1",
            &EventDocument {
                is_published: Some(true),
                title: None,
            },
        )
        .await;

    assert_eq!(outcome, dispatched(1, 0));
    assert_eq!(app.push.batches().await[0].tokens, vec!["good"]);
}

#[tokio::test]
async fn test_partial_delivery_failure_is_reported_in_counts() {
    let app = create_test_app_with(
        test_config(),
        RecordingPushTransport::with_failing_tokens(&["stale"]),
    )
    .await;
    seed_family(&app.store, json!({ "uid": "F1", "fcmTokens": ["fresh", "stale"] })).await;

    let outcome = app
        .state
        .triggers()
        .on_event_created(
            "ev1",
            &EventDocument {
                is_published: Some(true),
                title: None,
            },
        )
        .await;

    assert_eq!(outcome, dispatched(1, 1));
}

#[tokio::test]
async fn test_transport_failure_is_swallowed() {
    let app = create_test_app_with(test_config(), RecordingPushTransport::unavailable()).await;
    seed_chat(&app.store, "c1", &["S", "R1"]).await;
    seed_family(&app.store, json!({ "uid": "R1", "fcmTokens": ["r1"] })).await;

    let outcome = app
        .state
        .triggers()
        .on_chat_message_created("c1", &text_message("S", None, "hello"))
        .await;

    assert_eq!(
        outcome,
        TriggerOutcome::Errored {
            stage: HandlerStage::TokensCollected
        }
    );
    assert_eq!(app.push.call_count().await, 1);
}

#[tokio::test]
async fn test_malformed_delivery_ends_errored() {
    let app = create_test_app().await;

    let outcome = app
        .state
        .triggers()
        .handle_delivery(json!({ "event": "chat_message_created", "params": {} }))
        .await;

    assert_eq!(
        outcome,
        TriggerOutcome::Errored {
            stage: HandlerStage::Start
        }
    );
}

#[tokio::test]
async fn test_trigger_endpoint_acknowledges_with_outcome() {
    let app = create_test_app().await;
    seed_chat(&app.store, "c1", &["S", "R1"]).await;
    seed_family(&app.store, json!({ "uid": "R1", "fcmTokens": ["r1"] })).await;

    let (status, body) = send_json(
        &app.router,
        "POST",
        "/triggers",
        None,
        Some(json!({
            "event": "chat_message_created",
            "params": { "chatId": "c1", "messageId": "m1" },
            "data": { "senderId": "S", "senderName": "Sato", "type": "text", "text": "hello" }
        })),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::ACCEPTED);
    assert_eq!(body["outcome"], "dispatched");
    assert_eq!(body["success_count"], 1);
    assert_eq!(app.push.call_count().await, 1);
}

#[tokio::test]
async fn test_trigger_endpoint_acknowledges_failures_too() {
    let app = create_test_app().await;

    let (status, body) = send_json(
        &app.router,
        "POST",
        "/triggers",
        None,
        Some(json!({ "event": "unknown_event" })),
    )
    .await;

    assert_eq!(status, axum::http::StatusCode::ACCEPTED);
    assert_eq!(body["outcome"], "errored");
}

#[tokio::test]
async fn test_trigger_endpoint_requires_configured_secret() {
    let mut config = test_config();
    config.trigger_secret = Some("s3cret".to_string());
    let app = create_test_app_with(config, RecordingPushTransport::new()).await;

    let delivery = json!({
        "event": "event_created",
        "params": { "eventId": "ev1" },
        "data": { "isPublished": false }
    });

    let (status, _) = send_json(&app.router, "POST", "/triggers", None, Some(delivery.clone())).await;
    assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        axum::http::Request::builder()
            .method("POST")
            .uri("/triggers")
            .header("content-type", "application/json")
            .header("x-trigger-secret", "s3cret")
            .body(axum::body::Body::from(delivery.to_string()))
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_non_json_delivery_is_rejected_with_json_error() {
    let app = create_test_app().await;

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        axum::http::Request::builder()
            .method("POST")
            .uri("/triggers")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("not json"))
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], 400);
    assert!(body["message"].as_str().unwrap().contains("/triggers"));
    assert_eq!(app.push.call_count().await, 0);
}
