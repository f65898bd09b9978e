use std::sync::Arc;

use crate::metrics::PUSH_DELIVERIES_TOTAL;
use crate::models::notification::{DispatchResult, NotificationCategory, NotificationPayload};
use crate::models::trigger::{Announcement, Assessment, ChatMessage, EventDocument, MessageType};
use crate::services::push_transport::{PushError, PushTransport};

// Fixed notification templates (Japanese)
pub const UNKNOWN_SENDER: &str = "不明";
pub const IMAGE_MESSAGE_BODY: &str = "画像を送信しました";
pub const ANNOUNCEMENT_DEFAULT_TITLE: &str = "お知らせ";
pub const EVENT_TITLE: &str = "新しいイベント";
pub const EVENT_DEFAULT_BODY: &str = "新しいイベントが登録されました";
pub const ASSESSMENT_TITLE: &str = "アセスメントが公開されました";

pub fn chat_payload(chat_id: &str, message: &ChatMessage) -> NotificationPayload {
    let body = match message.message_type {
        MessageType::Image => IMAGE_MESSAGE_BODY.to_string(),
        _ => message.text.clone().unwrap_or_default(),
    };

    NotificationPayload {
        title: message
            .sender_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
        body,
        category: NotificationCategory::Chat,
        correlation_id: chat_id.to_string(),
    }
}

pub fn announcement_payload(notification_id: &str, announcement: &Announcement) -> NotificationPayload {
    NotificationPayload {
        title: announcement
            .title
            .clone()
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| ANNOUNCEMENT_DEFAULT_TITLE.to_string()),
        body: announcement.body.clone().unwrap_or_default(),
        category: NotificationCategory::Announcement,
        correlation_id: notification_id.to_string(),
    }
}

pub fn event_payload(event_id: &str, event: &EventDocument) -> NotificationPayload {
    NotificationPayload {
        title: EVENT_TITLE.to_string(),
        body: event
            .title
            .clone()
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| EVENT_DEFAULT_BODY.to_string()),
        category: NotificationCategory::Event,
        correlation_id: event_id.to_string(),
    }
}

pub fn assessment_payload(assessment_id: &str, assessment: &Assessment) -> NotificationPayload {
    // Absent name parts stay empty; the separating space is always kept.
    let body = format!(
        "{} {}さんのアセスメントが公開されました",
        assessment.child_last_name.as_deref().unwrap_or_default(),
        assessment.child_first_name.as_deref().unwrap_or_default()
    );

    NotificationPayload {
        title: ASSESSMENT_TITLE.to_string(),
        body,
        category: NotificationCategory::Assessment,
        correlation_id: assessment_id.to_string(),
    }
}

/// Sends one payload to a token batch through the push transport
pub struct NotificationDispatcher {
    push: Arc<dyn PushTransport>,
}

impl NotificationDispatcher {
    pub fn new(push: Arc<dyn PushTransport>) -> Self {
        Self { push }
    }

    /// An empty batch short-circuits to a zero result without touching the transport.
    pub async fn dispatch(
        &self,
        tokens: &[String],
        payload: &NotificationPayload,
    ) -> Result<DispatchResult, PushError> {
        if tokens.is_empty() {
            return Ok(DispatchResult::default());
        }

        let category = payload.category.as_str();
        let report = self
            .push
            .send_multicast(tokens, &payload.to_push_message())
            .await?;

        PUSH_DELIVERIES_TOTAL
            .with_label_values(&[category, "success"])
            .inc_by(report.success_count as u64);
        PUSH_DELIVERIES_TOTAL
            .with_label_values(&[category, "failure"])
            .inc_by(report.failure_count as u64);

        Ok(DispatchResult {
            success_count: report.success_count,
            failure_count: report.failure_count,
        })
    }
}
