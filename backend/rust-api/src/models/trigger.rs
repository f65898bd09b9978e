use serde::{Deserialize, Serialize};

use super::notification::NotificationCategory;

pub const CHATS_COLLECTION: &str = "chats";

/// Document-lifecycle event delivered by the hosting event system.
///
/// Wire shape: `{"event": "<name>", "params": {...}, "data": {...}}`; the
/// assessment update carries `before`/`after` snapshots instead of `data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TriggerEvent {
    ChatMessageCreated {
        params: ChatMessageParams,
        data: ChatMessage,
    },
    NotificationCreated {
        params: NotificationParams,
        data: Announcement,
    },
    EventCreated {
        params: EventParams,
        data: EventDocument,
    },
    AssessmentPublished {
        params: AssessmentParams,
        #[serde(default)]
        before: Option<Assessment>,
        after: Assessment,
    },
}

impl TriggerEvent {
    pub fn category(&self) -> NotificationCategory {
        match self {
            TriggerEvent::ChatMessageCreated { .. } => NotificationCategory::Chat,
            TriggerEvent::NotificationCreated { .. } => NotificationCategory::Announcement,
            TriggerEvent::EventCreated { .. } => NotificationCategory::Event,
            TriggerEvent::AssessmentPublished { .. } => NotificationCategory::Assessment,
        }
    }
}

// Path parameters ("chats/{chatId}/messages/{messageId}" and friends)

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageParams {
    pub chat_id: String,
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationParams {
    pub notification_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventParams {
    pub event_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentParams {
    pub assessment_id: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default, rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub text: Option<String>,
}

/// Document in the "chats" collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chat {
    #[serde(default)]
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementTarget {
    Specific,
    #[default]
    #[serde(other)]
    All,
}

/// Document in the "notifications" collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    #[serde(default)]
    pub target: AnnouncementTarget,
    #[serde(default)]
    pub target_classrooms: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Document in the "events" collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDocument {
    #[serde(default)]
    pub is_published: Option<bool>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Document in the "assessments" collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    #[serde(default)]
    pub is_published: Option<bool>,
    #[serde(default)]
    pub child_id: Option<String>,
    #[serde(default)]
    pub child_first_name: Option<String>,
    #[serde(default)]
    pub child_last_name: Option<String>,
}
