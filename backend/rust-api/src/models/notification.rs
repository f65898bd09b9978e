use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Notification categories, each with its own opt-out flag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Chat,
    Announcement,
    Event,
    Assessment,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Chat => "chat",
            NotificationCategory::Announcement => "announcement",
            NotificationCategory::Event => "event",
            NotificationCategory::Assessment => "assessment",
        }
    }

    /// Key of the correlation id inside the push `data` map
    pub fn correlation_key(&self) -> &'static str {
        match self {
            NotificationCategory::Chat => "chatId",
            NotificationCategory::Announcement => "notificationId",
            NotificationCategory::Event => "eventId",
            NotificationCategory::Assessment => "assessmentId",
        }
    }
}

impl std::fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable content plus correlation metadata for one trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub category: NotificationCategory,
    pub correlation_id: String,
}

impl NotificationPayload {
    /// Metadata delivered next to title/body: `type` plus the category's id field.
    pub fn data(&self) -> BTreeMap<String, String> {
        let mut data = BTreeMap::new();
        data.insert("type".to_string(), self.category.as_str().to_string());
        data.insert(
            self.category.correlation_key().to_string(),
            self.correlation_id.clone(),
        );
        data
    }

    pub fn to_push_message(&self) -> PushMessage {
        PushMessage {
            title: self.title.clone(),
            body: self.body.clone(),
            data: self.data(),
        }
    }
}

/// What the push transport receives for every token of a batch
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct DispatchResult {
    pub success_count: usize,
    pub failure_count: usize,
}
