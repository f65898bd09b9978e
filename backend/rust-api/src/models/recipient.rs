use serde::{Deserialize, Serialize};

use super::notification::NotificationCategory;

pub const STAFFS_COLLECTION: &str = "staffs";
pub const FAMILIES_COLLECTION: &str = "families";

/// Which of the two disjoint recipient stores a record lives in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecipientRole {
    Staff,
    Family,
}

impl RecipientRole {
    /// Lookup order used when resolving a bare uid: staff first, family second.
    pub const LOOKUP_ORDER: [RecipientRole; 2] = [RecipientRole::Staff, RecipientRole::Family];

    pub fn as_str(&self) -> &str {
        match self {
            RecipientRole::Staff => "staff",
            RecipientRole::Family => "family",
        }
    }

    pub fn collection(&self) -> &'static str {
        match self {
            RecipientRole::Staff => STAFFS_COLLECTION,
            RecipientRole::Family => FAMILIES_COLLECTION,
        }
    }
}

/// Per-category opt-out flags. `None` means the recipient never touched the
/// setting and is opted in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_chat: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_announcement: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_event: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_assessment: Option<bool>,
}

impl NotificationPreferences {
    pub fn flag(&self, category: NotificationCategory) -> Option<bool> {
        match category {
            NotificationCategory::Chat => self.notify_chat,
            NotificationCategory::Announcement => self.notify_announcement,
            NotificationCategory::Event => self.notify_event,
            NotificationCategory::Assessment => self.notify_assessment,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub classroom: Option<String>,
}

/// Raw shape shared by documents in the "staffs" and "families" collections
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientDocument {
    pub uid: String,
    #[serde(default)]
    pub fcm_tokens: Option<Vec<String>>,
    #[serde(flatten)]
    pub preferences: NotificationPreferences,
    #[serde(default)]
    pub children: Option<Vec<Child>>,
}

impl RecipientDocument {
    /// Tags the document with the store it was read from.
    pub fn into_recipient(self, role: RecipientRole) -> Recipient {
        let children = match role {
            RecipientRole::Family => self.children.unwrap_or_default(),
            RecipientRole::Staff => Vec::new(),
        };

        Recipient {
            uid: self.uid,
            role,
            tokens: self.fcm_tokens.unwrap_or_default(),
            preferences: self.preferences,
            children,
        }
    }
}

/// A resolved notification recipient, independent of the store it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub uid: String,
    pub role: RecipientRole,
    pub tokens: Vec<String>,
    pub preferences: NotificationPreferences,
    /// Always empty for staff.
    pub children: Vec<Child>,
}
