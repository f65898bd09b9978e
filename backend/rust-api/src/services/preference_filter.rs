use crate::models::notification::NotificationCategory;
use crate::models::recipient::Recipient;

/// Opt-out check: only an explicit `false` excludes a recipient.
pub fn include(recipient: &Recipient, category: NotificationCategory) -> bool {
    recipient.preferences.flag(category) != Some(false)
}

/// Drops opted-out recipients, keeping order. Must run before token collection.
pub fn retain_included(recipients: Vec<Recipient>, category: NotificationCategory) -> Vec<Recipient> {
    recipients
        .into_iter()
        .filter(|recipient| include(recipient, category))
        .collect()
}
