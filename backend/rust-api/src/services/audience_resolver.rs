use std::sync::Arc;

use crate::models::recipient::Recipient;
use crate::models::trigger::{Announcement, AnnouncementTarget, Assessment, Chat, CHATS_COLLECTION};
use crate::services::document_store::{decode, DocumentStore, StoreError};
use crate::services::recipient_directory::RecipientDirectory;

/// Chat audience: every participant except the sender, in chat order.
pub fn chat_audience(chat: &Chat, sender_id: Option<&str>) -> Vec<String> {
    chat.participants
        .iter()
        .filter(|participant| Some(participant.as_str()) != sender_id)
        .cloned()
        .collect()
}

/// Classroom scoping for announcements. A `specific` announcement with an
/// empty classroom list reaches everyone, like an `all` announcement.
pub fn announcement_targets(family: &Recipient, announcement: &Announcement) -> bool {
    if announcement.target != AnnouncementTarget::Specific
        || announcement.target_classrooms.is_empty()
    {
        return true;
    }

    family.children.iter().any(|child| {
        child
            .classroom
            .as_ref()
            .is_some_and(|classroom| announcement.target_classrooms.contains(classroom))
    })
}

/// Child membership for assessments: match on child id, or on first name for
/// legacy records. Two absent first names count as a match.
pub fn assessment_targets(family: &Recipient, child_id: &str, assessment: &Assessment) -> bool {
    family.children.iter().any(|child| {
        child.id.as_deref() == Some(child_id) || child.first_name == assessment.child_first_name
    })
}

/// Rising edge of `isPublished`: previously false/absent, now true.
pub fn is_publication_edge(before: Option<&Assessment>, after: &Assessment) -> bool {
    let was_published = before.and_then(|b| b.is_published) == Some(true);
    !was_published && after.is_published == Some(true)
}

/// Computes who a trigger is addressed to
pub struct AudienceResolver {
    store: Arc<dyn DocumentStore>,
    directory: RecipientDirectory,
}

impl AudienceResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            directory: RecipientDirectory::new(store.clone()),
            store,
        }
    }

    pub fn directory(&self) -> &RecipientDirectory {
        &self.directory
    }

    pub async fn load_chat(&self, chat_id: &str) -> Result<Option<Chat>, StoreError> {
        match self.store.get_by_id(CHATS_COLLECTION, chat_id).await? {
            Some(document) => Ok(Some(decode(CHATS_COLLECTION, document)?)),
            None => Ok(None),
        }
    }

    pub async fn announcement_audience(
        &self,
        announcement: &Announcement,
    ) -> Result<Vec<Recipient>, StoreError> {
        let families = self.directory.families().await?;
        Ok(families
            .into_iter()
            .filter(|family| announcement_targets(family, announcement))
            .collect())
    }

    pub async fn event_audience(&self) -> Result<Vec<Recipient>, StoreError> {
        self.directory.families().await
    }

    pub async fn assessment_audience(
        &self,
        child_id: &str,
        assessment: &Assessment,
    ) -> Result<Vec<Recipient>, StoreError> {
        let families = self.directory.families().await?;
        Ok(families
            .into_iter()
            .filter(|family| assessment_targets(family, child_id, assessment))
            .collect())
    }
}
