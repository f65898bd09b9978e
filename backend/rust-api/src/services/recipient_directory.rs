use futures::future::join_all;
use mongodb::bson::Document;
use std::sync::Arc;

use crate::models::recipient::{Recipient, RecipientDocument, RecipientRole};
use crate::services::document_store::{decode, DocumentStore, StoreError};

/// Resolves user ids to recipients across the staff and family stores
pub struct RecipientDirectory {
    store: Arc<dyn DocumentStore>,
}

impl RecipientDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Looks the uid up in each store in `RecipientRole::LOOKUP_ORDER`; first match wins.
    /// `Ok(None)` means the user is unknown or its record is unusable, which
    /// callers treat as "no tokens".
    pub async fn resolve(&self, uid: &str) -> Result<Option<Recipient>, StoreError> {
        for role in RecipientRole::LOOKUP_ORDER {
            if let Some(document) = self.find_in(role, uid).await? {
                let collection = role.collection();
                return Ok(usable(collection, document).map(|raw| raw.into_recipient(role)));
            }
        }

        tracing::debug!("Recipient {} not found in any store", uid);
        Ok(None)
    }

    /// Resolves every uid concurrently. Unknown users are dropped; the output
    /// keeps the order of `uids`.
    pub async fn resolve_many(&self, uids: &[String]) -> Result<Vec<Recipient>, StoreError> {
        let lookups = join_all(uids.iter().map(|uid| self.resolve(uid))).await;

        let mut recipients = Vec::with_capacity(lookups.len());
        for lookup in lookups {
            if let Some(recipient) = lookup? {
                recipients.push(recipient);
            }
        }
        Ok(recipients)
    }

    /// Every decodable record in the family store, in store order. A record
    /// that fails to decode is logged and skipped so the rest still receive
    /// the broadcast.
    pub async fn families(&self) -> Result<Vec<Recipient>, StoreError> {
        let collection = RecipientRole::Family.collection();
        let documents = self.store.list_all(collection).await?;

        Ok(documents
            .into_iter()
            .filter_map(|document| usable(collection, document))
            .map(|raw| raw.into_recipient(RecipientRole::Family))
            .collect())
    }

    async fn find_in(&self, role: RecipientRole, uid: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .store
            .query_by_field(role.collection(), "uid", uid, 1)
            .await?
            .into_iter()
            .next())
    }
}

/// Malformed recipient records contribute no tokens instead of failing the trigger.
fn usable(collection: &str, document: Document) -> Option<RecipientDocument> {
    let id = document.get_str("_id").unwrap_or("<no id>").to_string();
    match decode::<RecipientDocument>(collection, document) {
        Ok(raw) => Some(raw),
        Err(e) => {
            tracing::warn!("Skipping unusable recipient record {}: {}", id, e);
            None
        }
    }
}
