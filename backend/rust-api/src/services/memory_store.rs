use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::document_store::{encode, DocumentStore, StoreError};

/// Process-local store used for local runs (`APP_STORE=memory`) and tests.
///
/// Collections keep insertion order so scans are deterministic.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    unique_fields: RwLock<HashMap<String, Vec<String>>>,
}

fn matches_field(document: &Document, field: &str, value: &str) -> bool {
    matches!(document.get(field), Some(Bson::String(s)) if s == value)
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a document from any serializable value (typically `serde_json::json!`).
    pub async fn seed<T: serde::Serialize>(&self, collection: &str, value: &T) -> Result<(), StoreError> {
        let document = encode(collection, value)?;
        self.insert(collection, document).await
    }

    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| matches_field(d, "_id", id)))
            .cloned())
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matches_field(d, field, value))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn insert(&self, collection: &str, mut document: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let unique_fields = self.unique_fields.read().await;
        let docs = collections.entry(collection.to_string()).or_default();

        let mut checked = vec!["_id"];
        if let Some(fields) = unique_fields.get(collection) {
            checked.extend(fields.iter().map(String::as_str));
        }
        for field in checked {
            if let Ok(value) = document.get_str(field) {
                if docs.iter().any(|d| matches_field(d, field, value)) {
                    return Err(StoreError::Duplicate {
                        collection: collection.to_string(),
                        key: format!("{}={}", field, value),
                    });
                }
            }
        }

        if !document.contains_key("_id") {
            document.insert("_id", uuid::Uuid::new_v4().to_string());
        }

        docs.push(document);
        Ok(())
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let mut unique_fields = self.unique_fields.write().await;
        let fields = unique_fields.entry(collection.to_string()).or_default();
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
        Ok(())
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(document) = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| matches_field(d, "_id", id)))
        else {
            return Ok(false);
        };

        for (key, value) in fields {
            document.insert(key, value);
        }
        Ok(true)
    }

    async fn delete_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = docs.len();
        docs.retain(|d| !matches_field(d, field, value));
        Ok((before - docs.len()) as u64)
    }
}
