use async_trait::async_trait;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Failed to decode document from {collection}: {source}")]
    Decode {
        collection: String,
        #[source]
        source: bson::de::Error,
    },

    #[error("Failed to encode document for {collection}: {source}")]
    Encode {
        collection: String,
        #[source]
        source: bson::ser::Error,
    },

    #[error("Duplicate key {key} in {collection}")]
    Duplicate { collection: String, key: String },
}

/// Read/query/write surface of the document database.
///
/// Documents are addressed by a string `_id`. Implementations must be safe to
/// share between concurrent trigger invocations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError>;

    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    async fn insert(&self, collection: &str, document: Document) -> Result<(), StoreError>;

    /// `$set`s the given fields; returns false when no document matched.
    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<bool, StoreError>;

    async fn delete_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<u64, StoreError>;

    /// Rejects later inserts whose string `field` repeats an existing value.
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Deserialize a raw document into a typed model, tagging failures with the collection.
pub fn decode<T: DeserializeOwned>(collection: &str, document: Document) -> Result<T, StoreError> {
    bson::from_document(document).map_err(|source| StoreError::Decode {
        collection: collection.to_string(),
        source,
    })
}

pub fn encode<T: serde::Serialize>(collection: &str, value: &T) -> Result<Document, StoreError> {
    bson::to_document(value).map_err(|source| StoreError::Encode {
        collection: collection.to_string(),
        source,
    })
}

pub(crate) fn field_filter(field: &str, value: &str) -> Document {
    let mut filter = Document::new();
    filter.insert(field, Bson::String(value.to_string()));
    filter
}

// E11000 duplicate key
fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        *error.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) if write_error.code == 11000
    )
}

/// MongoDB-backed store
pub struct MongoDocumentStore {
    db: Database,
}

impl MongoDocumentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn collect(
        &self,
        collection: &str,
        filter: Document,
        limit: Option<i64>,
    ) -> Result<Vec<Document>, StoreError> {
        let coll = self.db.collection::<Document>(collection);
        let mut cursor = match limit {
            Some(limit) => coll.find(filter).limit(limit).await?,
            None => coll.find(filter).await?,
        };

        let mut documents = Vec::new();
        while cursor.advance().await? {
            documents.push(cursor.deserialize_current()?);
        }

        Ok(documents)
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let document = self
            .db
            .collection::<Document>(collection)
            .find_one(doc! { "_id": id })
            .await?;
        Ok(document)
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError> {
        self.collect(collection, field_filter(field, value), Some(limit))
            .await
    }

    async fn list_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.collect(collection, doc! {}, None).await
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<(), StoreError> {
        match self
            .db
            .collection::<Document>(collection)
            .insert_one(document)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate {
                collection: collection.to_string(),
                key: e.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let mut keys = Document::new();
        keys.insert(field, 1);
        let index = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.db
            .collection::<Document>(collection)
            .create_index(index)
            .await?;
        tracing::debug!("Unique index ensured on {}.{}", collection, field);
        Ok(())
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<bool, StoreError> {
        let result = self
            .db
            .collection::<Document>(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": fields })
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<u64, StoreError> {
        let result = self
            .db
            .collection::<Document>(collection)
            .delete_many(field_filter(field, value))
            .await?;
        Ok(result.deleted_count)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
