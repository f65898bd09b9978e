use std::sync::Arc;

use crate::config::{Config, StoreBackend};
use crate::models::account::{ACCOUNTS_COLLECTION, ACCOUNT_EMAIL_FIELD};
use document_store::{DocumentStore, MongoDocumentStore, StoreError};
use fcm_client::FcmClient;
use memory_store::InMemoryDocumentStore;
use push_transport::PushTransport;

/// Shared handles, built once at startup and injected into every request
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub push: Arc<dyn PushTransport>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        push: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            config,
            store,
            push,
        }
    }

    /// Builds the configured store and the FCM transport.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn DocumentStore> = match config.store_backend {
            StoreBackend::Mongo => {
                let client = mongodb::Client::with_uri_str(&config.mongo_uri).await?;
                let store = MongoDocumentStore::new(client.database(&config.mongo_database));

                tokio::time::timeout(std::time::Duration::from_secs(5), store.ping())
                    .await
                    .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 5s"))??;
                tracing::info!("MongoDB connected");

                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory document store, data is not persisted");
                Arc::new(InMemoryDocumentStore::new())
            }
        };

        let push: Arc<dyn PushTransport> = Arc::new(FcmClient::new(&config.fcm).map_err(|e| {
            anyhow::anyhow!("{} (FCM settings are required for every store backend)", e)
        })?);

        let state = Self::new(config, store, push);
        state.ensure_indexes().await?;
        Ok(state)
    }

    /// Uniqueness constraints the account flows rely on.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        self.store
            .ensure_unique(ACCOUNTS_COLLECTION, ACCOUNT_EMAIL_FIELD)
            .await
    }

    pub fn triggers(&self) -> trigger_service::TriggerService {
        trigger_service::TriggerService::new(self.store.clone(), self.push.clone())
    }

    pub fn accounts(&self) -> account_service::AccountService {
        account_service::AccountService::new(self.store.clone(), self.config.password_hash_cost)
    }
}

pub mod account_service;
pub mod audience_resolver;
pub mod document_store;
pub mod fcm_client;
pub mod memory_store;
pub mod notification_dispatcher;
pub mod preference_filter;
pub mod push_transport;
pub mod recipient_directory;
pub mod token_collector;
pub mod trigger_service;
