#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::Request,
    Router,
};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;
use carelink_api::{
    config::{Config, FcmSettings, StoreBackend},
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::notification::PushMessage,
    services::{
        memory_store::InMemoryDocumentStore,
        push_transport::{MulticastReport, PushError, PushTransport},
        AppState,
    },
};

pub const TEST_JWT_SECRET: &str = "test-secret";

pub fn test_config() -> Config {
    Config {
        mongo_uri: "mongodb://localhost:27017".to_string(),
        mongo_database: "carelink_test".to_string(),
        store_backend: StoreBackend::Memory,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        // bcrypt minimum, keeps account tests fast
        password_hash_cost: 4,
        listen_addr: "127.0.0.1:0".to_string(),
        trigger_secret: None,
        fcm: FcmSettings {
            endpoint: "http://localhost:9099".to_string(),
            project_id: "carelink-test".to_string(),
            access_token: String::new(),
            max_concurrency: 4,
        },
    }
}

/// One `send_multicast` call as seen by the transport
#[derive(Debug, Clone)]
pub struct SentBatch {
    pub tokens: Vec<String>,
    pub message: PushMessage,
}

/// Push transport that records every batch instead of talking to FCM
#[derive(Default)]
pub struct RecordingPushTransport {
    batches: Mutex<Vec<SentBatch>>,
    failing_tokens: HashSet<String>,
    unavailable: bool,
}

impl RecordingPushTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens reported back as per-token failures
    pub fn with_failing_tokens(tokens: &[&str]) -> Self {
        Self {
            failing_tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Every call fails as a whole
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub async fn batches(&self) -> Vec<SentBatch> {
        self.batches.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.batches.lock().await.len()
    }
}

#[async_trait]
impl PushTransport for RecordingPushTransport {
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError> {
        self.batches.lock().await.push(SentBatch {
            tokens: tokens.to_vec(),
            message: message.clone(),
        });

        if self.unavailable {
            return Err(PushError::Config("transport unavailable".to_string()));
        }

        let failure_count = tokens
            .iter()
            .filter(|token| self.failing_tokens.contains(token.as_str()))
            .count();
        Ok(MulticastReport {
            success_count: tokens.len() - failure_count,
            failure_count,
        })
    }
}

pub struct TestApp {
    pub store: Arc<InMemoryDocumentStore>,
    pub push: Arc<RecordingPushTransport>,
    pub state: Arc<AppState>,
    pub router: Router,
}

pub async fn create_test_app() -> TestApp {
    create_test_app_with(test_config(), RecordingPushTransport::new()).await
}

pub async fn create_test_app_with(config: Config, push: RecordingPushTransport) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(InMemoryDocumentStore::new());
    let push = Arc::new(push);
    let state = Arc::new(AppState::new(config, store.clone(), push.clone()));
    state.ensure_indexes().await.unwrap();
    let router = create_router(state.clone());

    TestApp {
        store,
        push,
        state,
        router,
    }
}

pub async fn seed_staff(store: &InMemoryDocumentStore, record: serde_json::Value) {
    store.seed("staffs", &record).await.unwrap();
}

pub async fn seed_family(store: &InMemoryDocumentStore, record: serde_json::Value) {
    store.seed("families", &record).await.unwrap();
}

pub async fn seed_chat(store: &InMemoryDocumentStore, chat_id: &str, participants: &[&str]) {
    store
        .seed("chats", &json!({ "_id": chat_id, "participants": participants }))
        .await
        .unwrap();
}

pub fn token_for(uid: &str, role: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    JwtService::new(TEST_JWT_SECRET)
        .generate_token(&JwtClaims {
            sub: uid.to_string(),
            role: role.to_string(),
            exp: (now + 3600) as usize,
            iat: now as usize,
        })
        .unwrap()
}

/// Seeds a staff record for `uid` and returns a bearer token for it.
pub async fn staff_with_token(app: &TestApp, uid: &str) -> String {
    seed_staff(&app.store, json!({ "uid": uid, "fcmTokens": [] })).await;
    token_for(uid, "staff")
}

pub async fn send_json(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (axum::http::StatusCode, serde_json::Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}
