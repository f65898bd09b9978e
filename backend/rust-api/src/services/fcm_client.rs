use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::config::FcmSettings;
use crate::models::notification::PushMessage;
use crate::services::push_transport::{MulticastReport, PushError, PushTransport};

/// Firebase Cloud Messaging HTTP v1 client.
///
/// FCM v1 has no multicast endpoint, so a batch is fanned out as one request
/// per token (bounded by `max_concurrency`) and the results are aggregated.
#[derive(Clone, Debug)]
pub struct FcmClient {
    http: Client,
    send_url: String,
    access_token: String,
    max_concurrency: usize,
}

impl FcmClient {
    pub fn new(settings: &FcmSettings) -> Result<Self, PushError> {
        if settings.project_id.is_empty() {
            return Err(PushError::Config(
                "FCM project id is not set (FCM_PROJECT_ID or fcm.project_id)".to_string(),
            ));
        }

        let endpoint = settings.endpoint.trim_end_matches('/');
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(PushError::Config(format!(
                "Invalid FCM endpoint: {}",
                settings.endpoint
            )));
        }

        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            http,
            send_url: format!(
                "{}/v1/projects/{}/messages:send",
                endpoint, settings.project_id
            ),
            access_token: settings.access_token.clone(),
            max_concurrency: settings.max_concurrency.max(1),
        })
    }

    async fn send_one(&self, token: &str, message: &PushMessage) -> bool {
        let body = json!({
            "message": {
                "token": token,
                "notification": {
                    "title": message.title,
                    "body": message.body,
                },
                "data": message.data,
            }
        });

        let result = self
            .http
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                let status = response.status();
                let detail = response.text().await.unwrap_or_default();
                tracing::debug!("FCM rejected token (status {}): {}", status, detail);
                false
            }
            Err(e) => {
                tracing::debug!("FCM request failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl PushTransport for FcmClient {
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError> {
        let sends: Vec<_> = tokens.iter().map(|token| self.send_one(token, message)).collect();
        let outcomes: Vec<bool> = stream::iter(sends)
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let success_count = outcomes.iter().filter(|ok| **ok).count();
        Ok(MulticastReport {
            success_count,
            failure_count: outcomes.len() - success_count,
        })
    }
}
