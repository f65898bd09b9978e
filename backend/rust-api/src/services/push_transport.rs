use async_trait::async_trait;
use serde::Serialize;

use crate::models::notification::PushMessage;

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Push transport misconfigured: {0}")]
    Config(String),

    #[error("Push request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Aggregate outcome of one multicast call
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct MulticastReport {
    pub success_count: usize,
    pub failure_count: usize,
}

/// Delivery channel for push notifications.
///
/// One call carries the whole token batch; per-token failures are reported
/// through the counts, `Err` means the batch as a whole could not be attempted.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send_multicast(
        &self,
        tokens: &[String],
        message: &PushMessage,
    ) -> Result<MulticastReport, PushError>;
}
