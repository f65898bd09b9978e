use serde::Serialize;
use std::sync::Arc;

use crate::metrics::{TRIGGERS_TOTAL, TRIGGER_DURATION_SECONDS};
use crate::models::notification::{DispatchResult, NotificationCategory, NotificationPayload};
use crate::models::recipient::Recipient;
use crate::models::trigger::{Announcement, Assessment, ChatMessage, EventDocument, TriggerEvent};
use crate::services::audience_resolver::{chat_audience, is_publication_edge, AudienceResolver};
use crate::services::document_store::{DocumentStore, StoreError};
use crate::services::notification_dispatcher::{
    announcement_payload, assessment_payload, chat_payload, event_payload, NotificationDispatcher,
};
use crate::services::push_transport::{PushError, PushTransport};
use crate::services::{preference_filter, token_collector};

#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("Document store failure: {0}")]
    Store(#[from] StoreError),

    #[error("Push transport failure: {0}")]
    Transport(#[from] PushError),
}

/// Progress of a single trigger invocation
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandlerStage {
    Start,
    AudienceResolved,
    RecipientsFetched,
    TokensCollected,
    Dispatched,
}

/// Why a trigger finished without calling the push transport
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ChatNotFound,
    EmptyAudience,
    NoTokens,
    NotPublished,
    NotPublicationEdge,
    MissingChildId,
}

/// Terminal state of a trigger invocation. Handlers never fail; errors end in `Errored`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Skipped { reason: SkipReason },
    Dispatched(DispatchResult),
    Errored { stage: HandlerStage },
}

impl TriggerOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TriggerOutcome::Skipped { .. } => "skipped",
            TriggerOutcome::Dispatched(_) => "dispatched",
            TriggerOutcome::Errored { .. } => "errored",
        }
    }
}

fn skipped(reason: SkipReason) -> TriggerOutcome {
    TriggerOutcome::Skipped { reason }
}

/// Logs the outcome and converts any failure into `Errored`. This is the
/// only exit of every handler: nothing is propagated to the event source,
/// so the hosting system never re-delivers (and never double-sends).
fn finish(
    category: NotificationCategory,
    stage: HandlerStage,
    result: Result<TriggerOutcome, FanoutError>,
) -> TriggerOutcome {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                category = %category,
                stage = ?stage,
                "Notification trigger failed: {}",
                e
            );
            TriggerOutcome::Errored { stage }
        }
    };

    match &outcome {
        TriggerOutcome::Dispatched(result) if result.failure_count > 0 => {
            tracing::warn!(
                category = %category,
                "{} notification partially delivered: {} succeeded, {} failed",
                category,
                result.success_count,
                result.failure_count
            );
        }
        TriggerOutcome::Dispatched(result) => {
            tracing::info!(
                category = %category,
                "{} notification sent: {} succeeded",
                category,
                result.success_count
            );
        }
        TriggerOutcome::Skipped { reason } => {
            tracing::debug!(category = %category, reason = ?reason, "Notification trigger skipped");
        }
        TriggerOutcome::Errored { .. } => {}
    }

    TRIGGERS_TOTAL
        .with_label_values(&[category.as_str(), outcome.label()])
        .inc();

    outcome
}

/// Entry points for the four document events that produce push notifications
pub struct TriggerService {
    audience: AudienceResolver,
    dispatcher: NotificationDispatcher,
}

impl TriggerService {
    pub fn new(store: Arc<dyn DocumentStore>, push: Arc<dyn PushTransport>) -> Self {
        Self {
            audience: AudienceResolver::new(store),
            dispatcher: NotificationDispatcher::new(push),
        }
    }

    /// Parses a raw delivery from the event system and runs the matching handler.
    pub async fn handle_delivery(&self, delivery: serde_json::Value) -> TriggerOutcome {
        match serde_json::from_value::<TriggerEvent>(delivery) {
            Ok(event) => self.handle(event).await,
            Err(e) => {
                tracing::error!("Malformed trigger delivery: {}", e);
                TRIGGERS_TOTAL
                    .with_label_values(&["unknown", "errored"])
                    .inc();
                TriggerOutcome::Errored {
                    stage: HandlerStage::Start,
                }
            }
        }
    }

    pub async fn handle(&self, event: TriggerEvent) -> TriggerOutcome {
        match event {
            TriggerEvent::ChatMessageCreated { params, data } => {
                self.on_chat_message_created(&params.chat_id, &data).await
            }
            TriggerEvent::NotificationCreated { params, data } => {
                self.on_notification_created(&params.notification_id, &data)
                    .await
            }
            TriggerEvent::EventCreated { params, data } => {
                self.on_event_created(&params.event_id, &data).await
            }
            TriggerEvent::AssessmentPublished {
                params,
                before,
                after,
            } => {
                self.on_assessment_published(&params.assessment_id, before.as_ref(), &after)
                    .await
            }
        }
    }

    pub async fn on_chat_message_created(&self, chat_id: &str, message: &ChatMessage) -> TriggerOutcome {
        let category = NotificationCategory::Chat;
        let _timer = TRIGGER_DURATION_SECONDS
            .with_label_values(&[category.as_str()])
            .start_timer();

        let mut stage = HandlerStage::Start;
        let result = self.chat_message_created(chat_id, message, &mut stage).await;
        finish(category, stage, result)
    }

    pub async fn on_notification_created(
        &self,
        notification_id: &str,
        announcement: &Announcement,
    ) -> TriggerOutcome {
        let category = NotificationCategory::Announcement;
        let _timer = TRIGGER_DURATION_SECONDS
            .with_label_values(&[category.as_str()])
            .start_timer();

        let mut stage = HandlerStage::Start;
        let result = self
            .notification_created(notification_id, announcement, &mut stage)
            .await;
        finish(category, stage, result)
    }

    pub async fn on_event_created(&self, event_id: &str, event: &EventDocument) -> TriggerOutcome {
        let category = NotificationCategory::Event;
        let _timer = TRIGGER_DURATION_SECONDS
            .with_label_values(&[category.as_str()])
            .start_timer();

        let mut stage = HandlerStage::Start;
        let result = self.event_created(event_id, event, &mut stage).await;
        finish(category, stage, result)
    }

    pub async fn on_assessment_published(
        &self,
        assessment_id: &str,
        before: Option<&Assessment>,
        after: &Assessment,
    ) -> TriggerOutcome {
        let category = NotificationCategory::Assessment;
        let _timer = TRIGGER_DURATION_SECONDS
            .with_label_values(&[category.as_str()])
            .start_timer();

        let mut stage = HandlerStage::Start;
        let result = self
            .assessment_published(assessment_id, before, after, &mut stage)
            .await;
        finish(category, stage, result)
    }

    async fn chat_message_created(
        &self,
        chat_id: &str,
        message: &ChatMessage,
        stage: &mut HandlerStage,
    ) -> Result<TriggerOutcome, FanoutError> {
        let Some(chat) = self.audience.load_chat(chat_id).await? else {
            return Ok(skipped(SkipReason::ChatNotFound));
        };

        let audience = chat_audience(&chat, message.sender_id.as_deref());
        if audience.is_empty() {
            return Ok(skipped(SkipReason::EmptyAudience));
        }
        *stage = HandlerStage::AudienceResolved;

        let recipients = self.audience.directory().resolve_many(&audience).await?;
        *stage = HandlerStage::RecipientsFetched;

        self.deliver(recipients, chat_payload(chat_id, message), stage)
            .await
    }

    async fn notification_created(
        &self,
        notification_id: &str,
        announcement: &Announcement,
        stage: &mut HandlerStage,
    ) -> Result<TriggerOutcome, FanoutError> {
        let recipients = self.audience.announcement_audience(announcement).await?;
        self.deliver_to_audience(
            recipients,
            announcement_payload(notification_id, announcement),
            stage,
        )
        .await
    }

    async fn event_created(
        &self,
        event_id: &str,
        event: &EventDocument,
        stage: &mut HandlerStage,
    ) -> Result<TriggerOutcome, FanoutError> {
        if event.is_published != Some(true) {
            return Ok(skipped(SkipReason::NotPublished));
        }

        let recipients = self.audience.event_audience().await?;
        self.deliver_to_audience(recipients, event_payload(event_id, event), stage)
            .await
    }

    async fn assessment_published(
        &self,
        assessment_id: &str,
        before: Option<&Assessment>,
        after: &Assessment,
        stage: &mut HandlerStage,
    ) -> Result<TriggerOutcome, FanoutError> {
        if !is_publication_edge(before, after) {
            return Ok(skipped(SkipReason::NotPublicationEdge));
        }

        let Some(child_id) = after.child_id.as_deref().filter(|id| !id.is_empty()) else {
            return Ok(skipped(SkipReason::MissingChildId));
        };

        let recipients = self.audience.assessment_audience(child_id, after).await?;
        self.deliver_to_audience(recipients, assessment_payload(assessment_id, after), stage)
            .await
    }

    /// Bulk audiences arrive as already-fetched family records, so resolving
    /// the audience and fetching recipients happen in one step.
    async fn deliver_to_audience(
        &self,
        recipients: Vec<Recipient>,
        payload: NotificationPayload,
        stage: &mut HandlerStage,
    ) -> Result<TriggerOutcome, FanoutError> {
        if recipients.is_empty() {
            return Ok(skipped(SkipReason::EmptyAudience));
        }
        *stage = HandlerStage::RecipientsFetched;

        self.deliver(recipients, payload, stage).await
    }

    async fn deliver(
        &self,
        recipients: Vec<Recipient>,
        payload: NotificationPayload,
        stage: &mut HandlerStage,
    ) -> Result<TriggerOutcome, FanoutError> {
        let recipients = preference_filter::retain_included(recipients, payload.category);
        let tokens = token_collector::collect(&recipients);
        *stage = HandlerStage::TokensCollected;

        if tokens.is_empty() {
            return Ok(skipped(SkipReason::NoTokens));
        }

        let result = self.dispatcher.dispatch(&tokens, &payload).await?;
        *stage = HandlerStage::Dispatched;

        Ok(TriggerOutcome::Dispatched(result))
    }
}
