use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::models::{
    ChangeEvent, CompetitorId, CoreError, CoreErrorKind, CoreResult, NotificationChannel,
};
use crate::notifications::Notifier;
use crate::notifications::format::format_iso_timestamp;
use crate::notifications::http::JsonPoster;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WebhookPayload<'a> {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub change_type: &'static str,
    pub severity: &'static str,
    pub competitor: WebhookCompetitor<'a>,
    pub change: WebhookChange<'a>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WebhookCompetitor<'a> {
    pub id: CompetitorId,
    pub name: &'a str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookChange<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<&'a str>,
}

impl<'a> WebhookPayload<'a> {
    pub fn from_change(change: &'a ChangeEvent) -> CoreResult<Self> {
        Ok(Self {
            timestamp: format_iso_timestamp(change.timestamp)?,
            change_type: change.change_type.as_str(),
            severity: change.severity.as_str(),
            competitor: WebhookCompetitor {
                id: change.competitor_id,
                name: &change.competitor_name,
            },
            change: WebhookChange {
                field: change.field_name(),
                old_value: change.old_value.as_ref(),
                new_value: change.new_value.as_ref(),
                impact: change.impact.as_deref(),
            },
        })
    }
}

/// Posts a JSON payload per change. With no poster configured the payload
/// is only logged.
pub struct WebhookNotifier {
    poster: Option<Arc<dyn JsonPoster>>,
}

impl WebhookNotifier {
    pub fn new(poster: Option<Arc<dyn JsonPoster>>) -> Self {
        Self { poster }
    }

    pub fn payload(change: &ChangeEvent) -> CoreResult<Value> {
        let payload = WebhookPayload::from_change(change)?;
        serde_json::to_value(&payload).map_err(|error| {
            CoreError::new(
                CoreErrorKind::Internal,
                format!("failed to encode webhook payload: {error}"),
            )
        })
    }
}

impl Notifier for WebhookNotifier {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Webhook
    }

    fn send(&self, address: &str, change: &ChangeEvent) -> CoreResult<()> {
        let payload = Self::payload(change)?;

        let Some(poster) = &self.poster else {
            tracing::info!(url = %address, %payload, "webhook notification recorded");
            return Ok(());
        };

        poster.post_json(address, &payload).map_err(|error| {
            error
                .with_competitor(change.competitor_id)
                .with_channel(NotificationChannel::Webhook)
        })
    }
}
