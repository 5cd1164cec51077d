use anyhow::Result;
use rivalwatch_core::models::{
    ChangeEvent, ChangeType, CompetitorId, NotificationChannel, Severity, Subscriber,
    SubscriberFilters, SubscriberId,
};
use rivalwatch_core::notifications::format::format_iso_timestamp;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeView<'a> {
    #[serde(rename = "type")]
    change_type: ChangeType,
    severity: Severity,
    competitor_id: CompetitorId,
    competitor_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    old_value: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_value: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    impact: Option<&'a str>,
    timestamp: String,
}

impl<'a> ChangeView<'a> {
    pub fn new(change: &'a ChangeEvent) -> Result<Self> {
        Ok(Self {
            change_type: change.change_type,
            severity: change.severity,
            competitor_id: change.competitor_id,
            competitor_name: &change.competitor_name,
            field: change.field_name(),
            old_value: change.old_value.as_ref(),
            new_value: change.new_value.as_ref(),
            data: change.data.as_ref(),
            impact: change.impact.as_deref(),
            timestamp: format_iso_timestamp(change.timestamp)?,
        })
    }

    pub fn all(changes: &'a [ChangeEvent]) -> Result<Vec<Self>> {
        changes.iter().map(Self::new).collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberView<'a> {
    id: SubscriberId,
    channel: NotificationChannel,
    address: &'a str,
    filters: &'a SubscriberFilters,
    created_at: String,
}

impl<'a> SubscriberView<'a> {
    pub fn new(subscriber: &'a Subscriber) -> Result<Self> {
        Ok(Self {
            id: subscriber.id,
            channel: subscriber.channel,
            address: &subscriber.address,
            filters: &subscriber.filters,
            created_at: format_iso_timestamp(subscriber.created_at)?,
        })
    }
}

pub fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
