use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::models::{ChangeEvent, ChangeType, CompetitorId, Severity};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Telegram,
    Webhook,
}

impl NotificationChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Telegram => "telegram",
            Self::Webhook => "webhook",
        }
    }
}

impl std::str::FromStr for NotificationChannel {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "email" => Ok(Self::Email),
            "telegram" => Ok(Self::Telegram),
            "webhook" => Ok(Self::Webhook),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub u64);

/// Criteria a change must satisfy before it is delivered to a subscriber.
/// An unset criterion matches everything.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor_ids: Option<Vec<CompetitorId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<ChangeType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

impl SubscriberFilters {
    pub fn matches(&self, change: &ChangeEvent) -> bool {
        if let Some(ids) = &self.competitor_ids
            && !ids.contains(&change.competitor_id)
        {
            return false;
        }

        if let Some(severity) = self.severity
            && severity != change.severity
        {
            return false;
        }

        if let Some(types) = &self.types
            && !types.contains(&change.change_type)
        {
            return false;
        }

        // Record-level changes have no field and pass the field filter.
        if let (Some(fields), Some(field)) = (&self.fields, change.field_name())
            && !fields.iter().any(|candidate| candidate == field)
        {
            return false;
        }

        true
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub channel: NotificationChannel,
    pub address: String,
    pub filters: SubscriberFilters,
    pub created_at: SystemTime,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NewSubscriber {
    pub channel: NotificationChannel,
    pub address: String,
    pub filters: SubscriberFilters,
    pub created_at: SystemTime,
}
