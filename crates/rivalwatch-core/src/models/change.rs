use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::CompetitorId;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Critical => "🚨",
            Self::Warning => "⚠️",
            Self::Info => "ℹ️",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Self::Critical),
            "WARNING" => Ok(Self::Warning),
            "INFO" => Ok(Self::Info),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    NewCompetitor,
    CompetitorRemoved,
    CriticalUpdate,
    SignificantUpdate,
    FieldUpdated,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewCompetitor => "NEW_COMPETITOR",
            Self::CompetitorRemoved => "COMPETITOR_REMOVED",
            Self::CriticalUpdate => "CRITICAL_UPDATE",
            Self::SignificantUpdate => "SIGNIFICANT_UPDATE",
            Self::FieldUpdated => "FIELD_UPDATED",
        }
    }
}

impl std::str::FromStr for ChangeType {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "NEW_COMPETITOR" => Ok(Self::NewCompetitor),
            "COMPETITOR_REMOVED" => Ok(Self::CompetitorRemoved),
            "CRITICAL_UPDATE" => Ok(Self::CriticalUpdate),
            "SIGNIFICANT_UPDATE" => Ok(Self::SignificantUpdate),
            "FIELD_UPDATED" => Ok(Self::FieldUpdated),
            _ => Err(()),
        }
    }
}

/// A single detected difference between two snapshots.
///
/// Field-level events carry `field`, `old_value`, `new_value` and `impact`.
/// Record-level events (`NewCompetitor`, `CompetitorRemoved`) carry the
/// whole record in `data` instead.
///
/// Outward JSON goes through views that render `timestamp` as ISO 8601.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeEvent {
    pub change_type: ChangeType,
    pub competitor_id: CompetitorId,
    pub competitor_name: String,
    pub field: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub data: Option<Value>,
    pub timestamp: SystemTime,
    pub severity: Severity,
    pub impact: Option<String>,
}

impl ChangeEvent {
    pub fn field_name(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("critical".parse::<Severity>(), Ok(Severity::Critical));
        assert_eq!("Warning".parse::<Severity>(), Ok(Severity::Warning));
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn change_type_serializes_with_its_wire_name() {
        assert_eq!(
            serde_json::to_value(ChangeType::SignificantUpdate).unwrap(),
            serde_json::Value::String("SIGNIFICANT_UPDATE".to_string())
        );
        assert_eq!(
            "new_competitor".parse::<ChangeType>(),
            Ok(ChangeType::NewCompetitor)
        );
    }
}
