use std::time::SystemTime;

use serde_json::Value;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::detection::impact::js_string;
use crate::models::{CoreError, CoreErrorKind, CoreResult};

/// `28.09.2025, 14:03:05` in the given offset.
pub fn format_local_timestamp(timestamp: SystemTime, offset: UtcOffset) -> CoreResult<String> {
    OffsetDateTime::from(timestamp)
        .to_offset(offset)
        .format(format_description!(
            "[day].[month].[year], [hour]:[minute]:[second]"
        ))
        .map_err(format_error)
}

/// UTC with millisecond precision: `2025-09-28T11:03:05.120Z`.
pub fn format_iso_timestamp(timestamp: SystemTime) -> CoreResult<String> {
    OffsetDateTime::from(timestamp)
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
        ))
        .map_err(format_error)
}

/// Whether a value is worth printing: absent, null, `false`, `0` and `""`
/// are skipped.
pub fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

pub fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|candidate| is_present(Some(*candidate)))
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::Object(_) => value.to_string(),
        other => js_string(other),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn format_error(error: time::error::Format) -> CoreError {
    CoreError::new(
        CoreErrorKind::Internal,
        format!("failed to format notification timestamp: {error}"),
    )
}
