use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

pub const IMPACT_RECORDED: &str = "Изменение зафиксировано";
pub const IMPACT_UNKNOWN: &str = "Неизвестно";

static FINANCIAL_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9,.]+").expect("financial number pattern is valid"));

/// Human-readable delta for a changed field.
///
/// `revenue` is reported as a relative change, `marketShare` in percentage
/// points and `employees` as a head-count difference. Other fields only get a
/// generic marker.
pub fn calculate_impact(field: &str, old: Option<&Value>, new: Option<&Value>) -> String {
    let computed = match field {
        "revenue" => revenue_impact(old, new),
        "marketShare" => market_share_impact(old, new),
        "employees" => employees_impact(old, new),
        _ => return IMPACT_RECORDED.to_string(),
    };
    computed.unwrap_or_else(|| IMPACT_UNKNOWN.to_string())
}

fn revenue_impact(old: Option<&Value>, new: Option<&Value>) -> Option<String> {
    let old = parse_financial_value(old).filter(|value| *value != 0.0)?;
    let new = parse_financial_value(new).filter(|value| *value != 0.0)?;
    let rounded = format!("{:.1}", (new - old) / old * 100.0);
    Some(format!("{}{rounded}%", sign_prefix(&rounded)))
}

fn market_share_impact(old: Option<&Value>, new: Option<&Value>) -> Option<String> {
    let old = leading_float(&js_string(old?))?;
    let new = leading_float(&js_string(new?))?;
    let rounded = format!("{:.1}", new - old);
    Some(format!("{}{rounded} п.п.", sign_prefix(&rounded)))
}

fn employees_impact(old: Option<&Value>, new: Option<&Value>) -> Option<String> {
    let old = leading_integer(&js_string(old?))?;
    let new = leading_integer(&js_string(new?))?;
    let delta = new.saturating_sub(old);
    let prefix = if delta > 0 { "+" } else { "" };
    Some(format!("{prefix}{delta} сотр."))
}

fn sign_prefix(rounded: &str) -> &'static str {
    match rounded.parse::<f64>() {
        Ok(value) if value > 0.0 => "+",
        _ => "",
    }
}

/// Extracts the first number embedded in a money-like value such as
/// `"12.5 млрд ₽ (2024)"`. A decimal comma is accepted.
pub fn parse_financial_value(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    if is_blank(value) {
        return None;
    }

    let text = js_string(value);
    let matched = FINANCIAL_NUMBER.find(&text)?;
    let normalized = matched.as_str().replacen(',', ".", 1);
    leading_float(&normalized)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::String(text) => text.is_empty(),
        Value::Number(number) => number.as_f64().is_none_or(|n| n == 0.0 || n.is_nan()),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Renders a value the way it reads when embedded in text: strings bare,
/// arrays comma-joined.
pub(crate) fn js_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Parses the longest decimal prefix of `raw` after leading whitespace.
/// Trailing text is ignored: `"35%"` yields 35.
pub(crate) fn leading_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }

    let integer_start = end;
    end = skip_digits(bytes, end);
    let mut digits = end - integer_start;

    if bytes.get(end) == Some(&b'.') {
        let fraction_end = skip_digits(bytes, end + 1);
        digits += fraction_end - end - 1;
        if digits > 0 {
            end = fraction_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exponent_end = end + 1;
        if matches!(bytes.get(exponent_end), Some(b'+' | b'-')) {
            exponent_end += 1;
        }
        let exponent_digits_end = skip_digits(bytes, exponent_end);
        if exponent_digits_end > exponent_end {
            end = exponent_digits_end;
        }
    }

    trimmed[..end].parse::<f64>().ok()
}

/// Parses the leading integer of `raw`; `"1200.7"` yields 1200.
pub(crate) fn leading_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let bytes = trimmed.as_bytes();
    let start = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let end = skip_digits(bytes, start);
    if end == start {
        return None;
    }
    trimmed[..end].parse::<i64>().ok()
}

fn skip_digits(bytes: &[u8], mut index: usize) -> usize {
    while bytes.get(index).is_some_and(u8::is_ascii_digit) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn impact(field: &str, old: Value, new: Value) -> String {
        calculate_impact(field, Some(&old), Some(&new))
    }

    #[test]
    fn revenue_growth_is_reported_as_signed_percentage() {
        assert_eq!(
            impact("revenue", json!("12.5 млрд ₽ (2024)"), json!("13.5 млрд ₽ (2025)")),
            "+8.0%"
        );
        assert_eq!(
            impact("revenue", json!("10 млрд ₽"), json!("8,5 млрд ₽")),
            "-15.0%"
        );
    }

    #[test]
    fn revenue_without_numbers_is_unknown() {
        assert_eq!(
            impact("revenue", json!("не раскрывается"), json!("8 млрд ₽")),
            IMPACT_UNKNOWN
        );
        assert_eq!(impact("revenue", json!(0), json!("8 млрд ₽")), IMPACT_UNKNOWN);
        assert_eq!(calculate_impact("revenue", None, Some(&json!("8"))), IMPACT_UNKNOWN);
    }

    #[test]
    fn market_share_delta_uses_percentage_points() {
        assert_eq!(impact("marketShare", json!("35%"), json!("37.5%")), "+2.5 п.п.");
        assert_eq!(impact("marketShare", json!("25%"), json!(20)), "-5.0 п.п.");
        assert_eq!(impact("marketShare", json!("25%"), json!("25%")), "0.0 п.п.");
        assert_eq!(impact("marketShare", json!("~25%"), json!("30%")), IMPACT_UNKNOWN);
    }

    #[test]
    fn employee_delta_is_an_integer_difference() {
        assert_eq!(impact("employees", json!(1200), json!(1350)), "+150 сотр.");
        assert_eq!(impact("employees", json!("800 человек"), json!(750)), "-50 сотр.");
        assert_eq!(impact("employees", json!(null), json!(750)), IMPACT_UNKNOWN);
    }

    #[test]
    fn other_fields_get_generic_marker() {
        assert_eq!(impact("status", json!("Активный"), json!("Закрыт")), IMPACT_RECORDED);
    }

    #[test]
    fn financial_value_takes_first_number_and_decimal_comma() {
        assert_eq!(parse_financial_value(Some(&json!("~50 млрд ₽"))), Some(50.0));
        assert_eq!(parse_financial_value(Some(&json!("8,2 млрд"))), Some(8.2));
        assert_eq!(parse_financial_value(Some(&json!(12.5))), Some(12.5));
        assert_eq!(parse_financial_value(Some(&json!(""))), None);
        assert_eq!(parse_financial_value(Some(&json!(0))), None);
        assert_eq!(parse_financial_value(Some(&json!(null))), None);
        assert_eq!(parse_financial_value(Some(&json!(false))), None);
        assert_eq!(parse_financial_value(None), None);
        assert_eq!(parse_financial_value(Some(&json!("нет данных"))), None);
        assert_eq!(parse_financial_value(Some(&json!("Ltd. only"))), None);
    }

    #[test]
    fn leading_float_ignores_trailing_text() {
        assert_eq!(leading_float("  42.5abc"), Some(42.5));
        assert_eq!(leading_float("5."), Some(5.0));
        assert_eq!(leading_float(".5"), Some(0.5));
        assert_eq!(leading_float("1e3x"), Some(1000.0));
        assert_eq!(leading_float("-"), None);
        assert_eq!(leading_float("."), None);
    }

    #[test]
    fn leading_integer_truncates_fraction() {
        assert_eq!(leading_integer("1200.7"), Some(1200));
        assert_eq!(leading_integer(" -3 чел"), Some(-3));
        assert_eq!(leading_integer("чел"), None);
    }
}
