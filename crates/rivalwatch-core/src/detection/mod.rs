pub mod impact;

pub use impact::{IMPACT_RECORDED, IMPACT_UNKNOWN, calculate_impact, parse_financial_value};

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::SystemTime;

use serde_json::Value;

use crate::models::{ChangeEvent, ChangeType, CompetitorId, CompetitorRecord, Severity};

pub const DEFAULT_CRITICAL_FIELDS: [&str; 4] = ["revenue", "marketShare", "employees", "status"];
pub const DEFAULT_SIGNIFICANT_FIELDS: [&str; 3] = ["pricing", "services", "features"];

/// Field classification used when diffing two snapshots.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DetectionRules {
    pub critical_fields: Vec<String>,
    pub significant_fields: Vec<String>,
    pub report_removed: bool,
}

impl Default for DetectionRules {
    fn default() -> Self {
        Self {
            critical_fields: DEFAULT_CRITICAL_FIELDS.map(str::to_string).to_vec(),
            significant_fields: DEFAULT_SIGNIFICANT_FIELDS.map(str::to_string).to_vec(),
            report_removed: true,
        }
    }
}

impl DetectionRules {
    pub fn classify(&self, field: &str) -> (ChangeType, Severity) {
        if self.critical_fields.iter().any(|candidate| candidate == field) {
            (ChangeType::CriticalUpdate, Severity::Critical)
        } else if self.significant_fields.iter().any(|candidate| candidate == field) {
            (ChangeType::SignificantUpdate, Severity::Warning)
        } else {
            (ChangeType::FieldUpdated, Severity::Info)
        }
    }
}

/// Diffs `previous` against `current`.
///
/// Records are matched by id; the first occurrence of an id in `previous`
/// wins. Output follows the order of `current`, with removals appended in
/// the order of `previous`. All events share the timestamp `now`.
pub fn detect_changes(
    previous: &[CompetitorRecord],
    current: &[CompetitorRecord],
    rules: &DetectionRules,
    now: SystemTime,
) -> Vec<ChangeEvent> {
    let mut previous_by_id: HashMap<CompetitorId, &CompetitorRecord> = HashMap::new();
    for record in previous {
        previous_by_id.entry(record.id).or_insert(record);
    }

    let mut changes = Vec::new();
    for record in current {
        match previous_by_id.get(&record.id) {
            None => changes.push(record_event(
                record,
                ChangeType::NewCompetitor,
                Severity::Info,
                now,
            )),
            Some(before) => diff_fields(before, record, rules, now, &mut changes),
        }
    }

    if rules.report_removed {
        let current_ids: HashSet<CompetitorId> = current.iter().map(|record| record.id).collect();
        let mut reported = HashSet::new();
        for record in previous {
            if !current_ids.contains(&record.id) && reported.insert(record.id) {
                changes.push(record_event(
                    record,
                    ChangeType::CompetitorRemoved,
                    Severity::Warning,
                    now,
                ));
            }
        }
    }

    changes
}

fn diff_fields(
    before: &CompetitorRecord,
    after: &CompetitorRecord,
    rules: &DetectionRules,
    now: SystemTime,
    changes: &mut Vec<ChangeEvent>,
) {
    let keys: BTreeSet<&String> = before.fields.keys().chain(after.fields.keys()).collect();
    let competitor_name = after.display_name();

    for key in keys {
        let old_value = before.fields.get(key);
        let new_value = after.fields.get(key);
        if json_equal(old_value, new_value) {
            continue;
        }

        let (change_type, severity) = rules.classify(key);
        changes.push(ChangeEvent {
            change_type,
            competitor_id: after.id,
            competitor_name: competitor_name.clone(),
            field: Some(key.clone()),
            old_value: old_value.cloned(),
            new_value: new_value.cloned(),
            data: None,
            timestamp: now,
            severity,
            impact: Some(calculate_impact(key, old_value, new_value)),
        });
    }
}

/// Deep equality where numbers compare by value, so `1200` equals `1200.0`.
fn json_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(left), Some(right)) => values_equal(left, right),
        _ => false,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => left.as_f64() == right.as_f64(),
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len()
                && left.iter().zip(right).all(|(left, right)| values_equal(left, right))
        }
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left.iter().all(|(key, value)| {
                    right
                        .get(key)
                        .is_some_and(|other| values_equal(value, other))
                })
        }
        _ => left == right,
    }
}

fn record_event(
    record: &CompetitorRecord,
    change_type: ChangeType,
    severity: Severity,
    now: SystemTime,
) -> ChangeEvent {
    ChangeEvent {
        change_type,
        competitor_id: record.id,
        competitor_name: record.display_name(),
        field: None,
        old_value: None,
        new_value: None,
        data: Some(record.to_value()),
        timestamp: now,
        severity,
        impact: None,
    }
}
