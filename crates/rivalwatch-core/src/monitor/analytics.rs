use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::models::ChangeEvent;

const TOP_ENTRIES: usize = 5;

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RankedCount {
    pub name: String,
    pub count: usize,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeAnalytics {
    pub period_days: u32,
    pub total_changes: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
    pub by_competitor: BTreeMap<String, usize>,
    pub most_active_competitors: Vec<RankedCount>,
    pub trending_fields: Vec<RankedCount>,
}

/// Aggregates `changes`, which must already be limited to the period.
/// Rankings are by count, descending; ties keep first-seen order.
pub fn summarize(changes: &[ChangeEvent], period_days: u32) -> ChangeAnalytics {
    let mut by_type = BTreeMap::new();
    let mut by_severity = BTreeMap::new();
    let mut competitors = FirstSeenCounter::default();
    let mut fields = FirstSeenCounter::default();

    for change in changes {
        *by_type
            .entry(change.change_type.as_str().to_string())
            .or_insert(0) += 1;
        *by_severity
            .entry(change.severity.as_str().to_string())
            .or_insert(0) += 1;
        competitors.add(&change.competitor_name);
        if let Some(field) = change.field_name() {
            fields.add(field);
        }
    }

    ChangeAnalytics {
        period_days,
        total_changes: changes.len(),
        by_type,
        by_severity,
        by_competitor: competitors.entries.iter().cloned().collect(),
        most_active_competitors: competitors.top(TOP_ENTRIES),
        trending_fields: fields.top(TOP_ENTRIES),
    }
}

#[derive(Default)]
struct FirstSeenCounter {
    positions: HashMap<String, usize>,
    entries: Vec<(String, usize)>,
}

impl FirstSeenCounter {
    fn add(&mut self, key: &str) {
        match self.positions.get(key) {
            Some(&position) => self.entries[position].1 += 1,
            None => {
                self.positions.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), 1));
            }
        }
    }

    fn top(&self, limit: usize) -> Vec<RankedCount> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|first, second| second.1.cmp(&first.1));
        ranked
            .into_iter()
            .take(limit)
            .map(|(name, count)| RankedCount { name, count })
            .collect()
    }
}
