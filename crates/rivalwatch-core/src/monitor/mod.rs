pub mod analytics;

pub use analytics::{ChangeAnalytics, RankedCount, summarize};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::MonitorConfig;
use crate::detection::{DetectionRules, detect_changes};
use crate::models::{
    ChangeEvent, CompetitorId, CompetitorRecord, CoreError, CoreErrorKind, CoreResult,
};
use crate::notifications::{DeliveryReport, NotificationManager};
use crate::persistence::ChangeHistoryStore;

pub const WILDCARD_FIELD: &str = "*";
pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_ANALYTICS_PERIOD_DAYS: u32 = 30;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

pub type WatcherCallback = Arc<dyn Fn(&ChangeEvent) -> CoreResult<()> + Send + Sync>;

struct Watcher {
    fields: Vec<String>,
    callback: WatcherCallback,
}

impl Watcher {
    fn matches(&self, change: &ChangeEvent) -> bool {
        self.fields.iter().any(|field| {
            field == WILDCARD_FIELD || change.field_name() == Some(field.as_str())
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CheckReport {
    pub changes: Vec<ChangeEvent>,
    pub delivery: DeliveryReport,
}

/// Detects changes between snapshots, records them and fans them out to
/// watchers and notification subscribers.
pub struct ChangeMonitor {
    rules: DetectionRules,
    max_history_entries: Option<usize>,
    history: Arc<dyn ChangeHistoryStore>,
    notifications: NotificationManager,
    watchers: Mutex<HashMap<CompetitorId, Vec<Watcher>>>,
}

impl ChangeMonitor {
    pub fn new(history: Arc<dyn ChangeHistoryStore>, notifications: NotificationManager) -> Self {
        Self {
            rules: DetectionRules::default(),
            max_history_entries: None,
            history,
            notifications,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(
        config: &MonitorConfig,
        history: Arc<dyn ChangeHistoryStore>,
        notifications: NotificationManager,
    ) -> Self {
        Self::new(history, notifications)
            .with_rules(config.detection_rules())
            .with_history_limit(config.max_history_entries)
    }

    pub fn with_rules(mut self, rules: DetectionRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_history_limit(mut self, max_entries: Option<usize>) -> Self {
        self.max_history_entries = max_entries;
        self
    }

    pub fn rules(&self) -> &DetectionRules {
        &self.rules
    }

    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    /// Registers `callback` for changes of `competitor_id` touching any of
    /// `fields`. `"*"` matches every change, including record-level ones.
    pub fn add_watcher<I, S>(
        &self,
        competitor_id: CompetitorId,
        fields: I,
        callback: WatcherCallback,
    ) -> CoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if fields.is_empty() {
            return Err(CoreError::invalid_input("watcher must name at least one field")
                .with_competitor(competitor_id));
        }

        self.lock_watchers()?
            .entry(competitor_id)
            .or_default()
            .push(Watcher { fields, callback });

        tracing::debug!(competitor_id = competitor_id.0, "change watcher added");
        Ok(())
    }

    pub fn detect_changes(
        &self,
        previous: &[CompetitorRecord],
        current: &[CompetitorRecord],
    ) -> Vec<ChangeEvent> {
        detect_changes(previous, current, &self.rules, SystemTime::now())
    }

    pub fn check_changes(
        &self,
        previous: &[CompetitorRecord],
        current: &[CompetitorRecord],
    ) -> CoreResult<Vec<ChangeEvent>> {
        Ok(self.run_check(previous, current, SystemTime::now())?.changes)
    }

    /// Detects and processes changes stamped with `now`.
    pub fn run_check(
        &self,
        previous: &[CompetitorRecord],
        current: &[CompetitorRecord],
        now: SystemTime,
    ) -> CoreResult<CheckReport> {
        let changes = detect_changes(previous, current, &self.rules, now);
        let mut delivery = DeliveryReport::default();

        for change in &changes {
            delivery.absorb(self.process_change(change)?);
        }

        tracing::info!(
            previous = previous.len(),
            current = current.len(),
            changes = changes.len(),
            delivered = delivery.delivered,
            failed = delivery.failed,
            "change check completed"
        );

        Ok(CheckReport { changes, delivery })
    }

    /// Records `change`, runs matching watchers and notifies subscribers.
    /// Only a history write failure is returned as an error.
    pub fn process_change(&self, change: &ChangeEvent) -> CoreResult<DeliveryReport> {
        self.history
            .append_change(change)
            .map_err(|error| error.with_competitor(change.competitor_id))?;

        if let Some(max_entries) = self.max_history_entries {
            let pruned = self.history.prune_to(max_entries)?;
            if pruned > 0 {
                tracing::debug!(pruned, max_entries, "change history pruned");
            }
        }

        self.notify_watchers(change)?;

        let delivery = match self.notifications.send_notification(change) {
            Ok(report) => report,
            Err(error) => {
                tracing::error!(
                    competitor_id = change.competitor_id.0,
                    kind = ?error.kind,
                    message = %error.message,
                    "failed to look up notification subscribers"
                );
                DeliveryReport::default()
            }
        };

        tracing::info!(
            change_type = change.change_type.as_str(),
            severity = change.severity.as_str(),
            competitor = %change.competitor_name,
            field = change.field_name().unwrap_or("-"),
            "change processed"
        );

        Ok(delivery)
    }

    pub fn change_history(
        &self,
        competitor_id: Option<CompetitorId>,
        limit: usize,
    ) -> CoreResult<Vec<ChangeEvent>> {
        self.history.list_changes(competitor_id, limit)
    }

    pub fn change_analytics(&self, period_days: u32) -> CoreResult<ChangeAnalytics> {
        self.change_analytics_at(period_days, SystemTime::now())
    }

    pub fn change_analytics_at(
        &self,
        period_days: u32,
        now: SystemTime,
    ) -> CoreResult<ChangeAnalytics> {
        let span = Duration::from_secs(u64::from(period_days) * SECONDS_PER_DAY);
        let cutoff = now
            .checked_sub(span)
            .map_or(UNIX_EPOCH, |cutoff| cutoff.max(UNIX_EPOCH));
        let recent = self.history.changes_since(cutoff)?;
        Ok(summarize(&recent, period_days))
    }

    fn notify_watchers(&self, change: &ChangeEvent) -> CoreResult<()> {
        // Callbacks run outside the lock so they may register more watchers.
        let callbacks: Vec<WatcherCallback> = self
            .lock_watchers()?
            .get(&change.competitor_id)
            .map(|watchers| {
                watchers
                    .iter()
                    .filter(|watcher| watcher.matches(change))
                    .map(|watcher| watcher.callback.clone())
                    .collect()
            })
            .unwrap_or_default();

        for callback in callbacks {
            if let Err(error) = callback(change) {
                tracing::warn!(
                    competitor_id = change.competitor_id.0,
                    kind = ?error.kind,
                    message = %error.message,
                    "change watcher callback failed"
                );
            }
        }

        Ok(())
    }

    fn lock_watchers(
        &self,
    ) -> CoreResult<MutexGuard<'_, HashMap<CompetitorId, Vec<Watcher>>>> {
        self.watchers.lock().map_err(|_| {
            CoreError::new(CoreErrorKind::Internal, "change watcher mutex poisoned")
        })
    }
}
