use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rivalwatch_core::models::{
    ChangeEvent, ChangeType, CompetitorId, CoreErrorKind, NewSubscriber, NotificationChannel,
    Severity, SubscriberFilters, parse_snapshot,
};
use rivalwatch_core::monitor::ChangeMonitor;
use rivalwatch_core::notifications::NotificationManager;
use rivalwatch_core::persistence::{ChangeHistoryStore, SubscriberStore};
use rivalwatch_core::sqlite::SqliteStore;
use serde_json::json;

fn test_db_path(test_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("rivalwatch-{test_name}-{nanos}.sqlite3"))
}

fn migrated_store(test_name: &str) -> SqliteStore {
    let store = SqliteStore::new(test_db_path(test_name));
    store.migrate_to_latest().unwrap();
    store
}

fn at(seconds: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(seconds)
}

fn field_change(competitor: u64, field: &str, seconds: u64) -> ChangeEvent {
    ChangeEvent {
        change_type: ChangeType::FieldUpdated,
        competitor_id: CompetitorId(competitor),
        competitor_name: format!("Конкурент {competitor}"),
        field: Some(field.to_string()),
        old_value: Some(json!(["Поиск"])),
        new_value: Some(json!({ "monthly": "15M+" })),
        data: None,
        timestamp: at(seconds),
        severity: Severity::Info,
        impact: Some("Изменение зафиксировано".to_string()),
    }
}

#[test]
fn history_operations_require_migrated_schema() {
    let store = SqliteStore::new(test_db_path("unmigrated"));

    let error = store.list_changes(None, 10).unwrap_err();

    assert_eq!(error.kind, CoreErrorKind::StorageFailure);
    assert!(error.message.contains("not initialized"));
}

#[test]
fn appended_changes_round_trip_with_json_values() {
    let store = migrated_store("round-trip");
    let change = ChangeEvent {
        timestamp: UNIX_EPOCH + Duration::from_millis(1_759_057_385_120),
        ..field_change(1, "traffic", 0)
    };

    store.append_change(&change).unwrap();

    let listed = store.list_changes(None, 10).unwrap();
    assert_eq!(listed, vec![change]);
}

#[test]
fn listing_orders_newest_first_and_filters_by_competitor() {
    let store = migrated_store("ordering");
    store.append_change(&field_change(1, "news", 10)).unwrap();
    store.append_change(&field_change(2, "news", 30)).unwrap();
    store.append_change(&field_change(1, "pricing", 20)).unwrap();
    store.append_change(&field_change(1, "services", 20)).unwrap();

    let all: Vec<_> = store
        .list_changes(None, 10)
        .unwrap()
        .into_iter()
        .map(|change| change.field.unwrap())
        .collect();
    assert_eq!(all, vec!["news", "pricing", "services", "news"]);

    let first = store.list_changes(Some(CompetitorId(1)), 2).unwrap();
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|change| change.competitor_id == CompetitorId(1)));
    assert_eq!(first[0].field_name(), Some("pricing"));

    assert!(store.list_changes(None, 0).unwrap().is_empty());
}

#[test]
fn changes_since_is_strict_and_oldest_first() {
    let store = migrated_store("since");
    store.append_change(&field_change(1, "a", 10)).unwrap();
    store.append_change(&field_change(1, "b", 20)).unwrap();
    store.append_change(&field_change(1, "c", 30)).unwrap();

    let recent: Vec<_> = store
        .changes_since(at(10))
        .unwrap()
        .into_iter()
        .map(|change| change.field.unwrap())
        .collect();

    assert_eq!(recent, vec!["b", "c"]);
}

#[test]
fn prune_keeps_the_newest_entries() {
    let store = migrated_store("prune");
    for (index, field) in ["a", "b", "c", "d"].iter().enumerate() {
        store
            .append_change(&field_change(1, field, index as u64))
            .unwrap();
    }

    assert_eq!(store.prune_to(2).unwrap(), 2);
    assert_eq!(store.prune_to(2).unwrap(), 0);

    let kept: Vec<_> = store
        .list_changes(None, 10)
        .unwrap()
        .into_iter()
        .map(|change| change.field.unwrap())
        .collect();
    assert_eq!(kept, vec!["d", "c"]);
}

#[test]
fn subscribers_persist_with_filters() {
    let path = test_db_path("subscribers");
    let store = SqliteStore::new(&path);
    store.migrate_to_latest().unwrap();
    let filters = SubscriberFilters {
        competitor_ids: Some(vec![CompetitorId(1), CompetitorId(2)]),
        severity: Some(Severity::Critical),
        types: Some(vec![ChangeType::CriticalUpdate]),
        fields: Some(vec!["revenue".to_string()]),
    };

    let first = store
        .insert_subscriber(&NewSubscriber {
            channel: NotificationChannel::Email,
            address: "analyst@example.ru".to_string(),
            filters: filters.clone(),
            created_at: at(1_000),
        })
        .unwrap();
    let second = store
        .insert_subscriber(&NewSubscriber {
            channel: NotificationChannel::Webhook,
            address: "https://hooks.example.ru/rivals".to_string(),
            filters: SubscriberFilters::default(),
            created_at: at(2_000),
        })
        .unwrap();
    assert!(second.id > first.id);

    let reopened = SqliteStore::new(&path);
    let listed = reopened.list_subscribers().unwrap();
    assert_eq!(listed, vec![first.clone(), second.clone()]);
    assert_eq!(listed[0].filters, filters);

    assert!(reopened.remove_subscriber(first.id).unwrap());
    assert!(!reopened.remove_subscriber(first.id).unwrap());
    assert_eq!(reopened.list_subscribers().unwrap(), vec![second]);
}

#[test]
fn monitor_runs_end_to_end_on_sqlite() {
    let store = Arc::new(migrated_store("monitor"));
    let notifications = NotificationManager::new(store.clone());
    let monitor = ChangeMonitor::new(store.clone(), notifications).with_history_limit(Some(5));
    let previous = parse_snapshot(include_str!("fixtures/snapshots/before.json")).unwrap();
    let current = parse_snapshot(include_str!("fixtures/snapshots/after.json")).unwrap();
    let now = at(1_759_057_385);

    let report = monitor.run_check(&previous, &current, now).unwrap();
    assert_eq!(report.changes.len(), 7);

    let history = monitor.change_history(None, 100).unwrap();
    assert_eq!(history.len(), 5);

    let analytics = monitor
        .change_analytics_at(30, now + Duration::from_secs(60))
        .unwrap();
    assert_eq!(analytics.total_changes, 5);
    assert_eq!(analytics.by_competitor.get("ЦИАН"), Some(&2));
}
