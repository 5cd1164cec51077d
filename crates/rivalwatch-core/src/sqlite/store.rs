use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, Row, params};
use serde_json::Value;

use crate::models::{
    ChangeEvent, ChangeType, CompetitorId, CoreError, CoreErrorKind, NewSubscriber,
    NotificationChannel, Severity, Subscriber, SubscriberFilters, SubscriberId,
};
use crate::persistence::{
    ChangeHistoryStore, MigrationStore, PersistenceResult, SubscriberStore,
};
use crate::sqlite::migrations::{SqliteMigration, current_schema_version, migration, migrations};

const MIGRATIONS_TABLE: &str = "rivalwatch_schema_migrations";

const CHANGE_COLUMNS: &str = "
    change_type, competitor_id, competitor_name, field_name, old_value_json,
    new_value_json, data_json, detected_at_unix_ms, severity, impact
";

pub struct SqliteStore {
    database_path: PathBuf,
}

impl SqliteStore {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn planned_migrations(&self, from_version: i64) -> Vec<&'static SqliteMigration> {
        migrations()
            .iter()
            .filter(|entry| entry.version > from_version)
            .collect()
    }

    pub fn migrate_to_latest(&self) -> PersistenceResult<()> {
        self.apply_migration(current_schema_version())
    }

    fn with_connection<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> PersistenceResult<T> {
        let mut connection = open_connection(&self.database_path)
            .map_err(|error| storage_error(operation_name, error))?;
        operation(&mut connection).map_err(|error| storage_error(operation_name, error))
    }
}

impl MigrationStore for SqliteStore {
    fn current_version(&self) -> PersistenceResult<i64> {
        self.with_connection("current_version", |connection| {
            ensure_migrations_table(connection)?;
            read_current_version(connection)
        })
    }

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()> {
        if target_version < 0 || target_version > current_schema_version() {
            return Err(storage_error_text(
                "apply_migration",
                format!("invalid migration target version '{target_version}'"),
            ));
        }

        if target_version > 0 && migration(target_version).is_none() {
            return Err(storage_error_text(
                "apply_migration",
                format!("migration version '{target_version}' is not defined"),
            ));
        }

        self.with_connection("apply_migration", |connection| {
            ensure_migrations_table(connection)?;
            let current_version = read_current_version(connection)?;

            if target_version == current_version {
                // All DDL is IF NOT EXISTS, so replaying repairs a schema whose
                // version row survived while its tables did not.
                for version in 1..=target_version {
                    connection.execute_batch(defined_migration(version)?.up_sql)?;
                }
                return Ok(());
            }

            if target_version > current_version {
                for version in (current_version + 1)..=target_version {
                    apply_up_migration(connection, defined_migration(version)?)?;
                }
            } else {
                for version in ((target_version + 1)..=current_version).rev() {
                    apply_down_migration(connection, defined_migration(version)?)?;
                }
            }

            Ok(())
        })
    }
}

impl ChangeHistoryStore for SqliteStore {
    fn append_change(&self, change: &ChangeEvent) -> PersistenceResult<()> {
        self.with_connection("append_change", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute(
                &format!(
                    "INSERT INTO change_history ({CHANGE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    change.change_type.as_str(),
                    competitor_id_to_i64(change.competitor_id)?,
                    change.competitor_name,
                    change.field,
                    json_to_text(change.old_value.as_ref())?,
                    json_to_text(change.new_value.as_ref())?,
                    json_to_text(change.data.as_ref())?,
                    to_unix_millis(change.timestamp)?,
                    change.severity.as_str(),
                    change.impact,
                ],
            )?;
            Ok(())
        })
    }

    fn list_changes(
        &self,
        competitor: Option<CompetitorId>,
        limit: usize,
    ) -> PersistenceResult<Vec<ChangeEvent>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.with_connection("list_changes", |connection| {
            ensure_schema_ready(connection)?;
            let competitor = competitor.map(competitor_id_to_i64).transpose()?;
            let mut statement = connection.prepare(&format!(
                "
SELECT {CHANGE_COLUMNS}
FROM change_history
WHERE ?1 IS NULL OR competitor_id = ?1
ORDER BY detected_at_unix_ms DESC, change_id ASC
LIMIT ?2
"
            ))?;
            let rows = statement.query_map(params![competitor, to_i64(limit)?], read_change)?;
            rows.collect()
        })
    }

    fn changes_since(&self, cutoff: SystemTime) -> PersistenceResult<Vec<ChangeEvent>> {
        self.with_connection("changes_since", |connection| {
            ensure_schema_ready(connection)?;
            let mut statement = connection.prepare(&format!(
                "
SELECT {CHANGE_COLUMNS}
FROM change_history
WHERE detected_at_unix_ms > ?1
ORDER BY change_id ASC
"
            ))?;
            let rows = statement.query_map([to_unix_millis(cutoff)?], read_change)?;
            rows.collect()
        })
    }

    fn prune_to(&self, max_entries: usize) -> PersistenceResult<usize> {
        self.with_connection("prune_to", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute(
                "
DELETE FROM change_history
WHERE change_id NOT IN (
    SELECT change_id FROM change_history ORDER BY change_id DESC LIMIT ?1
)
",
                [to_i64(max_entries)?],
            )
        })
    }
}

impl SubscriberStore for SqliteStore {
    fn insert_subscriber(&self, subscriber: &NewSubscriber) -> PersistenceResult<Subscriber> {
        self.with_connection("insert_subscriber", |connection| {
            ensure_schema_ready(connection)?;
            let filters_json = serde_json::to_string(&subscriber.filters)
                .map_err(|error| storage_error_sqlite(&format!("invalid filters: {error}")))?;
            connection.execute(
                "
INSERT INTO notification_subscribers (channel, address, filters_json, created_at_unix_ms)
VALUES (?1, ?2, ?3, ?4)
",
                params![
                    subscriber.channel.as_str(),
                    subscriber.address,
                    filters_json,
                    to_unix_millis(subscriber.created_at)?,
                ],
            )?;

            Ok(Subscriber {
                id: SubscriberId(i64_to_u64(connection.last_insert_rowid())?),
                channel: subscriber.channel,
                address: subscriber.address.clone(),
                filters: subscriber.filters.clone(),
                created_at: subscriber.created_at,
            })
        })
    }

    fn remove_subscriber(&self, id: SubscriberId) -> PersistenceResult<bool> {
        self.with_connection("remove_subscriber", |connection| {
            ensure_schema_ready(connection)?;
            let removed = connection.execute(
                "DELETE FROM notification_subscribers WHERE subscriber_id = ?1",
                [u64_to_i64(id.0)?],
            )?;
            Ok(removed > 0)
        })
    }

    fn list_subscribers(&self) -> PersistenceResult<Vec<Subscriber>> {
        self.with_connection("list_subscribers", |connection| {
            ensure_schema_ready(connection)?;
            let mut statement = connection.prepare(
                "
SELECT subscriber_id, channel, address, filters_json, created_at_unix_ms
FROM notification_subscribers
ORDER BY subscriber_id
",
            )?;
            let rows = statement.query_map([], |row| {
                let id_raw: i64 = row.get(0)?;
                let channel_raw: String = row.get(1)?;
                let address: String = row.get(2)?;
                let filters_raw: String = row.get(3)?;
                let created_at_raw: i64 = row.get(4)?;

                let filters: SubscriberFilters =
                    serde_json::from_str(&filters_raw).map_err(|error| {
                        storage_error_sqlite(&format!(
                            "invalid subscriber filters in sqlite record: {error}"
                        ))
                    })?;

                Ok(Subscriber {
                    id: SubscriberId(i64_to_u64(id_raw)?),
                    channel: parse_channel(&channel_raw)?,
                    address,
                    filters,
                    created_at: from_unix_millis(created_at_raw)?,
                })
            })?;

            rows.collect()
        })
    }
}

fn read_change(row: &Row<'_>) -> rusqlite::Result<ChangeEvent> {
    let change_type_raw: String = row.get(0)?;
    let competitor_raw: i64 = row.get(1)?;
    let competitor_name: String = row.get(2)?;
    let field: Option<String> = row.get(3)?;
    let old_value_raw: Option<String> = row.get(4)?;
    let new_value_raw: Option<String> = row.get(5)?;
    let data_raw: Option<String> = row.get(6)?;
    let detected_at_raw: i64 = row.get(7)?;
    let severity_raw: String = row.get(8)?;
    let impact: Option<String> = row.get(9)?;

    Ok(ChangeEvent {
        change_type: parse_change_type(&change_type_raw)?,
        competitor_id: CompetitorId(i64_to_u64(competitor_raw)?),
        competitor_name,
        field,
        old_value: text_to_json(old_value_raw)?,
        new_value: text_to_json(new_value_raw)?,
        data: text_to_json(data_raw)?,
        timestamp: from_unix_millis(detected_at_raw)?,
        severity: parse_severity(&severity_raw)?,
        impact,
    })
}

fn open_connection(database_path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
    }
    Connection::open(database_path)
}

fn ensure_migrations_table(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(&format!(
        "
CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at_unix INTEGER NOT NULL
);
"
    ))
}

fn ensure_schema_ready(connection: &Connection) -> rusqlite::Result<()> {
    ensure_migrations_table(connection)?;
    let version = read_current_version(connection)?;
    if version <= 0 {
        return Err(storage_error_sqlite(
            "database schema is not initialized; apply migrations before history operations",
        ));
    }
    Ok(())
}

fn read_current_version(connection: &Connection) -> rusqlite::Result<i64> {
    connection.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {MIGRATIONS_TABLE}"),
        [],
        |row| row.get(0),
    )
}

fn defined_migration(version: i64) -> rusqlite::Result<&'static SqliteMigration> {
    migration(version).ok_or_else(|| {
        storage_error_sqlite(&format!("migration version '{version}' is not defined"))
    })
}

fn apply_up_migration(
    connection: &mut Connection,
    migration: &SqliteMigration,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    transaction.execute_batch(migration.up_sql)?;
    transaction.execute(
        &format!(
            "INSERT INTO {MIGRATIONS_TABLE} (version, name, applied_at_unix)
             VALUES (?1, ?2, strftime('%s', 'now'))"
        ),
        (migration.version, migration.name),
    )?;
    transaction.commit()
}

fn apply_down_migration(
    connection: &mut Connection,
    migration: &SqliteMigration,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    transaction.execute_batch(migration.down_sql)?;
    transaction.execute(
        &format!("DELETE FROM {MIGRATIONS_TABLE} WHERE version = ?1"),
        [migration.version],
    )?;
    transaction.commit()
}

fn storage_error(operation: &str, error: rusqlite::Error) -> CoreError {
    storage_error_text(operation, error.to_string())
}

fn storage_error_sqlite(message: &str) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(message.to_string())))
}

fn storage_error_text(operation: &str, message: impl AsRef<str>) -> CoreError {
    CoreError::new(
        CoreErrorKind::StorageFailure,
        format!("sqlite store '{operation}' failed: {}", message.as_ref()),
    )
}

fn parse_change_type(raw: &str) -> rusqlite::Result<ChangeType> {
    raw.parse::<ChangeType>()
        .map_err(|_| storage_error_sqlite(&format!("unknown change type '{raw}' in sqlite record")))
}

fn parse_severity(raw: &str) -> rusqlite::Result<Severity> {
    raw.parse::<Severity>()
        .map_err(|_| storage_error_sqlite(&format!("unknown severity '{raw}' in sqlite record")))
}

fn parse_channel(raw: &str) -> rusqlite::Result<NotificationChannel> {
    raw.parse::<NotificationChannel>().map_err(|_| {
        storage_error_sqlite(&format!(
            "unknown notification channel '{raw}' in sqlite record"
        ))
    })
}

fn json_to_text(value: Option<&Value>) -> rusqlite::Result<Option<String>> {
    value
        .map(serde_json::to_string)
        .transpose()
        .map_err(|error| storage_error_sqlite(&format!("failed to encode json value: {error}")))
}

fn text_to_json(raw: Option<String>) -> rusqlite::Result<Option<Value>> {
    raw.map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(|error| {
            storage_error_sqlite(&format!("invalid json value in sqlite record: {error}"))
        })
}

fn to_unix_millis(value: SystemTime) -> rusqlite::Result<i64> {
    let duration = value.duration_since(UNIX_EPOCH).map_err(|error| {
        storage_error_sqlite(&format!("time before unix epoch is not supported: {error}"))
    })?;
    i64::try_from(duration.as_millis())
        .map_err(|_| storage_error_sqlite("unix timestamp millis exceed i64 range"))
}

fn from_unix_millis(value: i64) -> rusqlite::Result<SystemTime> {
    let millis = u64::try_from(value)
        .map_err(|_| storage_error_sqlite("negative unix timestamps are not supported"))?;
    Ok(UNIX_EPOCH + Duration::from_millis(millis))
}

fn competitor_id_to_i64(value: CompetitorId) -> rusqlite::Result<i64> {
    u64_to_i64(value.0)
}

fn u64_to_i64(value: u64) -> rusqlite::Result<i64> {
    i64::try_from(value).map_err(|_| storage_error_sqlite("id exceeds i64 range"))
}

fn i64_to_u64(value: i64) -> rusqlite::Result<u64> {
    u64::try_from(value).map_err(|_| storage_error_sqlite("negative id in sqlite record"))
}

fn to_i64(value: usize) -> rusqlite::Result<i64> {
    i64::try_from(value).map_err(|_| storage_error_sqlite("value exceeds i64 range"))
}
