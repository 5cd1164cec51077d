#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SqliteMigration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
    pub down_sql: &'static str,
}

const MIGRATION_0001: SqliteMigration = SqliteMigration {
    version: 1,
    name: "initial_change_history",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS change_history (
    change_id INTEGER PRIMARY KEY AUTOINCREMENT,
    competitor_id INTEGER NOT NULL,
    competitor_name TEXT NOT NULL,
    change_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    field_name TEXT,
    old_value_json TEXT,
    new_value_json TEXT,
    data_json TEXT,
    impact TEXT,
    detected_at_unix_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_change_history_competitor_time
    ON change_history (competitor_id, detected_at_unix_ms DESC);

CREATE INDEX IF NOT EXISTS idx_change_history_time
    ON change_history (detected_at_unix_ms);
"#,
    down_sql: r#"
DROP INDEX IF EXISTS idx_change_history_time;
DROP INDEX IF EXISTS idx_change_history_competitor_time;
DROP TABLE IF EXISTS change_history;
"#,
};

const MIGRATION_0002: SqliteMigration = SqliteMigration {
    version: 2,
    name: "add_notification_subscribers",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS notification_subscribers (
    subscriber_id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel TEXT NOT NULL,
    address TEXT NOT NULL,
    filters_json TEXT NOT NULL,
    created_at_unix_ms INTEGER NOT NULL
);
"#,
    down_sql: r#"
DROP TABLE IF EXISTS notification_subscribers;
"#,
};

const MIGRATIONS: [SqliteMigration; 2] = [MIGRATION_0001, MIGRATION_0002];

pub fn migrations() -> &'static [SqliteMigration] {
    &MIGRATIONS
}

pub fn migration(version: i64) -> Option<&'static SqliteMigration> {
    MIGRATIONS.iter().find(|entry| entry.version == version)
}

pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|entry| entry.version).unwrap_or(0)
}
