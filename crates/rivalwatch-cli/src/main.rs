mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use rivalwatch_core::config::AppConfig;
use rivalwatch_core::models::{
    ChangeType, CompetitorId, CompetitorRecord, NotificationChannel, Severity, SubscriberFilters,
    SubscriberId, parse_snapshot,
};
use rivalwatch_core::monitor::{
    ChangeMonitor, DEFAULT_ANALYTICS_PERIOD_DAYS, DEFAULT_HISTORY_LIMIT,
};
use rivalwatch_core::notifications::NotificationManager;
use rivalwatch_core::persistence::MigrationStore;
use rivalwatch_core::sqlite::{SqliteStore, current_schema_version};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::output::{ChangeView, SubscriberView, print_json};

#[derive(Parser)]
#[command(name = "rivalwatch", version, about = "Competitor change monitoring")]
struct Cli {
    /// Configuration file (defaults to rivalwatch.toml next to the binary)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Diff two snapshot files, record the changes and notify subscribers
    Check {
        #[arg(long)]
        old: PathBuf,
        #[arg(long)]
        new: PathBuf,
    },
    /// Recorded changes, newest first
    History {
        #[arg(long)]
        competitor: Option<u64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Change statistics for the last N days
    Analytics {
        #[arg(long)]
        period: Option<u32>,
    },
    /// Register a notification subscriber
    Subscribe {
        #[arg(long, value_parser = parse_channel)]
        channel: NotificationChannel,
        #[arg(long)]
        address: String,
        #[arg(long = "competitor")]
        competitors: Vec<u64>,
        #[arg(long, value_parser = parse_severity)]
        severity: Option<Severity>,
        #[arg(long = "type", value_parser = parse_change_type)]
        types: Vec<ChangeType>,
        #[arg(long = "field")]
        fields: Vec<String>,
    },
    /// Remove a notification subscriber
    Unsubscribe { id: u64 },
    /// List notification subscribers
    Subscribers,
    /// Bring the database schema up to date
    Migrate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    init_tracing(&config.logging.level);
    match config.source() {
        Some(path) => tracing::info!(path = %path.display(), "configuration loaded"),
        None => tracing::debug!("using embedded default configuration"),
    }

    let store = Arc::new(SqliteStore::new(config.database_path()));
    store
        .migrate_to_latest()
        .with_context(|| format!("failed to migrate {}", store.database_path().display()))?;
    tracing::info!(database = %store.database_path().display(), "store ready");

    let notifications = NotificationManager::from_settings(&config.notifications, store.clone())?;
    let monitor = ChangeMonitor::from_config(&config.monitor, store.clone(), notifications);

    match cli.command {
        Command::Check { old, new } => {
            let previous = read_snapshot(&old)?;
            let current = read_snapshot(&new)?;
            let report = monitor.run_check(&previous, &current, SystemTime::now())?;
            print_json(&json!({
                "changes": ChangeView::all(&report.changes)?,
                "delivery": report.delivery,
            }))
        }
        Command::History { competitor, limit } => {
            let limit = limit.filter(|value| *value > 0).unwrap_or(DEFAULT_HISTORY_LIMIT);
            let changes = monitor.change_history(competitor.map(CompetitorId), limit)?;
            print_json(&ChangeView::all(&changes)?)
        }
        Command::Analytics { period } => {
            let period = period
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_ANALYTICS_PERIOD_DAYS);
            print_json(&monitor.change_analytics(period)?)
        }
        Command::Subscribe {
            channel,
            address,
            competitors,
            severity,
            types,
            fields,
        } => {
            let filters = SubscriberFilters {
                competitor_ids: non_empty(competitors.into_iter().map(CompetitorId).collect()),
                severity,
                types: non_empty(types),
                fields: non_empty(fields),
            };
            let subscriber = monitor
                .notifications()
                .add_subscriber(channel, &address, filters)?;
            print_json(&SubscriberView::new(&subscriber)?)
        }
        Command::Unsubscribe { id } => {
            if !monitor.notifications().remove_subscriber(SubscriberId(id))? {
                return Err(anyhow!("subscriber {id} does not exist"));
            }
            print_json(&json!({ "removed": id }))
        }
        Command::Subscribers => {
            let subscribers = monitor.notifications().subscribers()?;
            let views = subscribers
                .iter()
                .map(SubscriberView::new)
                .collect::<Result<Vec<_>>>()?;
            print_json(&views)
        }
        Command::Migrate => print_json(&json!({
            "database": store.database_path().display().to_string(),
            "schemaVersion": store.current_version()?,
            "latestVersion": current_schema_version(),
        })),
    }
}

fn init_tracing(configured_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_snapshot(path: &Path) -> Result<Vec<CompetitorRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    parse_snapshot(&raw).with_context(|| format!("invalid snapshot {}", path.display()))
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

fn parse_channel(raw: &str) -> Result<NotificationChannel, String> {
    raw.parse()
        .map_err(|()| format!("unknown channel '{raw}' (expected email, telegram or webhook)"))
}

fn parse_severity(raw: &str) -> Result<Severity, String> {
    raw.parse()
        .map_err(|()| format!("unknown severity '{raw}' (expected critical, warning or info)"))
}

fn parse_change_type(raw: &str) -> Result<ChangeType, String> {
    raw.parse().map_err(|()| format!("unknown change type '{raw}'"))
}
