use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use time::UtcOffset;

use crate::detection::{DEFAULT_CRITICAL_FIELDS, DEFAULT_SIGNIFICANT_FIELDS, DetectionRules};
use crate::models::{CoreError, CoreErrorKind, CoreResult};

pub const CONFIG_FILE_NAME: &str = "rivalwatch.toml";

/// Default configuration embedded in the binary.
const DEFAULT_CONFIG: &str = r#"
[storage]
database_path = "target/db/rivalwatch.sqlite3"

[monitor]
critical_fields = ["revenue", "marketShare", "employees", "status"]
significant_fields = ["pricing", "services", "features"]
report_removed = true
max_history_entries = 10000

[notifications]
webhook_delivery = false
http_timeout_secs = 10
utc_offset_hours = 3

[logging]
level = "info"
"#;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub monitor: MonitorConfig,
    pub notifications: NotificationSettings,
    pub logging: LoggingConfig,
    #[serde(skip)]
    source: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "target/db/rivalwatch.sqlite3".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub critical_fields: Vec<String>,
    pub significant_fields: Vec<String>,
    pub report_removed: bool,
    pub max_history_entries: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            critical_fields: DEFAULT_CRITICAL_FIELDS.map(str::to_string).to_vec(),
            significant_fields: DEFAULT_SIGNIFICANT_FIELDS.map(str::to_string).to_vec(),
            report_removed: true,
            max_history_entries: Some(10_000),
        }
    }
}

impl MonitorConfig {
    pub fn detection_rules(&self) -> DetectionRules {
        DetectionRules {
            critical_fields: self.critical_fields.clone(),
            significant_fields: self.significant_fields.clone(),
            report_removed: self.report_removed,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub email_from: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub webhook_delivery: bool,
    pub http_timeout_secs: u64,
    pub utc_offset_hours: i8,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_from: None,
            telegram_bot_token: None,
            webhook_delivery: false,
            http_timeout_secs: 10,
            utc_offset_hours: 3,
        }
    }
}

impl NotificationSettings {
    pub fn utc_offset(&self) -> CoreResult<UtcOffset> {
        UtcOffset::from_hms(self.utc_offset_hours, 0, 0).map_err(|error| {
            config_error(format!(
                "utc_offset_hours '{}' is out of range: {error}",
                self.utc_offset_hours
            ))
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(raw: &str) -> CoreResult<Self> {
        toml::from_str(raw).map_err(|error| {
            CoreError::new(
                CoreErrorKind::ParseFailure,
                format!("invalid configuration: {error}"),
            )
        })
    }

    pub fn embedded_default() -> CoreResult<Self> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Loads configuration.
    ///
    /// Search order:
    /// 1. `explicit` when given (must exist)
    /// 2. `rivalwatch.toml` next to the executable
    /// 3. the embedded default
    ///
    /// `SMTP_USER` and `TELEGRAM_BOT_TOKEN` override the file afterwards.
    pub fn load(explicit: Option<&Path>) -> CoreResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match executable_config_path().filter(|path| path.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::embedded_default()?,
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|error| {
            config_error(format!("failed to read '{}': {error}", path.display()))
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(sender) = lookup("SMTP_USER").filter(|value| !value.trim().is_empty()) {
            self.notifications.email_from = Some(sender);
        }
        if let Some(token) =
            lookup("TELEGRAM_BOT_TOKEN").filter(|value| !value.trim().is_empty())
        {
            self.notifications.telegram_bot_token = Some(token);
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.storage.database_path.trim().is_empty() {
            return Err(config_error("storage.database_path must not be empty"));
        }
        if self.monitor.max_history_entries == Some(0) {
            return Err(config_error("monitor.max_history_entries must be positive"));
        }
        self.notifications.utc_offset()?;
        Ok(())
    }

    /// File the configuration was read from, `None` for the embedded default.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Relative database paths resolve against the directory of the config
    /// file they came from, or the working directory otherwise.
    pub fn database_path(&self) -> PathBuf {
        let configured = Path::new(&self.storage.database_path);
        if configured.is_absolute() {
            return configured.to_path_buf();
        }

        match self.source.as_deref().and_then(Path::parent) {
            Some(base) => base.join(configured),
            None => configured.to_path_buf(),
        }
    }
}

fn executable_config_path() -> Option<PathBuf> {
    let executable = std::env::current_exe().ok()?;
    Some(executable.parent()?.join(CONFIG_FILE_NAME))
}

fn config_error(message: impl Into<String>) -> CoreError {
    CoreError::invalid_input(message)
}
