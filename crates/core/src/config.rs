use crate::constants::{
    DEFAULT_DB_OPERATION_TIMEOUT_SECS, DEFAULT_DB_POOL_SIZE, DEFAULT_DISCORD_API_BASE,
    DEFAULT_PAGE_SIZE, DEFAULT_RATE_LIMIT_RETRIES, MAX_PAGE_SIZE,
};
use crate::Error;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Main configuration for DirtOnYou.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    /// Database configuration.
    pub database: DatabaseConfig,

    /// Discord REST access and identities.
    pub discord: DiscordConfig,

    /// Historical backfill settings.
    pub backfill: BackfillConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    pub sqlite_path: PathBuf,

    /// Maximum number of connections in pool.
    pub max_connections: u32,

    /// Pool acquire timeout in seconds.
    pub connection_timeout: u64,

    /// Upper bound for a single database operation in seconds.
    pub operation_timeout: u64,

    /// Enable WAL mode.
    pub enable_wal: bool,
}

/// Discord configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    /// Bot token, without the `Bot ` prefix.
    pub token: Option<String>,

    /// REST API base URL.
    pub api_base: String,

    /// The bot's own user id; its messages are never flagged.
    pub bot_user_id: Option<String>,

    /// Operator allowed to run admin commands and receiving backfill progress.
    pub admin_id: Option<String>,

    /// Retries for a request answered with HTTP 429.
    pub rate_limit_retries: u32,

    /// Optional HTTP timeout in seconds. Unset means the client default.
    pub request_timeout: Option<u64>,
}

/// Backfill configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// Messages requested per archive page.
    pub page_size: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: LogLevel,

    /// Log format.
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level.
    Error,

    /// Warning level.
    Warn,

    /// Info level.
    Info,

    /// Debug level.
    Debug,

    /// Trace level.
    Trace,
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format.
    Json,

    /// Text format.
    Text,
}

impl MonitorConfig {
    /// Default location of the configuration file.
    pub fn default_path() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .ok_or_else(|| Error::Config("Cannot find config directory".to_string()))?
            .join("dirtonyou")
            .join("config.toml"))
    }

    /// Load configuration from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::FileSystem(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content).map_err(|e| Error::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Parse(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)
            .map_err(|e| Error::FileSystem(format!("Failed to write config file: {}", e)))
    }

    /// Override file values with `DIRTONYOU_DB_PATH`, `BOT_TOKEN`, `ADMIN_ID`
    /// and `BOT_USER_ID` when they are set and non-blank.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(path) = get("DIRTONYOU_DB_PATH") {
            debug!("database path overridden from environment: {}", path);
            self.database.sqlite_path = PathBuf::from(path);
        }
        if let Some(token) = get("BOT_TOKEN") {
            debug!("bot token taken from environment");
            self.discord.token = Some(token);
        }
        if let Some(admin) = get("ADMIN_ID") {
            self.discord.admin_id = Some(admin);
        }
        if let Some(user) = get("BOT_USER_ID") {
            self.discord.bot_user_id = Some(user);
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.backfill.page_size == 0 || self.backfill.page_size > MAX_PAGE_SIZE {
            return Err(Error::validation(format!(
                "backfill.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.backfill.page_size
            )));
        }
        if self.database.max_connections == 0 {
            return Err(Error::validation("database.max_connections must be > 0"));
        }
        if self.database.operation_timeout == 0 {
            return Err(Error::validation("database.operation_timeout must be > 0"));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let sqlite_path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dirtonyou")
            .join("dirtonyou.db");
        Self {
            sqlite_path,
            max_connections: DEFAULT_DB_POOL_SIZE,
            connection_timeout: 10,
            operation_timeout: DEFAULT_DB_OPERATION_TIMEOUT_SECS,
            enable_wal: true,
        }
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_base: DEFAULT_DISCORD_API_BASE.to_string(),
            bot_user_id: None,
            admin_id: None,
            rate_limit_retries: DEFAULT_RATE_LIMIT_RETRIES,
            request_timeout: None,
        }
    }
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [discord]
            admin_id = "42"

            [backfill]
            page_size = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.discord.admin_id.as_deref(), Some("42"));
        assert_eq!(config.discord.api_base, DEFAULT_DISCORD_API_BASE);
        assert_eq!(config.backfill.page_size, 50);
        assert_eq!(config.database.operation_timeout, 5);
        assert_eq!(config.logging.level, LogLevel::Info);
        config.validate().unwrap();
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = MonitorConfig::default();
        config.discord.bot_user_id = Some("999".to_string());
        config.logging.format = LogFormat::Json;
        config.save(&path).unwrap();

        let loaded = MonitorConfig::load(&path).unwrap();
        assert_eq!(loaded.discord.bot_user_id.as_deref(), Some("999"));
        assert_eq!(loaded.logging.format, LogFormat::Json);
    }

    #[test]
    fn env_overrides_ignore_blank_values() {
        let vars: HashMap<&str, &str> = [
            ("DIRTONYOU_DB_PATH", "/tmp/monitor.db"),
            ("BOT_TOKEN", "   "),
            ("ADMIN_ID", " 7 "),
        ]
        .into_iter()
        .collect();

        let mut config = MonitorConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.database.sqlite_path,
            PathBuf::from("/tmp/monitor.db")
        );
        assert_eq!(config.discord.token, None);
        assert_eq!(config.discord.admin_id.as_deref(), Some("7"));
    }

    #[test]
    fn validate_rejects_oversized_pages() {
        let mut config = MonitorConfig::default();
        config.backfill.page_size = 101;
        assert!(matches!(config.validate(), Err(Error::Validation(_))));
        config.backfill.page_size = 0;
        assert!(config.validate().is_err());
    }
}
