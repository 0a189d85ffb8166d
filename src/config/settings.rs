//! Application settings and Telegram configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Telegram API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Path to the userbot session file.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("nexus_userbot.session")
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String) -> Self {
        Self {
            api_id,
            api_hash,
            session_path: default_session_path(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `API_ID` and `API_HASH` to be set. Both are required and the
    /// process must not start without them.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from any variable source, such as the environment.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_id = var("API_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar("API_ID"))?;
        let api_id: i32 = raw_id.trim().parse().map_err(|_| ConfigError::InvalidApiId)?;
        if api_id <= 0 {
            return Err(ConfigError::InvalidApiId);
        }

        let api_hash = var("API_HASH")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingEnvVar("API_HASH"))?;

        let session_path = var("SESSION_PATH")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(default_session_path, PathBuf::from);

        Ok(Self {
            api_id,
            api_hash,
            session_path,
        })
    }
}

/// Userbot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Prefix that marks a message as a command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Display name used in replies.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// Version string shown by `info`, `ping` and `help`.
    #[serde(default = "default_bot_version")]
    pub bot_version: String,

    /// Per-user-per-command cooldown in seconds. Zero disables the gate.
    #[serde(default)]
    pub command_cooldown_secs: u64,

    /// Whether dispatched commands are counted and logged.
    #[serde(default = "default_true")]
    pub enable_command_logging: bool,

    /// Whether a cooldown rejection is answered with a notice.
    #[serde(default)]
    pub notify_cooldown: bool,

    /// Directory holding installed plugin files.
    #[serde(default = "default_plugins_dir")]
    pub plugins_dir: PathBuf,

    /// Base URL or directory the plugin catalog fetches `<id>.json` from.
    #[serde(default = "default_catalog_base")]
    pub plugin_catalog_base: String,

    /// Timeout for plugin downloads and plugin HTTP calls, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub plugin_fetch_timeout_secs: u64,

    /// Minimum delay between outgoing API calls, in milliseconds.
    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay_ms: u64,

    /// How often stale cooldown records are pruned, in seconds.
    #[serde(default = "default_prune_interval")]
    pub cooldown_prune_interval_secs: u64,
}

fn default_command_prefix() -> String {
    ".".to_owned()
}

fn default_bot_name() -> String {
    "Nexus Userbot".to_owned()
}

fn default_bot_version() -> String {
    "2.0".to_owned()
}

const fn default_true() -> bool {
    true
}

fn default_plugins_dir() -> PathBuf {
    PathBuf::from("plugins")
}

/// Default location of the plugin catalog.
pub const DEFAULT_CATALOG_BASE: &str =
    "https://raw.githubusercontent.com/The-Nexus-Bot/Nexus-Plugins/main";

fn default_catalog_base() -> String {
    DEFAULT_CATALOG_BASE.to_owned()
}

const fn default_fetch_timeout() -> u64 {
    30
}

const fn default_rate_limit_delay() -> u64 {
    1000
}

const fn default_prune_interval() -> u64 {
    600
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            bot_name: default_bot_name(),
            bot_version: default_bot_version(),
            command_cooldown_secs: 0,
            enable_command_logging: true,
            notify_cooldown: false,
            plugins_dir: default_plugins_dir(),
            plugin_catalog_base: default_catalog_base(),
            plugin_fetch_timeout_secs: default_fetch_timeout(),
            rate_limit_delay_ms: default_rate_limit_delay(),
            cooldown_prune_interval_secs: default_prune_interval(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        let defaults = Self::default();
        Self {
            command_prefix: std::env::var("COMMAND_PREFIX")
                .ok()
                .filter(|p| !p.is_empty())
                .unwrap_or(defaults.command_prefix),
            bot_name: std::env::var("BOT_NAME").unwrap_or(defaults.bot_name),
            bot_version: std::env::var("BOT_VERSION").unwrap_or(defaults.bot_version),
            command_cooldown_secs: env_parse("COMMAND_COOLDOWN")
                .unwrap_or(defaults.command_cooldown_secs),
            enable_command_logging: env_flag("ENABLE_COMMAND_LOGGING")
                .unwrap_or(defaults.enable_command_logging),
            notify_cooldown: env_flag("NOTIFY_COOLDOWN").unwrap_or(defaults.notify_cooldown),
            plugins_dir: std::env::var("PLUGINS_DIR")
                .map_or(defaults.plugins_dir, PathBuf::from),
            plugin_catalog_base: std::env::var("PLUGIN_CATALOG_BASE")
                .ok()
                .filter(|b| !b.trim().is_empty())
                .unwrap_or(defaults.plugin_catalog_base),
            plugin_fetch_timeout_secs: env_parse("PLUGIN_FETCH_TIMEOUT")
                .unwrap_or(defaults.plugin_fetch_timeout_secs),
            rate_limit_delay_ms: env_parse("RATE_LIMIT_DELAY_MS")
                .unwrap_or(defaults.rate_limit_delay_ms),
            cooldown_prune_interval_secs: env_parse("COOLDOWN_PRUNE_INTERVAL")
                .unwrap_or(defaults.cooldown_prune_interval_secs),
        }
    }

    /// Cooldown applied to every dispatched command.
    #[must_use]
    pub const fn command_cooldown(&self) -> Duration {
        Duration::from_secs(self.command_cooldown_secs)
    }

    /// Timeout for outbound plugin HTTP requests.
    #[must_use]
    pub const fn plugin_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.plugin_fetch_timeout_secs)
    }
}

/// Companion bot and auto-response settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantSettings {
    /// Bot token from `BotFather`. The companion bot is disabled without one.
    pub bot_token: Option<String>,

    /// Session file for the companion bot.
    pub session_path: PathBuf,

    /// Whether the companion bot answers public commands.
    pub enable_public_commands: bool,

    /// Commands the companion bot exposes to everyone.
    pub allowed_public_commands: Vec<String>,

    /// Cooldown between public commands per user, in seconds.
    pub public_command_cooldown_secs: u64,

    /// If non-empty, only these user ids are served.
    pub authorized_users: Vec<i64>,

    /// User ids that are never served.
    pub blacklisted_users: Vec<i64>,

    /// Whether incoming private messages get an automatic reply.
    pub enable_auto_response: bool,

    /// Text of the automatic reply.
    pub auto_response_message: String,

    /// Minimum delay between automatic replies to the same user, in seconds.
    pub auto_response_delay_secs: u64,

    /// Whether flooding senders are ignored by the auto-responder.
    pub flood_protection: bool,

    /// Access key for the companion bot's `webshot` command.
    pub webshot_access_key: Option<String>,

    /// Chat that receives companion bot reports.
    pub log_group_id: Option<i64>,

    /// Whether reports are sent to `log_group_id`.
    pub enable_log_group: bool,

    /// Whether every handled public command is reported.
    pub log_all_commands: bool,

    /// Whether failed public commands are reported.
    pub log_errors: bool,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            session_path: PathBuf::from("nexus_assistant.session"),
            enable_public_commands: false,
            allowed_public_commands: vec!["ping".to_owned(), "info".to_owned(), "help".to_owned()],
            public_command_cooldown_secs: 5,
            authorized_users: Vec::new(),
            blacklisted_users: Vec::new(),
            enable_auto_response: false,
            auto_response_message:
                "Hi! I am currently using Nexus Userbot. I will respond when available.".to_owned(),
            auto_response_delay_secs: 60,
            flood_protection: true,
            webshot_access_key: None,
            log_group_id: None,
            enable_log_group: false,
            log_all_commands: true,
            log_errors: true,
        }
    }
}

impl AssistantSettings {
    /// Creates assistant settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        let defaults = Self::default();
        Self {
            bot_token: std::env::var("BOT_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            session_path: std::env::var("BOT_SESSION_PATH")
                .map_or(defaults.session_path, PathBuf::from),
            enable_public_commands: env_flag("ENABLE_PUBLIC_COMMANDS")
                .unwrap_or(defaults.enable_public_commands),
            allowed_public_commands: std::env::var("ALLOWED_PUBLIC_COMMANDS")
                .map_or(defaults.allowed_public_commands, |raw| {
                    parse_list(&raw).map(str::to_lowercase).collect()
                }),
            public_command_cooldown_secs: env_parse("PUBLIC_COMMAND_COOLDOWN")
                .unwrap_or(defaults.public_command_cooldown_secs),
            authorized_users: std::env::var("AUTHORIZED_USERS")
                .map(|raw| parse_ids(&raw))
                .unwrap_or_default(),
            blacklisted_users: std::env::var("BLACKLISTED_USERS")
                .map(|raw| parse_ids(&raw))
                .unwrap_or_default(),
            enable_auto_response: env_flag("ENABLE_AUTO_RESPONSE")
                .unwrap_or(defaults.enable_auto_response),
            auto_response_message: std::env::var("AUTO_RESPONSE_MESSAGE")
                .unwrap_or(defaults.auto_response_message),
            auto_response_delay_secs: env_parse("AUTO_RESPONSE_DELAY")
                .unwrap_or(defaults.auto_response_delay_secs),
            flood_protection: env_flag("FLOOD_PROTECTION").unwrap_or(defaults.flood_protection),
            webshot_access_key: std::env::var("WEBSHOT_ACCESS_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            log_group_id: log_group_id(std::env::var("LOG_GROUP_ID").ok().as_deref()),
            enable_log_group: env_flag("ENABLE_LOG_GROUP").unwrap_or(defaults.enable_log_group),
            log_all_commands: env_flag("LOG_ALL_COMMANDS").unwrap_or(defaults.log_all_commands),
            log_errors: env_flag("LOG_ERRORS").unwrap_or(defaults.log_errors),
        }
    }

    /// Chat id reports go to, when reporting is enabled and a valid id is set.
    #[must_use]
    pub fn log_group(&self) -> Option<i64> {
        self.log_group_id.filter(|_| self.enable_log_group)
    }

    /// Whether a user passes the blacklist and authorisation filters.
    #[must_use]
    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        if self.blacklisted_users.contains(&user_id) {
            return false;
        }
        self.authorized_users.is_empty() || self.authorized_users.contains(&user_id)
    }
}

fn log_group_id(raw: Option<&str>) -> Option<i64> {
    let raw = raw.map(str::trim).filter(|r| !r.is_empty())?;
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!("Invalid LOG_GROUP_ID format: {}", raw);
            None
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|s| parse_flag(&s))
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Splits a comma-separated list, dropping empty items.
fn parse_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_ids(raw: &str) -> Vec<i64> {
    parse_list(raw).filter_map(|s| s.parse().ok()).collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API_ID format (must be a positive integer)")]
    InvalidApiId,
}
