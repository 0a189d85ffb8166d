//! Configuration module for the userbot.
//!
//! Loads Telegram API credentials, userbot settings and companion bot
//! settings from the environment.

mod settings;

pub use settings::{
    AssistantSettings, BotSettings, ConfigError, DEFAULT_CATALOG_BASE, TelegramConfig,
};
