//! Nexus Userbot Library
//!
//! A Telegram userbot driven by prefix commands typed from your own account.
//!
//! This crate provides the core functionality for:
//! - Dispatching commands with aliases, cooldowns and usage counts
//! - Installing, validating, loading and unloading plugins at runtime
//! - Connecting to Telegram via `MTProto`
//! - Running a companion bot and automatic replies

pub mod assistant;
pub mod commands;
pub mod config;
pub mod plugins;
pub mod telegram;
