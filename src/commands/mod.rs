//! Command handling module.
//!
//! Parses prefix commands typed by the account, resolves aliases, applies
//! cooldowns and runs the registered handler.

mod aliases;
mod builtin;
pub mod calc;
mod cooldown;
mod dispatcher;
mod plugin_commands;
mod registry;
mod types;

pub use aliases::{AliasResolver, DEFAULT_ALIASES};
pub use builtin::{BotInfo, register_builtins};
pub use cooldown::{Admission, CooldownLedger, PrunedLedger, prune_ledgers};
pub use dispatcher::{Dispatcher, DispatcherConfig, RegistryError};
pub use plugin_commands::register_plugin_commands;
pub use registry::{
    CommandRegistry, NO_DETAILED_HELP, UsageCounter, help_text, reserved_names, usage_line,
};
pub use types::{
    Command, CommandContext, CommandError, CommandResult, DispatchOutcome, Invocation, truncate,
};
