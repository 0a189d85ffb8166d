//! Command registry and usage accounting.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::Command;
use super::aliases::DEFAULT_ALIASES;

/// Fallback shown by `help <command>` when no entry exists.
pub const NO_DETAILED_HELP: &str = "No detailed help available for this command.";

/// Usage line and description per canonical command name.
const COMMAND_HELP: &[(&str, &str, &str)] = &[
    ("help", "help [command]", "Show the command list or help for one command"),
    ("ping", "ping", "Check bot latency and status"),
    ("info", "info", "Show detailed bot information"),
    ("stats", "stats", "Display usage statistics"),
    ("uptime", "uptime", "Show bot uptime"),
    ("sys", "sys", "System information"),
    ("echo", "echo <text>", "Echo the provided text"),
    ("calc", "calc <expression>", "Calculate mathematical expressions"),
    ("time", "time", "Show current time"),
    ("nexus", "nexus", "Show Nexus branding information"),
    ("install", "install <plugin>", "Install a plugin from the catalog and load it"),
    ("plugins", "plugins", "List catalog, installed and loaded plugins"),
    ("load", "load <plugin>", "Load an installed plugin"),
    ("unload", "unload <plugin>", "Unload a plugin and remove its commands"),
    ("uninstall", "uninstall <plugin>", "Delete an installed plugin"),
    ("start", "start", "Introduce the assistant bot"),
    ("webshot", "webshot <url>", "Take a website screenshot"),
];

/// Commands only the companion bot serves. Plugins may reuse these names.
const COMPANION_ONLY: &[&str] = &["start", "webshot"];

/// Detailed help for a canonical command name.
#[must_use]
pub fn help_text(command: &str) -> &'static str {
    COMMAND_HELP
        .iter()
        .find(|(name, _, _)| *name == command)
        .map_or(NO_DETAILED_HELP, |(_, _, description)| description)
}

/// Command and alias tokens owned by the userbot itself.
///
/// Plugins may not bind these, or they would shadow `unload` and friends.
pub fn reserved_names() -> impl Iterator<Item = &'static str> {
    COMMAND_HELP
        .iter()
        .map(|(name, _, _)| *name)
        .filter(|name| !COMPANION_ONLY.contains(name))
        .chain(DEFAULT_ALIASES.iter().map(|(alias, _)| *alias))
}

/// Usage line for a canonical command name.
#[must_use]
pub fn usage_line(command: &str) -> Option<&'static str> {
    COMMAND_HELP
        .iter()
        .find(|(name, _, _)| *name == command)
        .map(|(_, usage, _)| *usage)
}

/// Invocation counts per command. Never reset while the process lives.
#[derive(Debug, Default)]
pub struct UsageCounter {
    counts: Mutex<HashMap<String, u64>>,
}

impl UsageCounter {
    /// Creates an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the count for `command`, returning the new value.
    pub async fn record(&self, command: &str) -> u64 {
        let mut counts = self.counts.lock().await;
        let count = counts.entry(command.to_owned()).or_insert(0);
        *count += 1;
        *count
    }

    /// Count for a single command.
    pub async fn count(&self, command: &str) -> u64 {
        self.counts.lock().await.get(command).copied().unwrap_or(0)
    }

    /// Sum of all counts.
    pub async fn total(&self) -> u64 {
        self.counts.lock().await.values().sum()
    }

    /// Number of distinct commands used.
    pub async fn distinct(&self) -> usize {
        self.counts.lock().await.len()
    }

    /// The `limit` most used commands, most used first, ties by name.
    pub async fn top(&self, limit: usize) -> Vec<(String, u64)> {
        let counts = self.counts.lock().await;
        let mut sorted: Vec<(String, u64)> =
            counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        sorted.truncate(limit);
        sorted
    }
}

/// Canonical command names mapped to their handlers.
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
    usage: Arc<UsageCounter>,
}

impl CommandRegistry {
    /// Creates an empty registry that records into `usage`.
    #[must_use]
    pub fn new(usage: Arc<UsageCounter>) -> Self {
        Self {
            commands: HashMap::new(),
            usage,
        }
    }

    /// Registers a handler under a canonical name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, command: Arc<dyn Command>) -> &mut Self {
        self.commands.insert(name.into().to_lowercase(), command);
        self
    }

    /// Looks up a handler.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    /// Whether a name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Shared usage counter.
    #[must_use]
    pub fn usage(&self) -> &Arc<UsageCounter> {
        &self.usage
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_text_fallback() {
        assert_eq!(help_text("ping"), "Check bot latency and status");
        assert_eq!(help_text("does_not_exist"), NO_DETAILED_HELP);
        assert_eq!(usage_line("calc"), Some("calc <expression>"));
        assert_eq!(usage_line("nope"), None);
    }

    #[test]
    fn test_reserved_names_cover_commands_and_aliases() {
        let reserved: Vec<_> = reserved_names().collect();
        for name in ["unload", "uninstall", "load", "help", "p", "inst"] {
            assert!(reserved.contains(&name), "{name} should be reserved");
        }
        for name in ["hello", "start", "webshot"] {
            assert!(!reserved.contains(&name), "{name} should be free");
        }
    }

    #[tokio::test]
    async fn test_usage_counter() {
        let usage = UsageCounter::new();
        assert_eq!(usage.record("ping").await, 1);
        assert_eq!(usage.record("ping").await, 2);
        usage.record("calc").await;

        assert_eq!(usage.count("ping").await, 2);
        assert_eq!(usage.count("echo").await, 0);
        assert_eq!(usage.total().await, 3);
        assert_eq!(usage.distinct().await, 2);
    }

    #[tokio::test]
    async fn test_usage_top_orders_by_count_then_name() {
        let usage = UsageCounter::new();
        for cmd in ["b", "a", "c", "c", "c", "a"] {
            usage.record(cmd).await;
        }

        let top = usage.top(2).await;
        assert_eq!(top, vec![("c".to_owned(), 3), ("a".to_owned(), 2)]);
    }
}
