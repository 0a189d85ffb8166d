//! Built-in userbot commands.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use sysinfo::{Disks, System};
use tracing::debug;

use super::{
    Command, CommandContext, CommandError, CommandRegistry, CommandResult, calc, help_text,
    usage_line,
};

/// Static facts about the running bot, shared by the built-in commands.
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub name: String,
    pub version: String,
    pub started: Instant,
    pub started_at: DateTime<Utc>,
    pub auto_response: bool,
}

impl BotInfo {
    /// Creates bot info stamped with the current time.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, auto_response: bool) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            started: Instant::now(),
            started_at: Utc::now(),
            auto_response,
        }
    }

    /// Time since start.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Registers every built-in command except the plugin management ones.
pub fn register_builtins(registry: &mut CommandRegistry, bot: &Arc<BotInfo>) {
    registry
        .register("help", Arc::new(HelpCommand { bot: Arc::clone(bot) }))
        .register("ping", Arc::new(PingCommand { bot: Arc::clone(bot) }))
        .register("info", Arc::new(InfoCommand { bot: Arc::clone(bot) }))
        .register("stats", Arc::new(StatsCommand { bot: Arc::clone(bot) }))
        .register("uptime", Arc::new(UptimeCommand { bot: Arc::clone(bot) }))
        .register("sys", Arc::new(SysCommand))
        .register("echo", Arc::new(EchoCommand))
        .register("calc", Arc::new(CalcCommand))
        .register("time", Arc::new(TimeCommand))
        .register("nexus", Arc::new(NexusCommand { bot: Arc::clone(bot) }));
}

/// `help [command]`
pub struct HelpCommand {
    pub bot: Arc<BotInfo>,
}

#[async_trait]
impl Command for HelpCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let prefix = ctx.prefix;

        if let Some(token) = ctx.invocation.arg(0) {
            let name = ctx.aliases.resolve(&token.to_lowercase());
            let mut text = format!("**📖 Help for `{prefix}{name}`**\n\n");
            if let Some(usage) = usage_line(&name) {
                let _ = writeln!(text, "**Usage:** `{prefix}{usage}`");
            }
            let aliases = ctx.aliases.aliases_for(&name);
            if !aliases.is_empty() {
                let _ = writeln!(text, "**Aliases:** `{}`", aliases.join("`, `"));
            }
            text.push_str(help_text(&name));
            return Ok(CommandResult::success(text));
        }

        let mut text = format!(
            "**🤖 {} v{} - Command Help**\n\n",
            self.bot.name, self.bot.version
        );
        for name in ctx.registry.names() {
            let usage = usage_line(name).unwrap_or(name);
            let _ = writeln!(text, "`{prefix}{usage}` - {}", help_text(name));
        }
        let _ = write!(
            text,
            "\nUse `{prefix}help <command>` for detailed help."
        );

        Ok(CommandResult::success(text))
    }
}

/// `ping`
pub struct PingCommand {
    pub bot: Arc<BotInfo>,
}

#[async_trait]
impl Command for PingCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let started = Instant::now();
        ctx.transport.respond(ctx.message, "🏃‍♂️ Pinging...").await?;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        Ok(CommandResult::success(format!(
            "**🏓 Pong!**\n\n\
             ⚡ **Response Time:** `{elapsed_ms:.2}ms`\n\
             🤖 **Bot Status:** `Online`\n\
             🔄 **Version:** `v{}`",
            self.bot.version
        )))
    }
}

/// `info`
pub struct InfoCommand {
    pub bot: Arc<BotInfo>,
}

#[async_trait]
impl Command for InfoCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let me = ctx.transport.me().await?;
        let usage = ctx.registry.usage().total().await;
        let full_name = match &me.last_name {
            Some(last) => format!("{} {last}", me.first_name),
            None => me.first_name.clone(),
        };

        Ok(CommandResult::success(format!(
            "**🤖 {} Information**\n\n\
             **👤 Account:**\n\
             • **Name:** {full_name}\n\
             • **Username:** @{}\n\
             • **User ID:** `{}`\n\
             • **Phone:** `{}`\n\n\
             **🔧 Bot:**\n\
             • **Version:** `v{}`\n\
             • **Command Prefix:** `{}`\n\
             • **Platform:** `{} {}`\n\n\
             **📊 Statistics:**\n\
             • **Commands Used:** `{usage}`\n\
             • **Available Commands:** `{}`\n\
             • **Command Aliases:** `{}`\n\n\
             **⚙️ Features:**\n\
             • **Auto Response:** `{}`",
            self.bot.name,
            me.username.as_deref().unwrap_or("N/A"),
            me.id,
            me.phone.as_deref().unwrap_or("Hidden"),
            self.bot.version,
            ctx.prefix,
            std::env::consts::OS,
            std::env::consts::ARCH,
            ctx.registry.len(),
            ctx.aliases.len(),
            enabled(self.bot.auto_response),
        )))
    }
}

/// `stats`
pub struct StatsCommand {
    pub bot: Arc<BotInfo>,
}

#[async_trait]
impl Command for StatsCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let snapshot = SystemSnapshot::collect().await?;
        let usage = ctx.registry.usage();

        let mut text = format!(
            "**📊 {} Statistics**\n\n\
             **💻 System:**\n\
             • **CPU Usage:** `{:.1}%`\n\
             • **RAM Usage:** `{:.1}%`\n\
             • **Disk Usage:** `{:.1}%`\n\
             • **System Uptime:** `{}`\n\n\
             **🤖 Bot:**\n\
             • **Total Commands:** `{}`\n\
             • **Unique Commands:** `{}`\n\n\
             **📈 Top Commands:**",
            self.bot.name,
            snapshot.cpu_percent,
            percent(snapshot.memory_used, snapshot.memory_total),
            percent(snapshot.disk_used(), snapshot.disk_total),
            format_uptime(Duration::from_secs(snapshot.uptime_secs)),
            usage.total().await,
            usage.distinct().await,
        );

        let top = usage.top(5).await;
        if top.is_empty() {
            text.push_str("\nNo commands used yet.");
        }
        for (i, (cmd, count)) in top.iter().enumerate() {
            let _ = write!(text, "\n{}. `{cmd}` - {count} uses", i + 1);
        }

        Ok(CommandResult::success(text))
    }
}

/// `uptime`
pub struct UptimeCommand {
    pub bot: Arc<BotInfo>,
}

#[async_trait]
impl Command for UptimeCommand {
    async fn execute(&self, _ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let now = Local::now();
        Ok(CommandResult::success(format!(
            "**⏰ Uptime Information**\n\n\
             **🤖 Bot Uptime:**\n`{}`\n\n\
             **💻 System Uptime:**\n`{}`\n\n\
             **🚀 Started:**\n`{}`\n\n\
             **📅 Current Time:**\n`{}`",
            format_uptime(self.bot.uptime()),
            format_uptime(Duration::from_secs(System::uptime())),
            self.bot
                .started_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S"),
            now.format("%Y-%m-%d %H:%M:%S"),
        )))
    }
}

/// `sys`
pub struct SysCommand;

#[async_trait]
impl Command for SysCommand {
    async fn execute(&self, _ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let s = SystemSnapshot::collect().await?;

        Ok(CommandResult::success(format!(
            "**💻 System Information**\n\n\
             **🖥️ Hardware:**\n\
             • **CPU:** `{}`\n\
             • **CPU Usage:** `{:.1}%`\n\
             • **CPU Cores:** `{}`\n\n\
             **🧠 Memory:**\n\
             • **Total RAM:** `{}`\n\
             • **Used RAM:** `{} ({:.1}%)`\n\
             • **Available RAM:** `{}`\n\n\
             **💾 Storage:**\n\
             • **Total Disk:** `{}`\n\
             • **Used Disk:** `{} ({:.1}%)`\n\
             • **Free Disk:** `{}`\n\n\
             **🐧 Operating System:**\n\
             • **OS:** `{}`\n\
             • **Kernel:** `{}`\n\
             • **Architecture:** `{}`",
            s.cpu_brand,
            s.cpu_percent,
            s.cpu_cores,
            format_bytes(s.memory_total),
            format_bytes(s.memory_used),
            percent(s.memory_used, s.memory_total),
            format_bytes(s.memory_available),
            format_bytes(s.disk_total),
            format_bytes(s.disk_used()),
            percent(s.disk_used(), s.disk_total),
            format_bytes(s.disk_available),
            s.os_name,
            s.kernel,
            std::env::consts::ARCH,
        )))
    }
}

/// `echo <text>`
pub struct EchoCommand;

#[async_trait]
impl Command for EchoCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        if ctx.invocation.rest.is_empty() {
            return Ok(CommandResult::error(format!(
                "❌ Please provide text to echo.\nUsage: `{}echo <text>`",
                ctx.prefix
            )));
        }
        Ok(CommandResult::success(format!(
            "🔊 **Echo:**\n{}",
            ctx.invocation.rest
        )))
    }
}

/// `calc <expression>`
pub struct CalcCommand;

#[async_trait]
impl Command for CalcCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let expression = ctx.invocation.rest.as_str();
        if expression.is_empty() {
            return Ok(CommandResult::error(format!(
                "❌ Please provide an expression to calculate.\nUsage: `{}calc <expression>`",
                ctx.prefix
            )));
        }

        match calc::evaluate(expression) {
            Ok(value) => Ok(CommandResult::success(format!(
                "**🧮 Calculator**\n\n\
                 **Expression:** `{expression}`\n\
                 **Result:** `{}`",
                calc::format_number(value)
            ))),
            Err(e) => {
                debug!("Rejected expression '{}': {}", expression, e);
                Ok(CommandResult::error(format!(
                    "❌ **Calculation Error:**\n`{e}`"
                )))
            }
        }
    }
}

/// `time`
pub struct TimeCommand;

#[async_trait]
impl Command for TimeCommand {
    async fn execute(&self, _ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let now = Local::now();
        Ok(CommandResult::success(format!(
            "**🕐 Current Time**\n\n\
             **📅 Date:** `{}`\n\
             **⏰ Time:** `{}`\n\
             **🌍 UTC Offset:** `{}`\n\
             **📊 Unix Timestamp:** `{}`",
            now.format("%Y-%m-%d"),
            now.format("%H:%M:%S"),
            now.format("%:z"),
            now.timestamp(),
        )))
    }
}

/// `nexus`
pub struct NexusCommand {
    pub bot: Arc<BotInfo>,
}

#[async_trait]
impl Command for NexusCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        Ok(CommandResult::success(format!(
            "**🌟 {} v{}**\n\n\
             **⚡ Features:**\n\
             • Prefix commands with aliases and cooldowns\n\
             • Runtime plugin install, load and unload\n\
             • Optional assistant bot with public commands\n\
             • Auto-response with flood protection\n\
             • System monitoring tools\n\n\
             **🔌 Plugins:** `{}plugins` lists what can be installed.",
            self.bot.name, self.bot.version, ctx.prefix
        )))
    }
}

/// Point-in-time system metrics.
#[derive(Debug, Clone)]
struct SystemSnapshot {
    cpu_brand: String,
    cpu_percent: f32,
    cpu_cores: usize,
    memory_total: u64,
    memory_used: u64,
    memory_available: u64,
    disk_total: u64,
    disk_available: u64,
    os_name: String,
    kernel: String,
    uptime_secs: u64,
}

impl SystemSnapshot {
    async fn collect() -> Result<Self, CommandError> {
        tokio::task::spawn_blocking(Self::collect_blocking)
            .await
            .map_err(|e| CommandError::Failed(format!("system info task failed: {e}")))
    }

    fn collect_blocking() -> Self {
        let mut sys = System::new_all();
        // CPU usage is a delta between two refreshes.
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();

        let disks = Disks::new_with_refreshed_list();
        let (disk_total, disk_available) = disks.list().iter().fold((0, 0), |(t, a), d| {
            (t + d.total_space(), a + d.available_space())
        });

        let memory_total = sys.total_memory();
        let memory_available = match sys.available_memory() {
            0 => memory_total.saturating_sub(sys.used_memory()),
            v => v,
        };

        Self {
            cpu_brand: sys
                .cpus()
                .first()
                .map_or_else(|| "Unknown".to_owned(), |c| c.brand().trim().to_owned()),
            cpu_percent: sys.global_cpu_usage(),
            cpu_cores: sys.cpus().len(),
            memory_total,
            memory_used: sys.used_memory(),
            memory_available,
            disk_total,
            disk_available,
            os_name: System::long_os_version().unwrap_or_else(|| "Unknown".to_owned()),
            kernel: System::kernel_version().unwrap_or_else(|| "Unknown".to_owned()),
            uptime_secs: System::uptime(),
        }
    }

    fn disk_used(&self) -> u64 {
        self.disk_total.saturating_sub(self.disk_available)
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag { "✅ Enabled" } else { "❌ Disabled" }
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Formats a byte count with binary units.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Formats a duration as `[Nd ]HH:MM:SS`.
#[must_use]
pub fn format_uptime(duration: Duration) -> String {
    let secs = duration.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    if days > 0 {
        format!("{days}d {hours:02}:{mins:02}:{secs:02}")
    } else {
        format!("{hours:02}:{mins:02}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{AliasResolver, DEFAULT_ALIASES, Invocation, UsageCounter};
    use crate::telegram::testing::{RecordingTransport, message};

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new(Arc::new(UsageCounter::new()));
        register_builtins(&mut registry, &Arc::new(BotInfo::new("Nexus Userbot", "2.0", false)));
        registry
    }

    async fn run(registry: &CommandRegistry, text: &str) -> CommandResult {
        let transport = RecordingTransport::new();
        let aliases = AliasResolver::from_pairs(DEFAULT_ALIASES);
        let msg = message(text);
        let invocation = Invocation::parse(text, ".").unwrap();
        let handler = registry.get(&invocation.command).unwrap();
        let ctx = CommandContext {
            transport: &transport,
            message: &msg,
            invocation: &invocation,
            prefix: ".",
            registry,
            aliases: &aliases,
        };
        handler.execute(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_help_lists_registered_commands() {
        let registry = registry();
        let result = run(&registry, ".help").await;
        let text = result.message.unwrap();

        assert!(text.contains("Nexus Userbot v2.0"));
        assert!(text.contains("`.calc <expression>` - Calculate mathematical expressions"));
        assert!(text.contains("`.ping` - Check bot latency and status"));
    }

    #[tokio::test]
    async fn test_help_for_single_command_resolves_alias() {
        let registry = registry();
        let text = run(&registry, ".help c").await.message.unwrap();

        assert!(text.contains("`.calc`"));
        assert!(text.contains("**Aliases:** `c`"));
        assert!(text.ends_with("Calculate mathematical expressions"));
    }

    #[tokio::test]
    async fn test_help_unknown_command_fallback() {
        let registry = registry();
        let text = run(&registry, ".help frobnicate").await.message.unwrap();
        assert!(text.ends_with(crate::commands::NO_DETAILED_HELP));
    }

    #[tokio::test]
    async fn test_echo() {
        let registry = registry();
        let result = run(&registry, ".echo  hello   world").await;
        assert_eq!(result.message.as_deref(), Some("🔊 **Echo:**\nhello   world"));

        let result = run(&registry, ".echo").await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_calc_command() {
        let registry = registry();
        let text = run(&registry, ".calc 2+2").await.message.unwrap();
        assert!(text.contains("**Result:** `4`"));

        let result = run(&registry, ".calc __import__('os')").await;
        assert!(!result.success);
        assert!(result.message.unwrap().starts_with("❌ **Calculation Error:**"));
    }

    #[tokio::test]
    async fn test_ping_reports_pong() {
        let registry = registry();
        let text = run(&registry, ".ping").await.message.unwrap();
        assert!(text.starts_with("**🏓 Pong!**"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(59)), "00:00:59");
        assert_eq!(format_uptime(Duration::from_secs(3_723)), "01:02:03");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 01:01:01");
    }
}
