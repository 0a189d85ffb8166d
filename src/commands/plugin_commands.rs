//! Plugin management commands: `install`, `plugins`, `load`, `unload`, `uninstall`.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{Command, CommandContext, CommandError, CommandRegistry, CommandResult};
use crate::plugins::{PluginManager, is_valid_plugin_id};

/// Registers the plugin management commands.
pub fn register_plugin_commands(registry: &mut CommandRegistry, manager: &Arc<PluginManager>) {
    registry
        .register("install", Arc::new(InstallCommand { manager: Arc::clone(manager) }))
        .register("plugins", Arc::new(PluginsCommand { manager: Arc::clone(manager) }))
        .register("load", Arc::new(LoadCommand { manager: Arc::clone(manager) }))
        .register("unload", Arc::new(UnloadCommand { manager: Arc::clone(manager) }))
        .register("uninstall", Arc::new(UninstallCommand { manager: Arc::clone(manager) }));
}

/// Returns the plugin id argument, or the error result to show.
fn plugin_id<'a>(ctx: &'a CommandContext<'_>, command: &str) -> Result<&'a str, CommandResult> {
    match ctx.invocation.arg(0) {
        None => Err(CommandResult::error(format!(
            "❌ Please specify a plugin id.\nUsage: `{}{command} <plugin>`",
            ctx.prefix
        ))),
        Some(id) if !is_valid_plugin_id(id) => Err(CommandResult::error(format!(
            "❌ Invalid plugin id: `{id}`"
        ))),
        Some(id) => Ok(id),
    }
}

/// `install <plugin>`
pub struct InstallCommand {
    manager: Arc<PluginManager>,
}

#[async_trait]
impl Command for InstallCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let id = match plugin_id(ctx, "install") {
            Ok(id) => id,
            Err(result) => return Ok(result),
        };

        ctx.transport
            .respond(ctx.message, &format!("📦 Installing plugin `{id}`..."))
            .await?;

        match self.manager.install(id).await {
            Ok(descriptor) => Ok(CommandResult::success(format!(
                "✅ **Plugin installed:** {}\n\n\
                 📝 {}\n\
                 🔧 **Commands:** `{}`",
                descriptor.name,
                descriptor.description,
                descriptor
                    .commands
                    .iter()
                    .map(|c| format!("{}{c}", ctx.prefix))
                    .collect::<Vec<_>>()
                    .join("`, `")
            ))),
            Err(e) => {
                warn!("Install of '{}' failed: {}", id, e);
                Ok(CommandResult::error(format!(
                    "❌ Failed to install `{id}`: {}",
                    e.user_message()
                )))
            }
        }
    }
}

/// `plugins`
pub struct PluginsCommand {
    manager: Arc<PluginManager>,
}

#[async_trait]
impl Command for PluginsCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let overview = match self.manager.overview().await {
            Ok(overview) => overview,
            Err(e) => {
                return Ok(CommandResult::error(format!(
                    "❌ Could not list plugins: {}",
                    e.user_message()
                )));
            }
        };

        let mut text = "**🔌 PLUGINS**\n\n".to_owned();
        for status in &overview {
            let marker = if status.loaded {
                "🟢"
            } else if status.installed {
                "🟡"
            } else {
                "⚪"
            };
            let _ = write!(text, "{marker} **{}** (`{}`)", status.name, status.id);
            if !status.in_catalog {
                text.push_str(" [local]");
            }
            text.push('\n');
            if !status.description.is_empty() {
                let _ = writeln!(text, "    {}", status.description);
            }
        }

        let loaded = overview.iter().filter(|s| s.loaded).count();
        let installed = overview.iter().filter(|s| s.installed).count();
        let p = ctx.prefix;
        let _ = write!(
            text,
            "\n🟢 loaded: {loaded} • 🟡 installed: {installed} • ⚪ available\n\n\
             `{p}install <plugin>` • `{p}load <plugin>` • `{p}unload <plugin>` • `{p}uninstall <plugin>`"
        );
        Ok(CommandResult::success(text))
    }
}

/// `load <plugin>`
pub struct LoadCommand {
    manager: Arc<PluginManager>,
}

#[async_trait]
impl Command for LoadCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let id = match plugin_id(ctx, "load") {
            Ok(id) => id,
            Err(result) => return Ok(result),
        };

        match self.manager.load(id).await {
            Ok(()) => Ok(CommandResult::success(format!("✅ Plugin `{id}` loaded"))),
            Err(e) => Ok(CommandResult::error(format!(
                "❌ Failed to load `{id}`: {}",
                e.user_message()
            ))),
        }
    }
}

/// `unload <plugin>`
pub struct UnloadCommand {
    manager: Arc<PluginManager>,
}

#[async_trait]
impl Command for UnloadCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let id = match plugin_id(ctx, "unload") {
            Ok(id) => id,
            Err(result) => return Ok(result),
        };

        if self.manager.unload(id).await {
            Ok(CommandResult::success(format!("✅ Plugin `{id}` unloaded")))
        } else {
            Ok(CommandResult::error(format!("❌ Plugin `{id}` is not loaded")))
        }
    }
}

/// `uninstall <plugin>`
pub struct UninstallCommand {
    manager: Arc<PluginManager>,
}

#[async_trait]
impl Command for UninstallCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let id = match plugin_id(ctx, "uninstall") {
            Ok(id) => id,
            Err(result) => return Ok(result),
        };

        match self.manager.uninstall(id).await {
            Ok(true) => Ok(CommandResult::success(format!("🗑 Plugin `{id}` uninstalled"))),
            Ok(false) => Ok(CommandResult::error(format!("❌ Plugin `{id}` is not installed"))),
            Err(e) => Ok(CommandResult::error(format!(
                "❌ Failed to uninstall `{id}`: {}",
                e.user_message()
            ))),
        }
    }
}
