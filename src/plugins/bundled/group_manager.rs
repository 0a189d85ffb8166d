//! Leave groups and list group membership.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::ensure_known_commands;
use crate::commands::{CommandError, CommandResult};
use crate::plugins::{PluginEntry, PluginError, PluginHost, PluginManifest, RegistrationHandle};
use crate::telegram::{ChatKind, DialogInfo, RouteContext, RouteHandler};

const COMMANDS: &[&str] = &["leave", "leaveall", "groups"];

/// Entry point `group_manager`.
pub struct GroupManagerEntry;

#[async_trait]
impl PluginEntry for GroupManagerEntry {
    fn name(&self) -> &'static str {
        "group_manager"
    }

    async fn register(
        &self,
        host: &PluginHost,
        manifest: &PluginManifest,
    ) -> Result<RegistrationHandle, PluginError> {
        ensure_known_commands(manifest, COMMANDS)?;
        let handler = GroupManager {
            farewell_delay: Duration::from_secs(2),
            leave_pause: Duration::from_secs(1),
        };
        Ok(host.bind_manifest_commands(manifest, Arc::new(handler)).await)
    }
}

/// Handles `leave`, `leaveall` and `groups`.
pub struct GroupManager {
    /// Time the farewell stays visible before leaving the current chat.
    pub farewell_delay: Duration,
    /// Pause between chats during `leaveall`.
    pub leave_pause: Duration,
}

#[async_trait]
impl RouteHandler for GroupManager {
    async fn handle(&self, ctx: &RouteContext<'_>) -> Result<CommandResult, CommandError> {
        match ctx.invocation.command.as_str() {
            "leave" => self.leave(ctx).await,
            "leaveall" => self.leave_all(ctx).await,
            _ => groups(ctx).await,
        }
    }
}

impl GroupManager {
    async fn leave(&self, ctx: &RouteContext<'_>) -> Result<CommandResult, CommandError> {
        let Some(target) = ctx.invocation.arg(0) else {
            let chat = &ctx.message.chat;
            if chat.kind == ChatKind::Private {
                return Ok(CommandResult::error(
                    "❌ This command can only be used in groups or provide a group ID",
                ));
            }

            let title = chat.title.as_deref().unwrap_or("Unknown Group");
            ctx.transport
                .respond(ctx.message, &format!("👋 Leaving group: **{title}**\n\nGoodbye!"))
                .await?;
            tokio::time::sleep(self.farewell_delay).await;
            if let Err(e) = ctx.transport.leave_chat(chat.id).await {
                warn!("Failed to leave chat {}: {}", chat.id, e);
            }
            return Ok(CommandResult::silent());
        };

        let Ok(chat_id) = target.parse::<i64>() else {
            return Ok(CommandResult::error(format!(
                "❌ Invalid chat ID. Use: `{}leave <chat_id>`",
                ctx.prefix
            )));
        };

        let title = ctx
            .transport
            .dialogs()
            .await?
            .into_iter()
            .find(|d| d.id == chat_id)
            .map_or_else(|| "Unknown Group".to_owned(), |d| d.title);

        match ctx.transport.leave_chat(chat_id).await {
            Ok(()) => Ok(CommandResult::success(format!(
                "✅ Successfully left group: **{title}**"
            ))),
            Err(e) => Ok(CommandResult::error(format!("❌ Failed to leave group: {e}"))),
        }
    }

    async fn leave_all(&self, ctx: &RouteContext<'_>) -> Result<CommandResult, CommandError> {
        let confirmed = ctx
            .invocation
            .arg(0)
            .is_some_and(|a| a.eq_ignore_ascii_case("confirm"));
        if !confirmed {
            return Ok(CommandResult::success(format!(
                "⚠️ **LEAVE ALL GROUPS**\n\n\
                 This will leave ALL groups you're currently in!\n\n\
                 **To confirm, use:**\n`{}leaveall confirm`\n\n\
                 **Warning:** This action cannot be undone!",
                ctx.prefix
            )));
        }

        ctx.transport.respond(ctx.message, "🔍 Scanning groups...").await?;
        let targets: Vec<DialogInfo> = ctx
            .transport
            .dialogs()
            .await?
            .into_iter()
            .filter(|d| d.kind.is_group())
            .collect();

        if targets.is_empty() {
            return Ok(CommandResult::success("ℹ️ No groups found to leave."));
        }

        ctx.transport
            .respond(ctx.message, &format!("📤 Leaving {} groups...", targets.len()))
            .await?;

        let mut left = 0;
        let mut failed = 0;
        for (i, dialog) in targets.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.leave_pause).await;
            }
            match ctx.transport.leave_chat(dialog.id).await {
                Ok(()) => left += 1,
                Err(e) => {
                    failed += 1;
                    warn!("Failed to leave {}: {}", dialog.title, e);
                }
            }
        }

        Ok(CommandResult::success(format!(
            "✅ **GROUP CLEANUP COMPLETE**\n\n\
             📤 **Left:** {left} groups\n\
             ❌ **Failed:** {failed} groups\n\
             📊 **Total processed:** {} groups",
            targets.len()
        )))
    }
}

async fn groups(ctx: &RouteContext<'_>) -> Result<CommandResult, CommandError> {
    ctx.transport.respond(ctx.message, "🔍 Scanning groups...").await?;
    let dialogs = ctx.transport.dialogs().await?;

    let of_kind = |kind: ChatKind| -> Vec<&DialogInfo> {
        dialogs.iter().filter(|d| d.kind == kind).collect()
    };
    let sections = [
        ("👥", "Groups", of_kind(ChatKind::Group), 10),
        ("🏢", "Supergroups", of_kind(ChatKind::Supergroup), 10),
        ("📢", "Channels", of_kind(ChatKind::Channel), 5),
    ];

    let total: usize = sections.iter().map(|(_, _, list, _)| list.len()).sum();
    if total == 0 {
        return Ok(CommandResult::success(
            "ℹ️ **No groups or channels found.**\n\n\
             You're not currently in any groups or subscribed to any channels.",
        ));
    }

    let mut text = "📋 **YOUR GROUPS & CHANNELS**\n\n".to_owned();
    for (icon, label, list, limit) in &sections {
        if list.is_empty() {
            continue;
        }
        let _ = writeln!(text, "{icon} **{label} ({}):**", list.len());
        for dialog in list.iter().take(*limit) {
            let _ = writeln!(text, "• **{}** (`{}`)", dialog.title, dialog.id);
        }
        if list.len() > *limit {
            let _ = writeln!(text, "• ... and {} more", list.len() - limit);
        }
        text.push('\n');
    }

    let p = ctx.prefix;
    let _ = write!(
        text,
        "📊 **Total:** {total} chats\n\n\
         **Commands:**\n\
         • `{p}leave` - Leave current group\n\
         • `{p}leave <chat_id>` - Leave specific group\n\
         • `{p}leaveall confirm` - Leave all groups"
    );
    Ok(CommandResult::success(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Invocation;
    use crate::telegram::testing::{RecordingTransport, group_message, message};

    fn manager() -> GroupManager {
        GroupManager {
            farewell_delay: Duration::ZERO,
            leave_pause: Duration::ZERO,
        }
    }

    fn dialogs() -> Vec<DialogInfo> {
        vec![
            DialogInfo {
                id: -100,
                kind: ChatKind::Supergroup,
                title: "Rustaceans".to_owned(),
            },
            DialogInfo {
                id: -200,
                kind: ChatKind::Group,
                title: "Family".to_owned(),
            },
            DialogInfo {
                id: -300,
                kind: ChatKind::Channel,
                title: "News".to_owned(),
            },
            DialogInfo {
                id: 5,
                kind: ChatKind::Private,
                title: "Alice".to_owned(),
            },
        ]
    }

    async fn run(
        t: &RecordingTransport,
        msg: &crate::telegram::IncomingMessage,
    ) -> CommandResult {
        let invocation = Invocation::parse(&msg.text, ".").unwrap();
        let ctx = RouteContext {
            transport: t,
            message: msg,
            invocation: &invocation,
            prefix: ".",
        };
        manager().handle(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_leave_in_private_chat_is_refused() {
        let t = RecordingTransport::new();
        let result = run(&t, &message(".leave")).await;
        assert!(!result.success);
        assert!(t.left.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leave_current_group() {
        let t = RecordingTransport::new();
        let result = run(&t, &group_message(-100, ".leave")).await;
        assert_eq!(result, CommandResult::silent());
        assert_eq!(*t.left.lock().unwrap(), [-100]);
    }

    #[tokio::test]
    async fn test_leave_by_id() {
        let t = RecordingTransport::with_dialogs(dialogs());
        let result = run(&t, &message(".leave -200")).await;
        assert_eq!(
            result.message.as_deref(),
            Some("✅ Successfully left group: **Family**")
        );

        let result = run(&t, &message(".leave abc")).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_leaveall_requires_confirmation() {
        let t = RecordingTransport::with_dialogs(dialogs());
        let result = run(&t, &message(".leaveall")).await;
        assert!(result.message.unwrap().contains("`.leaveall confirm`"));
        assert!(t.left.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leaveall_leaves_only_groups() {
        let t = RecordingTransport::with_dialogs(dialogs());
        let result = run(&t, &message(".leaveall confirm")).await;
        assert!(result.message.unwrap().contains("**Left:** 2 groups"));
        assert_eq!(*t.left.lock().unwrap(), [-100, -200]);
    }

    #[tokio::test]
    async fn test_groups_listing() {
        let t = RecordingTransport::with_dialogs(dialogs());
        let text = run(&t, &message(".groups")).await.message.unwrap();
        assert!(text.contains("👥 **Groups (1):**"));
        assert!(text.contains("• **Rustaceans** (`-100`)"));
        assert!(text.contains("📊 **Total:** 3 chats"));
        assert!(!text.contains("Alice"));
    }

    #[tokio::test]
    async fn test_groups_empty() {
        let t = RecordingTransport::new();
        let text = run(&t, &message(".groups")).await.message.unwrap();
        assert!(text.starts_with("ℹ️ **No groups or channels found.**"));
    }
}
