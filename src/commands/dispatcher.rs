//! Routes inbound text to registered commands.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{
    AliasResolver, CommandContext, CommandRegistry, CooldownLedger, DispatchOutcome, Invocation,
    cooldown::Admission,
};
use crate::config::BotSettings;
use crate::telegram::{IncomingMessage, Transport};

/// Errors raised while assembling a dispatcher.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("alias '{alias}' points at unregistered command '{target}'")]
    DanglingAlias { alias: String, target: String },
}

/// Tunables for a single dispatcher instance.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub prefix: String,
    pub cooldown: Duration,
    pub count_usage: bool,
    pub notify_cooldown: bool,
}

impl DispatcherConfig {
    /// Userbot dispatcher configuration.
    #[must_use]
    pub fn from_settings(settings: &BotSettings) -> Self {
        Self {
            prefix: settings.command_prefix.clone(),
            cooldown: settings.command_cooldown(),
            count_usage: settings.enable_command_logging,
            notify_cooldown: settings.notify_cooldown,
        }
    }
}

/// Entry point for every inbound text event.
pub struct Dispatcher {
    config: DispatcherConfig,
    registry: CommandRegistry,
    aliases: AliasResolver,
    cooldowns: Arc<CooldownLedger>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if any alias targets a command that is not registered.
    pub fn new(
        config: DispatcherConfig,
        registry: CommandRegistry,
        aliases: AliasResolver,
        cooldowns: Arc<CooldownLedger>,
    ) -> Result<Self, RegistryError> {
        if let Some((alias, target)) = aliases.dangling(&registry).into_iter().next() {
            return Err(RegistryError::DanglingAlias { alias, target });
        }

        Ok(Self {
            config,
            registry,
            aliases,
            cooldowns,
        })
    }

    /// Command prefix of this dispatcher.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    /// Registered commands.
    #[must_use]
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Alias table.
    #[must_use]
    pub fn aliases(&self) -> &AliasResolver {
        &self.aliases
    }

    /// Cooldown ledger shared with the prune task.
    #[must_use]
    pub fn cooldowns(&self) -> &Arc<CooldownLedger> {
        &self.cooldowns
    }

    /// Handles one message using the current time.
    pub async fn dispatch(
        &self,
        transport: &dyn Transport,
        message: &IncomingMessage,
    ) -> DispatchOutcome {
        self.dispatch_at(transport, message, Instant::now()).await
    }

    /// Handles one message as if it arrived at `now`.
    pub async fn dispatch_at(
        &self,
        transport: &dyn Transport,
        message: &IncomingMessage,
        now: Instant,
    ) -> DispatchOutcome {
        let Some(parsed) = Invocation::parse(&message.text, &self.config.prefix) else {
            return DispatchOutcome::NotACommand;
        };

        let command = self.aliases.resolve(&parsed.command);
        let invocation = Invocation { command, ..parsed };

        let Some(handler) = self.registry.get(&invocation.command) else {
            debug!("Unknown command: {}", invocation.command);
            let text = format!(
                "❌ Unknown command: `{}`\nUse `{}help` to see available commands.",
                invocation.command, self.config.prefix
            );
            if let Err(e) = transport.respond(message, &text).await {
                warn!("Failed to report unknown command: {}", e);
            }
            return DispatchOutcome::UnknownCommand(invocation.command);
        };

        let user_id = message.sender_id();

        if self.config.count_usage {
            self.registry.usage().record(&invocation.command).await;
            info!(
                "Command '{}' used by {} ({})",
                invocation.command,
                message.sender_name(),
                user_id
            );
        }

        if !self.config.cooldown.is_zero() {
            let admission = self
                .cooldowns
                .check(user_id, &invocation.command, self.config.cooldown, now)
                .await;
            if let Admission::Rejected { remaining } = admission {
                if self.config.notify_cooldown {
                    let text = format!(
                        "⏳ Please wait {}s before using this command again",
                        remaining.as_secs_f64().ceil()
                    );
                    if let Err(e) = transport.respond(message, &text).await {
                        warn!("Failed to send cooldown notice: {}", e);
                    }
                }
                return DispatchOutcome::OnCooldown(remaining);
            }
        }

        let ctx = CommandContext {
            transport,
            message,
            invocation: &invocation,
            prefix: &self.config.prefix,
            registry: &self.registry,
            aliases: &self.aliases,
        };

        match handler.execute(&ctx).await {
            Ok(result) => {
                if let Err(e) = result.present(transport, message).await {
                    warn!("Failed to present result of '{}': {}", invocation.command, e);
                }
                DispatchOutcome::Handled
            }
            Err(e) => {
                error!("Error executing '{}': {}", invocation, e);
                let text = format!("❌ Command execution failed: `{}`", e.user_message());
                if let Err(e) = transport.respond(message, &text).await {
                    warn!("Failed to report command failure: {}", e);
                }
                DispatchOutcome::HandlerError(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::commands::{Command, CommandError, CommandResult, UsageCounter};
    use crate::telegram::testing::{RecordingTransport, message, message_from};

    struct Pong;

    #[async_trait]
    impl Command for Pong {
        async fn execute(&self, _ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
            Ok(CommandResult::success("pong"))
        }
    }

    struct Boom;

    #[async_trait]
    impl Command for Boom {
        async fn execute(&self, _ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
            Err(CommandError::Failed("boom".to_owned()))
        }
    }

    struct Args;

    #[async_trait]
    impl Command for Args {
        async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
            Ok(CommandResult::success(ctx.args().join("|")))
        }
    }

    fn config(cooldown_secs: u64) -> DispatcherConfig {
        DispatcherConfig {
            prefix: ".".to_owned(),
            cooldown: Duration::from_secs(cooldown_secs),
            count_usage: true,
            notify_cooldown: false,
        }
    }

    fn dispatcher(cfg: DispatcherConfig) -> Dispatcher {
        let mut registry = CommandRegistry::new(Arc::new(UsageCounter::new()));
        registry
            .register("ping", Arc::new(Pong))
            .register("boom", Arc::new(Boom))
            .register("args", Arc::new(Args));
        let aliases = AliasResolver::from_pairs(&[("p", "ping")]);
        Dispatcher::new(cfg, registry, aliases, Arc::new(CooldownLedger::new())).unwrap()
    }

    #[tokio::test]
    async fn test_not_a_command() {
        let d = dispatcher(config(0));
        let t = RecordingTransport::new();

        assert_eq!(d.dispatch(&t, &message("hello")).await, DispatchOutcome::NotACommand);
        assert_eq!(d.dispatch(&t, &message(".")).await, DispatchOutcome::NotACommand);
        assert!(t.responses().is_empty());
    }

    #[tokio::test]
    async fn test_alias_resolves_and_counts_canonical() {
        let d = dispatcher(config(0));
        let t = RecordingTransport::new();

        assert_eq!(d.dispatch(&t, &message(".P")).await, DispatchOutcome::Handled);
        assert_eq!(t.last_response().as_deref(), Some("pong"));
        assert_eq!(d.registry().usage().count("ping").await, 1);
        assert_eq!(d.registry().usage().count("p").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_command_reports_and_skips_usage() {
        let d = dispatcher(config(0));
        let t = RecordingTransport::new();

        let outcome = d.dispatch(&t, &message(".bogus x")).await;
        assert_eq!(outcome, DispatchOutcome::UnknownCommand("bogus".to_owned()));
        assert_eq!(
            t.last_response().as_deref(),
            Some("❌ Unknown command: `bogus`\nUse `.help` to see available commands.")
        );
        assert_eq!(d.registry().usage().total().await, 0);
    }

    #[tokio::test]
    async fn test_arguments_are_passed_through() {
        let d = dispatcher(config(0));
        let t = RecordingTransport::new();

        d.dispatch(&t, &message(".args  a b   c")).await;
        assert_eq!(t.last_response().as_deref(), Some("a|b|c"));
    }

    #[tokio::test]
    async fn test_handler_error_is_contained() {
        let d = dispatcher(config(0));
        let t = RecordingTransport::new();

        let outcome = d.dispatch(&t, &message(".boom")).await;
        assert_eq!(outcome, DispatchOutcome::HandlerError("boom".to_owned()));
        assert_eq!(
            t.last_response().as_deref(),
            Some("❌ Command execution failed: `boom`")
        );
    }

    #[tokio::test]
    async fn test_cooldown_scenario() {
        let d = dispatcher(config(5));
        let t = RecordingTransport::new();
        let t0 = Instant::now();
        let msg = message(".ping");

        assert_eq!(d.dispatch_at(&t, &msg, t0).await, DispatchOutcome::Handled);
        assert_eq!(d.registry().usage().count("ping").await, 1);

        let outcome = d.dispatch_at(&t, &msg, t0 + Duration::from_secs(2)).await;
        assert_eq!(outcome, DispatchOutcome::OnCooldown(Duration::from_secs(3)));
        // Counted even though rejected.
        assert_eq!(d.registry().usage().count("ping").await, 2);
        assert_eq!(t.responses(), ["pong"]);

        let outcome = d.dispatch_at(&t, &msg, t0 + Duration::from_secs(6)).await;
        assert_eq!(outcome, DispatchOutcome::Handled);
        assert_eq!(d.registry().usage().count("ping").await, 3);
        assert_eq!(t.responses(), ["pong", "pong"]);
    }

    #[tokio::test]
    async fn test_cooldown_notice_when_enabled() {
        let mut cfg = config(5);
        cfg.notify_cooldown = true;
        let d = dispatcher(cfg);
        let t = RecordingTransport::new();
        let t0 = Instant::now();
        let msg = message(".ping");

        d.dispatch_at(&t, &msg, t0).await;
        d.dispatch_at(&t, &msg, t0 + Duration::from_secs(1)).await;
        assert_eq!(
            t.last_response().as_deref(),
            Some("⏳ Please wait 4s before using this command again")
        );
    }

    #[tokio::test]
    async fn test_cooldown_is_per_user() {
        let d = dispatcher(config(5));
        let t = RecordingTransport::new();
        let t0 = Instant::now();

        assert_eq!(d.dispatch_at(&t, &message_from(1, ".ping"), t0).await, DispatchOutcome::Handled);
        assert_eq!(d.dispatch_at(&t, &message_from(2, ".ping"), t0).await, DispatchOutcome::Handled);
    }

    #[tokio::test]
    async fn test_usage_not_counted_when_logging_disabled() {
        let mut cfg = config(0);
        cfg.count_usage = false;
        let d = dispatcher(cfg);
        let t = RecordingTransport::new();

        d.dispatch(&t, &message(".ping")).await;
        assert_eq!(d.registry().usage().total().await, 0);
    }

    #[test]
    fn test_dangling_alias_rejected() {
        let mut registry = CommandRegistry::new(Arc::new(UsageCounter::new()));
        registry.register("ping", Arc::new(Pong));
        let aliases = AliasResolver::from_pairs(&[("p", "ping"), ("x", "missing")]);

        let err = Dispatcher::new(config(0), registry, aliases, Arc::new(CooldownLedger::new()))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DanglingAlias {
                alias: "x".to_owned(),
                target: "missing".to_owned()
            }
        );
    }
}
