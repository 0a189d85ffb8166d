//! Companion bot account and automatic replies.
//!
//! The companion bot is a second account signed in with a bot token. It
//! answers a configured subset of the built-in commands with the `/` prefix
//! through its own [`Dispatcher`], plus a public `webshot`. Activity can be
//! reported to a log group.

mod autoresponder;
mod log_group;

use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

pub use autoresponder::{AutoReply, AutoResponder, FLOOD_MAX_MESSAGES, FLOOD_WINDOW, FloodGuard};
pub use log_group::{LogKind, LogReporter, format_report};

use crate::commands::{
    AliasResolver, BotInfo, Command, CommandContext, CommandError, CommandRegistry,
    CommandResult, CooldownLedger, DispatchOutcome, Dispatcher, DispatcherConfig, Invocation,
    RegistryError, UsageCounter, register_builtins,
};
use crate::config::AssistantSettings;
use crate::plugins::bundled::{DEFAULT_WEBSHOT_API, Webshot};
use crate::telegram::{IncomingMessage, RouteContext, RouteHandler, Transport};

/// Prefix of companion bot commands.
pub const BOT_PREFIX: &str = "/";

/// Public command front end of the companion bot.
pub struct Assistant {
    settings: AssistantSettings,
    dispatcher: Dispatcher,
    reporter: Option<LogReporter>,
}

impl Assistant {
    /// Builds the companion bot dispatcher.
    ///
    /// Only `start` and the allowed public commands that exist are registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the dispatcher cannot be assembled.
    pub fn new(
        settings: AssistantSettings,
        bot: &Arc<BotInfo>,
        http: reqwest::Client,
    ) -> Result<Self, RegistryError> {
        let mut builtins = CommandRegistry::new(Arc::new(UsageCounter::new()));
        register_builtins(&mut builtins, bot);
        let webshot = Webshot::new(
            http,
            DEFAULT_WEBSHOT_API,
            settings.webshot_access_key.clone(),
        )
        .keep_command();
        builtins.register("webshot", Arc::new(WebshotCommand { shot: webshot }));

        let mut registry = CommandRegistry::new(Arc::new(UsageCounter::new()));
        registry.register("start", Arc::new(StartCommand { bot: Arc::clone(bot) }));
        for name in &settings.allowed_public_commands {
            match builtins.get(name) {
                Some(command) => {
                    registry.register(name.clone(), command);
                }
                None => debug!("Public command '{}' does not exist, skipping", name),
            }
        }

        let config = DispatcherConfig {
            prefix: BOT_PREFIX.to_owned(),
            cooldown: Duration::from_secs(settings.public_command_cooldown_secs),
            count_usage: true,
            notify_cooldown: true,
        };
        let dispatcher = Dispatcher::new(
            config,
            registry,
            AliasResolver::new(),
            Arc::new(CooldownLedger::new()),
        )?;

        Ok(Self {
            settings,
            dispatcher,
            reporter: None,
        })
    }

    /// Reports handled commands and failures through `reporter`.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Option<LogReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Dispatcher of the companion bot.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handles one message sent to the companion bot.
    pub async fn handle(
        &self,
        transport: &dyn Transport,
        message: &IncomingMessage,
    ) -> DispatchOutcome {
        if message.outgoing || !self.settings.is_user_allowed(message.sender_id()) {
            return DispatchOutcome::NotACommand;
        }

        let message = match strip_bot_mention(&message.text) {
            Cow::Borrowed(_) => Cow::Borrowed(message),
            Cow::Owned(text) => Cow::Owned(IncomingMessage {
                text,
                ..message.clone()
            }),
        };
        let outcome = self.dispatcher.dispatch(transport, &message).await;

        if let Some(reporter) = &self.reporter {
            let command = Invocation::parse(&message.text, BOT_PREFIX)
                .map(|invocation| invocation.command)
                .filter(|command| self.dispatcher.registry().contains(command));
            reporter
                .record(
                    &message,
                    command.as_deref(),
                    &outcome,
                    self.dispatcher.registry().usage(),
                )
                .await;
        }
        outcome
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Removes the `@botname` suffix groups append to commands.
#[must_use]
pub fn strip_bot_mention(text: &str) -> Cow<'_, str> {
    let Some(rest) = text.strip_prefix(BOT_PREFIX) else {
        return Cow::Borrowed(text);
    };
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    match rest[..end].find('@') {
        Some(at) => Cow::Owned(format!("{BOT_PREFIX}{}{}", &rest[..at], &rest[end..])),
        None => Cow::Borrowed(text),
    }
}

/// `webshot` for the public, served by the screenshot plugin's handler.
pub struct WebshotCommand {
    shot: Webshot,
}

#[async_trait]
impl Command for WebshotCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let route = RouteContext {
            transport: ctx.transport,
            message: ctx.message,
            invocation: ctx.invocation,
            prefix: ctx.prefix,
        };
        self.shot.handle(&route).await
    }
}

/// `start`
pub struct StartCommand {
    pub bot: Arc<BotInfo>,
}

#[async_trait]
impl Command for StartCommand {
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError> {
        let mut text = format!(
            "🤖 **Welcome to {} Assistant!**\n\n\
             I'm the assistant bot for **{} v{}**\n\n\
             **🔧 Available Commands:**\n",
            self.bot.name, self.bot.name, self.bot.version
        );
        for name in ctx.registry.names() {
            if name != "start" {
                let _ = writeln!(text, "• `{}{name}`", ctx.prefix);
            }
        }
        let _ = write!(
            text,
            "\nType `{}help` for detailed command information!",
            ctx.prefix
        );
        Ok(CommandResult::success(text))
    }
}
