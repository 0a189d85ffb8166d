//! Command types and definitions.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::{AliasResolver, CommandRegistry};
use crate::telegram::{IncomingMessage, Transport, TransportError};

/// Maximum length of an error detail shown to the user.
pub const MAX_ERROR_DETAIL: usize = 200;

/// A parsed `<prefix><command> [args...]` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Lower-cased first token after the prefix.
    pub command: String,

    /// Whitespace-separated arguments.
    pub args: Vec<String>,

    /// Raw text after the command token, trimmed.
    pub rest: String,
}

impl Invocation {
    /// Parses an invocation from message text.
    ///
    /// Returns `None` if the text does not start with `prefix` or nothing
    /// follows the prefix.
    #[must_use]
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let after_prefix = text.strip_prefix(prefix)?.trim_start();

        let (token, rest) = match after_prefix.split_once(char::is_whitespace) {
            Some((token, rest)) => (token, rest.trim()),
            None => (after_prefix, ""),
        };

        if token.is_empty() {
            return None;
        }

        Some(Self {
            command: token.to_lowercase(),
            args: rest.split_whitespace().map(str::to_owned).collect(),
            rest: rest.to_owned(),
        })
    }

    /// First argument, if present.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rest.is_empty() {
            write!(f, "{}", self.command)
        } else {
            write!(f, "{} {}", self.command, self.rest)
        }
    }
}

/// Result of command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// Response message to show the user. `None` leaves the chat untouched.
    pub message: Option<String>,
}

impl CommandResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Creates a successful result that has already produced its output.
    #[must_use]
    pub const fn silent() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// Shows the result in the chat of `message`.
    pub async fn present(
        &self,
        transport: &dyn Transport,
        message: &IncomingMessage,
    ) -> Result<(), TransportError> {
        match &self.message {
            Some(text) => transport.respond(message, text).await,
            None => Ok(()),
        }
    }
}

/// Failure inside a command or plugin handler.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("{0}")]
    Failed(String),
}

impl CommandError {
    /// Short text safe to show in a chat.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            // reqwest errors embed full URLs, which may carry API keys.
            Self::Http(e) if e.is_timeout() => "request timed out".to_owned(),
            Self::Http(e) => e.status().map_or_else(
                || "request failed".to_owned(),
                |status| format!("request failed with status {status}"),
            ),
            other => truncate(&other.to_string(), MAX_ERROR_DETAIL),
        }
    }
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran to completion.
    Handled,
    /// The text is not a command for this dispatcher.
    NotACommand,
    /// The command (after alias resolution) is not registered.
    UnknownCommand(String),
    /// The sender must wait this long before the command is admitted again.
    OnCooldown(Duration),
    /// The handler failed; contains the logged detail.
    HandlerError(String),
}

/// Everything a command handler can see.
pub struct CommandContext<'a> {
    pub transport: &'a dyn Transport,
    pub message: &'a IncomingMessage,
    pub invocation: &'a Invocation,
    pub prefix: &'a str,
    pub registry: &'a CommandRegistry,
    pub aliases: &'a AliasResolver,
}

impl CommandContext<'_> {
    /// Arguments of the invocation.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.invocation.args
    }
}

/// A command registered in the [`CommandRegistry`].
#[async_trait]
pub trait Command: Send + Sync {
    /// Runs the command.
    async fn execute(&self, ctx: &CommandContext<'_>) -> Result<CommandResult, CommandError>;
}

/// Truncates a string to a maximum length, adding "..." if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", s.chars().take(max_len).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = ".";

    #[test]
    fn test_parse_plain_command() {
        let inv = Invocation::parse(".ping", PREFIX).unwrap();
        assert_eq!(inv.command, "ping");
        assert!(inv.args.is_empty());
        assert_eq!(inv.rest, "");
    }

    #[test]
    fn test_parse_with_args() {
        let inv = Invocation::parse(".tr en  Hola   mundo", PREFIX).unwrap();
        assert_eq!(inv.command, "tr");
        assert_eq!(inv.args, ["en", "Hola", "mundo"]);
        assert_eq!(inv.rest, "en  Hola   mundo");
        assert_eq!(inv.arg(0), Some("en"));
        assert_eq!(inv.arg(5), None);
    }

    #[test]
    fn test_parse_case_insensitive() {
        let inv = Invocation::parse(".PiNg", PREFIX).unwrap();
        assert_eq!(inv.command, "ping");
    }

    #[test]
    fn test_parse_wrong_prefix() {
        assert_eq!(Invocation::parse("ping", PREFIX), None);
        assert_eq!(Invocation::parse(" .ping", PREFIX), None);
        assert_eq!(Invocation::parse("/ping", PREFIX), None);
    }

    #[test]
    fn test_parse_empty_after_prefix() {
        assert_eq!(Invocation::parse(".", PREFIX), None);
        assert_eq!(Invocation::parse(".   ", PREFIX), None);
    }

    #[test]
    fn test_parse_multichar_prefix() {
        let inv = Invocation::parse("!!help calc", "!!").unwrap();
        assert_eq!(inv.command, "help");
        assert_eq!(inv.args, ["calc"]);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Hello", 10), "Hello");
        assert_eq!(truncate("Hello, World!", 5), "Hello...");
        assert_eq!(truncate("Привет", 3), "При...");
    }

    #[test]
    fn test_failed_error_is_truncated() {
        let err = CommandError::Failed("x".repeat(500));
        assert_eq!(err.user_message().chars().count(), MAX_ERROR_DETAIL + 3);
    }
}
