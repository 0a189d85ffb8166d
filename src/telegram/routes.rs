//! Message routes bound at runtime by plugins.
//!
//! The update loop offers every outgoing message to the [`RouteTable`] before
//! the command dispatcher sees it. Bindings carry an id so that unloading a
//! plugin can remove exactly what it added.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use super::{IncomingMessage, Transport};
use crate::commands::{CommandError, CommandResult, DispatchOutcome, Invocation};

/// Identifier of a single binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Matches `<prefix><command>` for a fixed set of command tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFilter {
    prefix: String,
    commands: Vec<String>,
}

impl CommandFilter {
    /// Creates a filter for the given tokens.
    #[must_use]
    pub fn new<I, S>(prefix: impl Into<String>, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefix: prefix.into(),
            commands: commands
                .into_iter()
                .map(|c| c.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Parses `text` if it invokes one of the filter's commands.
    #[must_use]
    pub fn matches(&self, text: &str) -> Option<Invocation> {
        Invocation::parse(text, &self.prefix).filter(|inv| self.commands.contains(&inv.command))
    }

    /// Prefix the filter expects.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Command tokens covered by this filter.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

/// What a route handler can see.
pub struct RouteContext<'a> {
    pub transport: &'a dyn Transport,
    pub message: &'a IncomingMessage,
    pub invocation: &'a Invocation,
    pub prefix: &'a str,
}

/// Handler attached to a binding.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(&self, ctx: &RouteContext<'_>) -> Result<CommandResult, CommandError>;
}

struct Binding {
    id: BindingId,
    owner: String,
    filter: CommandFilter,
    handler: Arc<dyn RouteHandler>,
}

/// Live set of plugin bindings.
#[derive(Default)]
pub struct RouteTable {
    next_id: AtomicU64,
    bindings: RwLock<Vec<Binding>>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binding owned by `owner`.
    pub async fn bind(
        &self,
        owner: &str,
        filter: CommandFilter,
        handler: Arc<dyn RouteHandler>,
    ) -> BindingId {
        let id = BindingId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(
            "Binding {} for '{}': {:?}",
            id,
            owner,
            filter.commands()
        );
        self.bindings.write().await.push(Binding {
            id,
            owner: owner.to_owned(),
            filter,
            handler,
        });
        id
    }

    /// Removes a binding. Returns `false` if it was already gone.
    pub async fn unbind(&self, id: BindingId) -> bool {
        let mut bindings = self.bindings.write().await;
        let before = bindings.len();
        bindings.retain(|b| b.id != id);
        before != bindings.len()
    }

    /// Number of live bindings.
    pub async fn len(&self) -> usize {
        self.bindings.read().await.len()
    }

    /// Whether no bindings exist.
    pub async fn is_empty(&self) -> bool {
        self.bindings.read().await.is_empty()
    }

    /// Commands currently bound, as `(owner, command)` pairs.
    pub async fn bound_commands(&self) -> Vec<(String, String)> {
        self.bindings
            .read()
            .await
            .iter()
            .flat_map(|b| {
                b.filter
                    .commands()
                    .iter()
                    .map(|c| (b.owner.clone(), c.clone()))
            })
            .collect()
    }

    /// Offers a message to the bindings, first match wins.
    ///
    /// Returns `None` if no binding matched.
    pub async fn route(
        &self,
        transport: &dyn Transport,
        message: &IncomingMessage,
    ) -> Option<DispatchOutcome> {
        let (owner, prefix, invocation, handler) = {
            let bindings = self.bindings.read().await;
            bindings.iter().find_map(|b| {
                b.filter.matches(&message.text).map(|inv| {
                    (
                        b.owner.clone(),
                        b.filter.prefix().to_owned(),
                        inv,
                        Arc::clone(&b.handler),
                    )
                })
            })?
        };

        debug!("Routing '{}' to plugin '{}'", invocation.command, owner);
        let ctx = RouteContext {
            transport,
            message,
            invocation: &invocation,
            prefix: &prefix,
        };

        let outcome = match handler.handle(&ctx).await {
            Ok(result) => {
                if let Err(e) = result.present(transport, message).await {
                    warn!("Failed to present result of '{}': {}", invocation.command, e);
                }
                DispatchOutcome::Handled
            }
            Err(e) => {
                error!("Plugin '{}' failed on '{}': {}", owner, invocation, e);
                let text = format!("❌ Command execution failed: `{}`", e.user_message());
                if let Err(e) = transport.respond(message, &text).await {
                    warn!("Failed to report plugin failure: {}", e);
                }
                DispatchOutcome::HandlerError(e.to_string())
            }
        };
        Some(outcome)
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}
