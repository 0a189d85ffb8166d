//! Declarative reply plugins.
//!
//! Every command maps to a fixed reply. `{args}` in a reply is replaced with
//! the text after the command.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::commands::{CommandError, CommandResult};
use crate::plugins::{
    PluginEntry, PluginError, PluginHost, PluginManifest, RegistrationHandle, TEMPLATE_ENTRY_POINT,
};
use crate::telegram::{RouteContext, RouteHandler};

/// Entry point for manifests with `"entry_point": "template"`.
pub struct TemplateEntry;

#[async_trait]
impl PluginEntry for TemplateEntry {
    fn name(&self) -> &'static str {
        TEMPLATE_ENTRY_POINT
    }

    async fn register(
        &self,
        host: &PluginHost,
        manifest: &PluginManifest,
    ) -> Result<RegistrationHandle, PluginError> {
        let handler = TemplateReplies {
            replies: manifest.replies.clone(),
        };
        Ok(host.bind_manifest_commands(manifest, Arc::new(handler)).await)
    }
}

struct TemplateReplies {
    replies: BTreeMap<String, String>,
}

#[async_trait]
impl RouteHandler for TemplateReplies {
    async fn handle(&self, ctx: &RouteContext<'_>) -> Result<CommandResult, CommandError> {
        let reply = self
            .replies
            .get(&ctx.invocation.command)
            .ok_or_else(|| CommandError::Failed(format!("no reply for '{}'", ctx.invocation.command)))?;
        Ok(CommandResult::success(
            reply.replace("{args}", &ctx.invocation.rest),
        ))
    }
}
