//! Website screenshots through a screenshot API.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::ensure_known_commands;
use crate::commands::{CommandError, CommandResult};
use crate::plugins::{PluginEntry, PluginError, PluginHost, PluginManifest, RegistrationHandle};
use crate::telegram::{OutgoingMedia, RouteContext, RouteHandler};

const COMMANDS: &[&str] = &["webshot"];

/// Screenshot API used when a manifest sets no `api_url`.
pub const DEFAULT_WEBSHOT_API: &str = "https://api.screenshotone.com/take";

/// Entry point `webshot`.
pub struct WebshotEntry;

#[async_trait]
impl PluginEntry for WebshotEntry {
    fn name(&self) -> &'static str {
        "webshot"
    }

    async fn register(
        &self,
        host: &PluginHost,
        manifest: &PluginManifest,
    ) -> Result<RegistrationHandle, PluginError> {
        ensure_known_commands(manifest, COMMANDS)?;
        let handler = Webshot::new(
            host.http.clone(),
            manifest.setting("api_url").unwrap_or(DEFAULT_WEBSHOT_API),
            manifest.setting("access_key").map(str::to_owned),
        );
        Ok(host.bind_manifest_commands(manifest, Arc::new(handler)).await)
    }
}

/// Screenshot handler shared by the plugin and the companion bot.
pub struct Webshot {
    http: reqwest::Client,
    api_url: String,
    access_key: Option<String>,
    delete_command: bool,
}

impl Webshot {
    #[must_use]
    pub fn new(http: reqwest::Client, api_url: impl Into<String>, access_key: Option<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            access_key,
            delete_command: true,
        }
    }

    /// Leaves the triggering message in place, for accounts that cannot delete it.
    #[must_use]
    pub fn keep_command(mut self) -> Self {
        self.delete_command = false;
        self
    }
}

/// Adds `https://` when no scheme is given.
#[must_use]
pub fn normalize_url(raw: &str) -> String {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_owned()
    } else {
        format!("https://{raw}")
    }
}

#[async_trait]
impl RouteHandler for Webshot {
    async fn handle(&self, ctx: &RouteContext<'_>) -> Result<CommandResult, CommandError> {
        let Some(raw) = ctx.invocation.arg(0) else {
            return Ok(CommandResult::success(format!(
                "Usage: `{p}webshot <url>`\nExample: `{p}webshot https://google.com`",
                p = ctx.prefix
            )));
        };
        let url = normalize_url(raw);

        ctx.transport
            .respond(ctx.message, &format!("📸 Taking screenshot of: {url}"))
            .await?;

        let mut query = vec![
            ("url", url.as_str()),
            ("viewport_width", "1920"),
            ("viewport_height", "1080"),
            ("device_scale_factor", "1"),
            ("format", "png"),
            ("block_ads", "true"),
            ("block_cookie_banners", "true"),
        ];
        if let Some(key) = &self.access_key {
            query.push(("access_key", key.as_str()));
        }

        let response = self.http.get(&self.api_url).query(&query).send().await?;
        if !response.status().is_success() {
            debug!("Screenshot API answered {}", response.status());
            return Ok(CommandResult::error(
                "❌ Failed to take screenshot. Please check the URL.",
            ));
        }
        let bytes = response.bytes().await?;

        if self.delete_command {
            ctx.transport.delete(ctx.message).await?;
        }
        ctx.transport
            .send_media(
                ctx.message,
                OutgoingMedia::photo(
                    format!("screenshot_{}.png", ctx.message.id),
                    bytes.to_vec(),
                    Some(format!(
                        "📸 **Website Screenshot**\n\n🔗 **URL**: {url}\n📱 **Resolution**: 1920x1080"
                    )),
                ),
            )
            .await?;
        Ok(CommandResult::silent())
    }
}
