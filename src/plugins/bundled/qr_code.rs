//! QR code generation.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use image::{ImageFormat, Luma};
use qrcode::QrCode;

use super::ensure_known_commands;
use crate::commands::{CommandError, CommandResult, truncate};
use crate::plugins::{PluginEntry, PluginError, PluginHost, PluginManifest, RegistrationHandle};
use crate::telegram::{OutgoingMedia, RouteContext, RouteHandler};

const COMMANDS: &[&str] = &["qr"];

/// Smallest edge of the rendered image in pixels.
pub const MIN_QR_SIZE: u32 = 400;

/// Entry point `qrcode`.
pub struct QrCodeEntry;

#[async_trait]
impl PluginEntry for QrCodeEntry {
    fn name(&self) -> &'static str {
        "qrcode"
    }

    async fn register(
        &self,
        host: &PluginHost,
        manifest: &PluginManifest,
    ) -> Result<RegistrationHandle, PluginError> {
        ensure_known_commands(manifest, COMMANDS)?;
        Ok(host.bind_manifest_commands(manifest, Arc::new(QrGenerator)).await)
    }
}

struct QrGenerator;

/// Renders `data` as a PNG encoded QR code.
pub fn render_png(data: &str) -> Result<Vec<u8>, CommandError> {
    let code = QrCode::new(data.as_bytes())
        .map_err(|e| CommandError::Failed(format!("cannot encode QR data: {e}")))?;
    let picture = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_QR_SIZE, MIN_QR_SIZE)
        .build();

    let mut out = Cursor::new(Vec::new());
    picture.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[async_trait]
impl RouteHandler for QrGenerator {
    async fn handle(&self, ctx: &RouteContext<'_>) -> Result<CommandResult, CommandError> {
        let data = if ctx.invocation.rest.is_empty() {
            match ctx.transport.replied_text(ctx.message).await? {
                Some(text) if !text.trim().is_empty() => text,
                _ => {
                    return Ok(CommandResult::success(format!(
                        "Usage: `{p}qr <text>` or reply to a message with `{p}qr`",
                        p = ctx.prefix
                    )));
                }
            }
        } else {
            ctx.invocation.rest.clone()
        };

        ctx.transport
            .respond(ctx.message, "🔄 Generating QR code...")
            .await?;

        let payload = data.clone();
        let png = tokio::task::spawn_blocking(move || render_png(&payload))
            .await
            .map_err(|e| CommandError::Failed(e.to_string()))??;

        ctx.transport.delete(ctx.message).await?;
        ctx.transport
            .send_media(
                ctx.message,
                OutgoingMedia::photo(
                    format!("qr_{}.png", ctx.message.id),
                    png,
                    Some(format!("📱 **QR Code**\n\n📝 **Data**: {}", truncate(&data, 100))),
                ),
            )
            .await?;
        Ok(CommandResult::silent())
    }
}
