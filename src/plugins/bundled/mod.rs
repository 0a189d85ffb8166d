//! Plugin entry points compiled into the binary.

mod group_manager;
mod qr_code;
mod sticker_maker;
mod template;
mod translator;
mod webshot;

use std::sync::Arc;

pub use group_manager::{GroupManager, GroupManagerEntry};
pub use qr_code::{QrCodeEntry, render_png};
pub use sticker_maker::{STYLES, StickerMakerEntry, StickerStyle, render_webp};
pub use template::TemplateEntry;
pub use translator::{Translation, TranslatorEntry, parse_translation};
pub use webshot::{DEFAULT_WEBSHOT_API, Webshot, WebshotEntry, normalize_url};

use super::{EntryPoints, PluginError, PluginManifest};

/// All entry points a manifest may name.
#[must_use]
pub fn entry_points() -> EntryPoints {
    let mut entries = EntryPoints::new();
    entries
        .insert(Arc::new(TemplateEntry))
        .insert(Arc::new(WebshotEntry))
        .insert(Arc::new(TranslatorEntry))
        .insert(Arc::new(QrCodeEntry))
        .insert(Arc::new(StickerMakerEntry))
        .insert(Arc::new(GroupManagerEntry));
    entries
}

/// Rejects manifests that declare commands the entry point cannot serve.
pub(crate) fn ensure_known_commands(
    manifest: &PluginManifest,
    known: &[&str],
) -> Result<(), PluginError> {
    match manifest
        .commands
        .iter()
        .find(|c| !known.contains(&c.as_str()))
    {
        Some(unknown) => Err(PluginError::registration(
            &manifest.id,
            format!(
                "entry point '{}' has no command '{}'",
                manifest.entry_point, unknown
            ),
        )),
        None => Ok(()),
    }
}
