//! Static catalog of installable plugins.

use std::path::{Path, PathBuf};

/// `(id, name, description, commands, dependencies)`
type CatalogRow = (
    &'static str,
    &'static str,
    &'static str,
    &'static [&'static str],
    &'static [&'static str],
);

const BUNDLED: &[CatalogRow] = &[
    (
        "webshot",
        "Webshot",
        "Take website screenshots",
        &["webshot"],
        &["reqwest"],
    ),
    (
        "translator",
        "Translator",
        "Text translation using Google Translate",
        &["tr", "translate"],
        &["reqwest"],
    ),
    (
        "qrcode",
        "QR Code",
        "QR code generator",
        &["qr"],
        &["qrcode", "image"],
    ),
    (
        "sticker_maker",
        "Sticker Maker",
        "Create custom stickers from text with various styles",
        &["sticker", "stickerpack"],
        &["image"],
    ),
    (
        "group_manager",
        "Group Manager",
        "Leave groups and manage group participation",
        &["leave", "leaveall", "groups"],
        &[],
    ),
];

/// Where a plugin file is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLocator<'a> {
    Remote(&'a str),
    Local(&'a Path),
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    /// `http(s)://` URL or filesystem path of the plugin file.
    pub source: String,
    pub commands: Vec<String>,
    pub dependencies: Vec<String>,
}

impl PluginDescriptor {
    /// Classifies the source.
    #[must_use]
    pub fn locator(&self) -> SourceLocator<'_> {
        if self.source.starts_with("http://") || self.source.starts_with("https://") {
            SourceLocator::Remote(&self.source)
        } else {
            SourceLocator::Local(Path::new(&self.source))
        }
    }
}

/// Read-only map from plugin id to descriptor.
#[derive(Debug, Clone, Default)]
pub struct PluginCatalog {
    entries: Vec<PluginDescriptor>,
}

impl PluginCatalog {
    /// Creates a catalog from explicit entries.
    #[must_use]
    pub fn new(entries: Vec<PluginDescriptor>) -> Self {
        Self { entries }
    }

    /// The bundled catalog, with sources resolved against `base`.
    ///
    /// `base` is either a URL prefix or a directory.
    #[must_use]
    pub fn builtin(base: &str) -> Self {
        let entries = BUNDLED
            .iter()
            .map(|(id, name, description, commands, dependencies)| PluginDescriptor {
                id: (*id).to_owned(),
                name: (*name).to_owned(),
                description: (*description).to_owned(),
                source: source_for(base, id),
                commands: commands.iter().map(|c| (*c).to_owned()).collect(),
                dependencies: dependencies.iter().map(|d| (*d).to_owned()).collect(),
            })
            .collect();
        Self { entries }
    }

    /// Looks up a descriptor.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&PluginDescriptor> {
        self.entries.iter().find(|d| d.id == id)
    }

    /// All descriptors in catalog order.
    #[must_use]
    pub fn list_all(&self) -> &[PluginDescriptor] {
        &self.entries
    }
}

fn source_for(base: &str, id: &str) -> String {
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{}/{id}.json", base.trim_end_matches('/'))
    } else {
        PathBuf::from(base)
            .join(format!("{id}.json"))
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_entries() {
        let catalog = PluginCatalog::builtin("https://example.org/plugins/");
        let ids: Vec<&str> = catalog.list_all().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(
            ids,
            ["webshot", "translator", "qrcode", "sticker_maker", "group_manager"]
        );

        let translator = catalog.get("translator").unwrap();
        assert_eq!(translator.commands, ["tr", "translate"]);
        assert_eq!(
            translator.locator(),
            SourceLocator::Remote("https://example.org/plugins/translator.json")
        );
        assert!(catalog.get("weather").is_none());
    }

    #[test]
    fn test_local_base() {
        let catalog = PluginCatalog::builtin("demos/plugins");
        let descriptor = catalog.get("qrcode").unwrap();
        assert_eq!(
            descriptor.locator(),
            SourceLocator::Local(&Path::new("demos/plugins").join("qrcode.json"))
        );
    }
}
