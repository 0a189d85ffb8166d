//! Plugin manifest format and validation.
//!
//! An installed plugin is a JSON document stored as `<plugins_dir>/<id>.json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Entry point of declarative reply plugins.
pub const TEMPLATE_ENTRY_POINT: &str = "template";

/// Maximum length of a plugin id.
pub const MAX_PLUGIN_ID_LEN: usize = 32;

/// Plugin metadata and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Identifier, equal to the file stem.
    pub id: String,

    /// Human readable name.
    pub name: String,

    /// Plugin version.
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: Option<String>,

    /// Name of the compiled-in entry point that registers the plugin.
    pub entry_point: String,

    /// Command tokens the plugin binds, without prefix.
    pub commands: Vec<String>,

    /// Informational list of crates or services the plugin relies on.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Replies of a template plugin, keyed by command.
    #[serde(default)]
    pub replies: BTreeMap<String, String>,

    /// Free-form settings passed to the entry point.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

/// Why a manifest was rejected.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("not a valid plugin manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid plugin id '{0}' (1-32 chars of a-z, 0-9, _)")]
    InvalidId(String),

    #[error("manifest id '{found}' does not match plugin id '{expected}'")]
    IdMismatch { expected: String, found: String },

    #[error("field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("plugin declares no commands")]
    NoCommands,

    #[error("invalid command token '{0}'")]
    InvalidCommand(String),

    #[error("command '{0}' is declared twice")]
    DuplicateCommand(String),

    #[error("template plugin has no reply for command '{0}'")]
    MissingReply(String),
}

/// Whether `id` is a valid plugin identifier.
#[must_use]
pub fn is_valid_plugin_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_PLUGIN_ID_LEN && is_token(id)
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl PluginManifest {
    /// Parses a manifest without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a manifest document.
    pub fn parse(source: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Parses and validates a manifest that must carry `expected_id`.
    ///
    /// # Errors
    ///
    /// Returns the first contract violation found.
    pub fn parse_for(source: &str, expected_id: &str) -> Result<Self, ManifestError> {
        let manifest = Self::parse(source)?;
        manifest.validate()?;
        if manifest.id != expected_id {
            return Err(ManifestError::IdMismatch {
                expected: expected_id.to_owned(),
                found: manifest.id,
            });
        }
        Ok(manifest)
    }

    /// Checks the manifest against the plugin contract.
    ///
    /// # Errors
    ///
    /// Returns the first contract violation found.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if !is_valid_plugin_id(&self.id) {
            return Err(ManifestError::InvalidId(self.id.clone()));
        }
        if self.name.trim().is_empty() {
            return Err(ManifestError::EmptyField("name"));
        }
        if self.version.trim().is_empty() {
            return Err(ManifestError::EmptyField("version"));
        }
        if self.entry_point.trim().is_empty() {
            return Err(ManifestError::EmptyField("entry_point"));
        }
        if self.commands.is_empty() {
            return Err(ManifestError::NoCommands);
        }

        for (i, command) in self.commands.iter().enumerate() {
            if !is_token(command) {
                return Err(ManifestError::InvalidCommand(command.clone()));
            }
            if self.commands[..i].contains(command) {
                return Err(ManifestError::DuplicateCommand(command.clone()));
            }
        }

        if self.entry_point == TEMPLATE_ENTRY_POINT {
            if let Some(missing) = self
                .commands
                .iter()
                .find(|c| !self.replies.contains_key(c.as_str()))
            {
                return Err(ManifestError::MissingReply(missing.clone()));
            }
        }

        Ok(())
    }

    /// A setting value, if present and non-empty.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "id": "greeter",
        "name": "Greeter",
        "version": "1.0.0",
        "entry_point": "template",
        "commands": ["hello", "bye"],
        "replies": { "hello": "Hi there!", "bye": "See you" }
    }"#;

    #[test]
    fn test_valid_manifest() {
        let manifest = PluginManifest::parse_for(VALID, "greeter").unwrap();
        assert_eq!(manifest.commands, ["hello", "bye"]);
        assert_eq!(manifest.replies["hello"], "Hi there!");
        assert!(manifest.dependencies.is_empty());
    }

    #[test]
    fn test_id_mismatch() {
        let err = PluginManifest::parse_for(VALID, "other").unwrap_err();
        assert!(matches!(err, ManifestError::IdMismatch { .. }));
    }

    #[test]
    fn test_not_json_is_rejected() {
        let err = PluginManifest::parse("def register_plugin(client): pass").unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn test_missing_reply_is_rejected() {
        let source = VALID.replace(r#", "bye": "See you""#, "");
        let err = PluginManifest::parse_for(&source, "greeter").unwrap_err();
        assert!(matches!(err, ManifestError::MissingReply(ref c) if c == "bye"));
    }

    #[test]
    fn test_bad_command_tokens() {
        let source = VALID.replace(r#"["hello", "bye"]"#, r#"["hello", "Bye!"]"#);
        assert!(matches!(
            PluginManifest::parse_for(&source, "greeter"),
            Err(ManifestError::InvalidCommand(_))
        ));

        let source = VALID.replace(r#"["hello", "bye"]"#, "[]");
        assert!(matches!(
            PluginManifest::parse_for(&source, "greeter"),
            Err(ManifestError::NoCommands)
        ));

        let source = VALID.replace(r#"["hello", "bye"]"#, r#"["hello", "hello"]"#);
        assert!(matches!(
            PluginManifest::parse_for(&source, "greeter"),
            Err(ManifestError::DuplicateCommand(_))
        ));
    }

    #[test]
    fn test_empty_fields_rejected() {
        let source = VALID.replace(r#""version": "1.0.0""#, r#""version": " ""#);
        assert!(matches!(
            PluginManifest::parse_for(&source, "greeter"),
            Err(ManifestError::EmptyField("version"))
        ));
    }

    #[test]
    fn test_plugin_id_rules() {
        assert!(is_valid_plugin_id("sticker_maker"));
        assert!(is_valid_plugin_id("qr2"));
        assert!(!is_valid_plugin_id(""));
        assert!(!is_valid_plugin_id("../etc/passwd"));
        assert!(!is_valid_plugin_id("Upper"));
        assert!(!is_valid_plugin_id(&"a".repeat(33)));
    }

    #[test]
    fn test_setting_ignores_blank_values() {
        let mut manifest = PluginManifest::parse(VALID).unwrap();
        manifest.settings.insert("api_key".to_owned(), "  ".to_owned());
        assert_eq!(manifest.setting("api_key"), None);
        manifest.settings.insert("api_key".to_owned(), "k".to_owned());
        assert_eq!(manifest.setting("api_key"), Some("k"));
    }
}
