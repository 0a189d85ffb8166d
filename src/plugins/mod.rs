//! Plugin catalog, installation and runtime loading.

pub mod bundled;
mod catalog;
mod error;
mod installer;
mod loader;
mod manager;
mod manifest;

pub use catalog::{PluginCatalog, PluginDescriptor, SourceLocator};
pub use error::PluginError;
pub use installer::{PluginInstaller, plugin_path};
pub use loader::{EntryPoints, LoadedPlugin, PluginEntry, PluginHost, PluginLoader, RegistrationHandle};
pub use manager::{PluginManager, PluginStatus};
pub use manifest::{
    MAX_PLUGIN_ID_LEN, ManifestError, PluginManifest, TEMPLATE_ENTRY_POINT, is_valid_plugin_id,
};
