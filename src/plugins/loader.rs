//! Loads installed plugins and binds them to the route table.
//!
//! Plugin files only carry data. The code behind a plugin is one of the
//! [`PluginEntry`] implementations compiled into the binary, selected by the
//! manifest's `entry_point`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::PluginError;
use super::installer::plugin_path;
use super::manifest::{PluginManifest, is_valid_plugin_id};
use crate::telegram::{BindingId, CommandFilter, RouteHandler, RouteTable};

/// What a plugin entry point is given at registration.
#[derive(Clone)]
pub struct PluginHost {
    pub routes: Arc<RouteTable>,
    pub http: reqwest::Client,
    pub prefix: String,
    reserved: Arc<HashSet<String>>,
}

impl PluginHost {
    /// Creates a host.
    #[must_use]
    pub fn new(routes: Arc<RouteTable>, http: reqwest::Client, prefix: impl Into<String>) -> Self {
        Self {
            routes,
            http,
            prefix: prefix.into(),
            reserved: Arc::default(),
        }
    }

    /// Command names no plugin may bind.
    #[must_use]
    pub fn with_reserved<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.reserved = Arc::new(
            names
                .into_iter()
                .map(|name| name.as_ref().to_owned())
                .collect(),
        );
        self
    }

    /// First command of `manifest` that collides with a reserved name.
    #[must_use]
    pub fn reserved_collision<'a>(&self, manifest: &'a PluginManifest) -> Option<&'a str> {
        manifest
            .commands
            .iter()
            .map(String::as_str)
            .find(|command| self.reserved.contains(*command))
    }

    /// Binds every command declared by `manifest` to `handler`.
    pub async fn bind_manifest_commands(
        &self,
        manifest: &PluginManifest,
        handler: Arc<dyn RouteHandler>,
    ) -> RegistrationHandle {
        let mut handle = RegistrationHandle::new(Arc::clone(&self.routes), &manifest.id);
        handle
            .bind(CommandFilter::new(&self.prefix, &manifest.commands), handler)
            .await;
        handle
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// Bindings created by one registration.
///
/// Dropping a handle does not remove its bindings; call [`dispose`](Self::dispose).
#[derive(Debug)]
pub struct RegistrationHandle {
    routes: Arc<RouteTable>,
    owner: String,
    bindings: Vec<BindingId>,
}

impl RegistrationHandle {
    /// Creates an empty handle for `owner`.
    #[must_use]
    pub fn new(routes: Arc<RouteTable>, owner: &str) -> Self {
        Self {
            routes,
            owner: owner.to_owned(),
            bindings: Vec::new(),
        }
    }

    /// Adds a binding and remembers its id.
    pub async fn bind(&mut self, filter: CommandFilter, handler: Arc<dyn RouteHandler>) -> BindingId {
        let id = self.routes.bind(&self.owner, filter, handler).await;
        self.bindings.push(id);
        id
    }

    /// Number of bindings held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the handle holds no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Removes every binding, returning how many were still live.
    pub async fn dispose(self) -> usize {
        let mut removed = 0;
        for id in self.bindings {
            if self.routes.unbind(id).await {
                removed += 1;
            }
        }
        debug!("Disposed {} binding(s) of '{}'", removed, self.owner);
        removed
    }
}

/// Registration entry point of a plugin kind.
#[async_trait]
pub trait PluginEntry: Send + Sync {
    /// Name referenced by `entry_point` in manifests.
    fn name(&self) -> &'static str;

    /// Binds the plugin's routes.
    async fn register(
        &self,
        host: &PluginHost,
        manifest: &PluginManifest,
    ) -> Result<RegistrationHandle, PluginError>;
}

/// Entry points available to manifests.
#[derive(Default, Clone)]
pub struct EntryPoints {
    entries: HashMap<&'static str, Arc<dyn PluginEntry>>,
}

impl EntryPoints {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry point, replacing one with the same name.
    pub fn insert(&mut self, entry: Arc<dyn PluginEntry>) -> &mut Self {
        self.entries.insert(entry.name(), entry);
        self
    }

    /// Looks up an entry point.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn PluginEntry>> {
        self.entries.get(name).cloned()
    }

    /// Names of all entry points, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// An active plugin.
#[derive(Debug)]
pub struct LoadedPlugin {
    pub manifest: PluginManifest,
    registration: RegistrationHandle,
}

/// Tracks which installed plugins are active.
pub struct PluginLoader {
    dir: PathBuf,
    host: PluginHost,
    entries: EntryPoints,
    loaded: Mutex<BTreeMap<String, LoadedPlugin>>,
}

impl PluginLoader {
    /// Creates a loader over `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, host: PluginHost, entries: EntryPoints) -> Self {
        Self {
            dir: dir.into(),
            host,
            entries,
            loaded: Mutex::new(BTreeMap::new()),
        }
    }

    /// Plugin directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads an installed plugin.
    ///
    /// A plugin that is already loaded is replaced: its previous bindings are
    /// disposed before the new registration runs.
    pub async fn load(&self, id: &str) -> Result<(), PluginError> {
        if !is_valid_plugin_id(id) {
            return Err(PluginError::InvalidId(id.to_owned()));
        }

        let source = match tokio::fs::read_to_string(plugin_path(&self.dir, id)).await {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PluginError::NotInstalled(id.to_owned()));
            }
            Err(e) => return Err(e.into()),
        };

        let manifest =
            PluginManifest::parse_for(&source, id).map_err(|e| PluginError::validation(id, e))?;
        let entry = self
            .entries
            .get(&manifest.entry_point)
            .ok_or_else(|| PluginError::UnknownEntryPoint {
                id: id.to_owned(),
                entry_point: manifest.entry_point.clone(),
            })?;

        if let Some(command) = self.host.reserved_collision(&manifest) {
            return Err(PluginError::registration(
                id,
                format!("command '{command}' is reserved by the userbot"),
            ));
        }

        let mut loaded = self.loaded.lock().await;
        if let Some(previous) = loaded.remove(id) {
            let removed = previous.registration.dispose().await;
            debug!("Reloading '{}', dropped {} previous binding(s)", id, removed);
        }

        let registration = entry.register(&self.host, &manifest).await?;
        info!(
            "Loaded plugin '{}' v{} ({} binding(s))",
            manifest.id,
            manifest.version,
            registration.len()
        );
        loaded.insert(
            id.to_owned(),
            LoadedPlugin {
                manifest,
                registration,
            },
        );
        Ok(())
    }

    /// Deactivates a plugin and removes its bindings.
    ///
    /// Returns `false` if it was not loaded.
    pub async fn unload(&self, id: &str) -> bool {
        let Some(plugin) = self.loaded.lock().await.remove(id) else {
            return false;
        };
        let removed = plugin.registration.dispose().await;
        info!("Unloaded plugin '{}' ({} binding(s) removed)", id, removed);
        true
    }

    /// Deletes an installed plugin, unloading it first.
    ///
    /// Returns `false` if it was not installed.
    pub async fn remove(&self, id: &str) -> Result<bool, PluginError> {
        if !is_valid_plugin_id(id) {
            return Err(PluginError::InvalidId(id.to_owned()));
        }

        match tokio::fs::remove_file(plugin_path(&self.dir, id)).await {
            Ok(()) => {
                self.unload(id).await;
                info!("Removed plugin '{}'", id);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads every installed plugin in id order, returning the success count.
    pub async fn load_all(&self) -> usize {
        let ids = match self.installed_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not list plugins: {}", e);
                return 0;
            }
        };

        let mut count = 0;
        for id in ids {
            match self.load(&id).await {
                Ok(()) => count += 1,
                Err(e) => warn!("Failed to load plugin '{}': {}", id, e),
            }
        }
        count
    }

    /// Ids of installed plugins, sorted. A missing directory means none.
    pub async fn installed_ids(&self) -> Result<Vec<String>, PluginError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if is_valid_plugin_id(stem) {
                        ids.push(stem.to_owned());
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Ids of loaded plugins, sorted.
    pub async fn loaded_ids(&self) -> Vec<String> {
        self.loaded.lock().await.keys().cloned().collect()
    }

    /// Manifests of loaded plugins, sorted by id.
    pub async fn loaded_manifests(&self) -> Vec<PluginManifest> {
        self.loaded
            .lock()
            .await
            .values()
            .map(|p| p.manifest.clone())
            .collect()
    }

    /// Whether a plugin is loaded.
    pub async fn is_loaded(&self, id: &str) -> bool {
        self.loaded.lock().await.contains_key(id)
    }
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("dir", &self.dir)
            .field("entries", &self.entries.names())
            .finish_non_exhaustive()
    }
}
