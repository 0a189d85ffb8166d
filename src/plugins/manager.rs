//! Single handle over catalog, installer and loader.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::catalog::{PluginCatalog, PluginDescriptor};
use super::error::PluginError;
use super::installer::PluginInstaller;
use super::loader::PluginLoader;

/// Catalog entry or installed plugin, with its current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginStatus {
    pub id: String,
    pub name: String,
    pub description: String,
    pub in_catalog: bool,
    pub installed: bool,
    pub loaded: bool,
}

/// Plugin lifecycle operations used by the management commands.
#[derive(Debug)]
pub struct PluginManager {
    catalog: Arc<PluginCatalog>,
    installer: PluginInstaller,
    loader: PluginLoader,
}

impl PluginManager {
    /// Creates a manager.
    #[must_use]
    pub fn new(catalog: Arc<PluginCatalog>, installer: PluginInstaller, loader: PluginLoader) -> Self {
        Self {
            catalog,
            installer,
            loader,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    /// Installs a catalog plugin and loads it.
    ///
    /// The file stays installed if loading fails.
    pub async fn install(&self, id: &str) -> Result<&PluginDescriptor, PluginError> {
        self.installer.install_from_remote(id).await?;
        self.loader.load(id).await?;
        self.catalog
            .get(id)
            .ok_or_else(|| PluginError::NotInCatalog(id.to_owned()))
    }

    /// Installs a plugin from a local file and loads it.
    pub async fn install_local(&self, source: &Path, id: &str) -> Result<(), PluginError> {
        self.installer.install_from_local(source, id).await?;
        self.loader.load(id).await
    }

    /// Loads (or reloads) an installed plugin.
    pub async fn load(&self, id: &str) -> Result<(), PluginError> {
        self.loader.load(id).await
    }

    /// Unloads a plugin. Returns `false` if it was not loaded.
    pub async fn unload(&self, id: &str) -> bool {
        self.loader.unload(id).await
    }

    /// Deletes an installed plugin. Returns `false` if it was not installed.
    pub async fn uninstall(&self, id: &str) -> Result<bool, PluginError> {
        self.loader.remove(id).await
    }

    /// Loads every installed plugin, returning how many succeeded.
    pub async fn load_all(&self) -> usize {
        let count = self.loader.load_all().await;
        info!("Loaded {} plugin(s) from {}", count, self.loader.dir().display());
        count
    }

    /// Catalog entries followed by installed plugins outside the catalog.
    pub async fn overview(&self) -> Result<Vec<PluginStatus>, PluginError> {
        let installed = self.loader.installed_ids().await?;
        let loaded = self.loader.loaded_manifests().await;
        let is_loaded = |id: &str| loaded.iter().any(|m| m.id == id);

        let mut statuses: Vec<PluginStatus> = self
            .catalog
            .list_all()
            .iter()
            .map(|d| PluginStatus {
                id: d.id.clone(),
                name: d.name.clone(),
                description: d.description.clone(),
                in_catalog: true,
                installed: installed.contains(&d.id),
                loaded: is_loaded(&d.id),
            })
            .collect();

        for id in installed.iter().filter(|id| self.catalog.get(id).is_none()) {
            let manifest = loaded.iter().find(|m| &m.id == id);
            statuses.push(PluginStatus {
                id: id.clone(),
                name: manifest.map_or_else(|| id.clone(), |m| m.name.clone()),
                description: manifest.map(|m| m.description.clone()).unwrap_or_default(),
                in_catalog: false,
                installed: true,
                loaded: manifest.is_some(),
            });
        }
        Ok(statuses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{PluginHost, bundled};
    use crate::telegram::RouteTable;

    const GREETER: &str = r#"{"id":"greeter","name":"Greeter","version":"1.0","entry_point":"template","commands":["hello"],"replies":{"hello":"hi"}}"#;
    const QRCODE: &str = r#"{"id":"qrcode","name":"QR Code","version":"1.0.0","entry_point":"qrcode","commands":["qr"]}"#;

    fn manager(plugins: &Path, sources: &Path) -> (PluginManager, Arc<RouteTable>) {
        let catalog = Arc::new(PluginCatalog::builtin(&sources.to_string_lossy()));
        let http = reqwest::Client::new();
        let routes = Arc::new(RouteTable::new());
        let host = PluginHost::new(Arc::clone(&routes), http.clone(), ".");
        let installer = PluginInstaller::new(plugins, Arc::clone(&catalog), http);
        let loader = PluginLoader::new(plugins, host, bundled::entry_points());
        (PluginManager::new(catalog, installer, loader), routes)
    }

    #[tokio::test]
    async fn test_install_loads_plugin() {
        let plugins = tempfile::tempdir().unwrap();
        let sources = tempfile::tempdir().unwrap();
        std::fs::write(sources.path().join("qrcode.json"), QRCODE).unwrap();
        let (manager, routes) = manager(plugins.path(), sources.path());

        let descriptor = manager.install("qrcode").await.unwrap();
        assert_eq!(descriptor.name, "QR Code");
        assert!(manager.loader().is_loaded("qrcode").await);
        assert_eq!(
            routes.bound_commands().await,
            [("qrcode".to_owned(), "qr".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_install_unknown_plugin() {
        let plugins = tempfile::tempdir().unwrap();
        let sources = tempfile::tempdir().unwrap();
        let (manager, _) = manager(plugins.path(), sources.path());

        let err = manager.install("weather").await.unwrap_err();
        assert!(matches!(err, PluginError::NotInCatalog(_)));
        assert!(std::fs::read_dir(plugins.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_overview() {
        let plugins = tempfile::tempdir().unwrap();
        let sources = tempfile::tempdir().unwrap();
        let local = sources.path().join("greeter.json");
        std::fs::write(&local, GREETER).unwrap();
        let (manager, _) = manager(plugins.path(), sources.path());

        manager.install_local(&local, "greeter").await.unwrap();
        let overview = manager.overview().await.unwrap();

        assert_eq!(overview.len(), 6);
        assert!(overview[..5].iter().all(|s| s.in_catalog && !s.installed));
        let greeter = &overview[5];
        assert_eq!(greeter.name, "Greeter");
        assert!(greeter.installed && greeter.loaded && !greeter.in_catalog);

        assert!(manager.uninstall("greeter").await.unwrap());
        assert_eq!(manager.overview().await.unwrap().len(), 5);
    }
}
