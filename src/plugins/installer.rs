//! Fetches, validates and persists plugin files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::catalog::{PluginCatalog, SourceLocator};
use super::error::{PluginError, describe_http_error};
use super::manifest::{PluginManifest, is_valid_plugin_id};

/// Writes plugin files into the plugin directory.
///
/// Nothing is written unless the source parses as a valid manifest for the
/// requested id.
#[derive(Debug, Clone)]
pub struct PluginInstaller {
    dir: PathBuf,
    catalog: Arc<PluginCatalog>,
    http: reqwest::Client,
}

impl PluginInstaller {
    /// Creates an installer writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, catalog: Arc<PluginCatalog>, http: reqwest::Client) -> Self {
        Self {
            dir: dir.into(),
            catalog,
            http,
        }
    }

    /// Path of the installed file for `id`.
    #[must_use]
    pub fn plugin_path(&self, id: &str) -> PathBuf {
        plugin_path(&self.dir, id)
    }

    /// Installs a catalog plugin from its source.
    ///
    /// A single fetch attempt is made. Any non-2xx answer is a failure.
    pub async fn install_from_remote(&self, id: &str) -> Result<PathBuf, PluginError> {
        let descriptor = self
            .catalog
            .get(id)
            .ok_or_else(|| PluginError::NotInCatalog(id.to_owned()))?;

        let bytes = match descriptor.locator() {
            SourceLocator::Remote(url) => self.fetch(id, url).await?,
            SourceLocator::Local(path) => tokio::fs::read(path)
                .await
                .map_err(|e| PluginError::fetch(id, e.kind().to_string()))?,
        };

        validate_source(id, &bytes)?;
        let path = self.persist(id, &bytes).await?;
        info!("Installed plugin '{}' from catalog", id);
        Ok(path)
    }

    /// Installs a plugin from a local file.
    ///
    /// The installed file is a byte-for-byte copy of `source`.
    pub async fn install_from_local(&self, source: &Path, id: &str) -> Result<PathBuf, PluginError> {
        if !is_valid_plugin_id(id) {
            return Err(PluginError::InvalidId(id.to_owned()));
        }

        let bytes = match tokio::fs::read(source).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PluginError::fetch(id, "source file not found"));
            }
            Err(e) => return Err(e.into()),
        };

        validate_source(id, &bytes)?;
        let path = self.persist(id, &bytes).await?;
        info!("Installed plugin '{}' from local file", id);
        Ok(path)
    }

    /// Downloads the raw body. No charset decoding is applied.
    async fn fetch(&self, id: &str, url: &str) -> Result<Vec<u8>, PluginError> {
        debug!("Fetching plugin '{}' from {}", id, url);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                warn!("Download of plugin '{}' failed: {}", id, e);
                PluginError::fetch(id, describe_http_error(&e))
            })?;

        let body = response
            .bytes()
            .await
            .map_err(|e| PluginError::fetch(id, describe_http_error(&e)))?;
        Ok(body.to_vec())
    }

    async fn persist(&self, id: &str, bytes: &[u8]) -> Result<PathBuf, PluginError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.plugin_path(id);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

/// Checks that `bytes` are a UTF-8 manifest for `id`.
fn validate_source(id: &str, bytes: &[u8]) -> Result<(), PluginError> {
    let text = std::str::from_utf8(bytes).map_err(|_| PluginError::fetch(id, "source is not UTF-8"))?;
    PluginManifest::parse_for(text, id).map_err(|e| PluginError::validation(id, e))?;
    Ok(())
}

/// `<dir>/<id>.json`
#[must_use]
pub fn plugin_path(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::catalog::PluginDescriptor;

    const GREETER: &str = r#"{"id":"greeter","name":"Greeter","version":"1.0","entry_point":"template","commands":["hello"],"replies":{"hello":"hi"}}"#;

    fn installer(dir: &Path, catalog: PluginCatalog) -> PluginInstaller {
        PluginInstaller::new(dir, Arc::new(catalog), reqwest::Client::new())
    }

    fn local_catalog(id: &str, source: &Path) -> PluginCatalog {
        PluginCatalog::new(vec![PluginDescriptor {
            id: id.to_owned(),
            name: id.to_owned(),
            description: String::new(),
            source: source.to_string_lossy().into_owned(),
            commands: vec!["hello".to_owned()],
            dependencies: Vec::new(),
        }])
    }

    #[tokio::test]
    async fn test_local_install_copies_bytes() {
        let src_dir = tempfile::tempdir().unwrap();
        let plugins = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("greeter.json");
        std::fs::write(&source, GREETER).unwrap();

        let path = installer(plugins.path(), PluginCatalog::default())
            .install_from_local(&source, "greeter")
            .await
            .unwrap();

        assert_eq!(path, plugins.path().join("greeter.json"));
        assert_eq!(std::fs::read(&path).unwrap(), GREETER.as_bytes());
    }

    #[tokio::test]
    async fn test_local_install_overwrites() {
        let src_dir = tempfile::tempdir().unwrap();
        let plugins = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("greeter.json");
        std::fs::write(&source, GREETER).unwrap();
        std::fs::write(plugins.path().join("greeter.json"), "old").unwrap();

        installer(plugins.path(), PluginCatalog::default())
            .install_from_local(&source, "greeter")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(plugins.path().join("greeter.json")).unwrap(),
            GREETER
        );
    }

    #[tokio::test]
    async fn test_local_install_missing_file() {
        let plugins = tempfile::tempdir().unwrap();
        let err = installer(plugins.path(), PluginCatalog::default())
            .install_from_local(Path::new("/nonexistent/greeter.json"), "greeter")
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::Fetch { .. }));
        assert!(!plugins.path().join("greeter.json").exists());
    }

    #[tokio::test]
    async fn test_invalid_source_writes_nothing() {
        let src_dir = tempfile::tempdir().unwrap();
        let plugins = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("bad.py");
        std::fs::write(&source, "def register_plugin(client):\n    async def x(): pass").unwrap();

        let err = installer(plugins.path(), PluginCatalog::default())
            .install_from_local(&source, "bad")
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::Validation { .. }));
        assert!(!plugins.path().join("bad.json").exists());
    }

    #[tokio::test]
    async fn test_local_install_rejects_bad_id() {
        let plugins = tempfile::tempdir().unwrap();
        let err = installer(plugins.path(), PluginCatalog::default())
            .install_from_local(Path::new("x.json"), "../escape")
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidId(_)));
    }

    #[tokio::test]
    async fn test_remote_install_unknown_id() {
        let plugins = tempfile::tempdir().unwrap();
        let err = installer(plugins.path(), PluginCatalog::builtin("https://example.invalid"))
            .install_from_remote("weather")
            .await
            .unwrap_err();

        assert!(matches!(err, PluginError::NotInCatalog(ref id) if id == "weather"));
        assert_eq!(std::fs::read_dir(plugins.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_catalog_install_from_local_source() {
        let src_dir = tempfile::tempdir().unwrap();
        let plugins = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("greeter.json");
        std::fs::write(&source, GREETER).unwrap();

        let path = installer(plugins.path(), local_catalog("greeter", &source))
            .install_from_remote("greeter")
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), GREETER);
    }

    #[tokio::test]
    async fn test_catalog_install_rejects_mismatched_manifest() {
        let src_dir = tempfile::tempdir().unwrap();
        let plugins = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("other.json");
        std::fs::write(&source, GREETER).unwrap();

        let err = installer(plugins.path(), local_catalog("other", &source))
            .install_from_remote("other")
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Validation { .. }));
        assert!(!plugins.path().join("other.json").exists());
    }

    /// Serves one HTTP response on a local port and returns its URL.
    async fn serve_once(content_type: &'static str, body: &'static [u8]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
        });
        format!("http://{addr}/greeter.json")
    }

    fn remote_installer(dir: &Path, id: &str, url: &str) -> PluginInstaller {
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        PluginInstaller::new(dir, Arc::new(remote_catalog(id, url)), http)
    }

    fn remote_catalog(id: &str, url: &str) -> PluginCatalog {
        PluginCatalog::new(vec![PluginDescriptor {
            id: id.to_owned(),
            name: id.to_owned(),
            description: String::new(),
            source: url.to_owned(),
            commands: vec!["hello".to_owned()],
            dependencies: Vec::new(),
        }])
    }

    #[tokio::test]
    async fn test_remote_install_keeps_fetched_bytes() {
        const ACCENTED: &str = r#"{"id":"greeter","name":"Greeter","version":"1.0","entry_point":"template","commands":["hello"],"replies":{"hello":"¡hola, café!"}}"#;
        let plugins = tempfile::tempdir().unwrap();
        let url = serve_once("application/json; charset=iso-8859-1", ACCENTED.as_bytes()).await;

        let path = remote_installer(plugins.path(), "greeter", &url)
            .install_from_remote("greeter")
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), ACCENTED.as_bytes());
    }

    #[tokio::test]
    async fn test_remote_install_rejects_non_utf8() {
        let plugins = tempfile::tempdir().unwrap();
        let url = serve_once("application/json", b"{\"id\":\"greeter\",\"name\":\"\xff\"}").await;

        let err = remote_installer(plugins.path(), "greeter", &url)
            .install_from_remote("greeter")
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::Fetch { .. }));
        assert!(!plugins.path().join("greeter.json").exists());
    }
}
