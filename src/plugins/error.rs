//! Plugin lifecycle errors.

use thiserror::Error;

use super::manifest::ManifestError;

/// Errors raised while installing, loading or removing plugins.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid plugin id '{0}'")]
    InvalidId(String),

    #[error("plugin '{0}' is not in the catalog")]
    NotInCatalog(String),

    #[error("plugin '{0}' is not installed")]
    NotInstalled(String),

    #[error("failed to fetch plugin '{id}': {reason}")]
    Fetch { id: String, reason: String },

    #[error("plugin '{id}' failed validation: {source}")]
    Validation {
        id: String,
        #[source]
        source: ManifestError,
    },

    #[error("plugin storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("plugin '{id}' uses unknown entry point '{entry_point}'")]
    UnknownEntryPoint { id: String, entry_point: String },

    #[error("plugin '{id}' failed to register: {reason}")]
    Registration { id: String, reason: String },
}

impl PluginError {
    pub(crate) fn fetch(id: &str, reason: impl Into<String>) -> Self {
        Self::Fetch {
            id: id.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(id: &str, source: ManifestError) -> Self {
        Self::Validation {
            id: id.to_owned(),
            source,
        }
    }

    pub(crate) fn registration(id: &str, reason: impl Into<String>) -> Self {
        Self::Registration {
            id: id.to_owned(),
            reason: reason.into(),
        }
    }

    /// Short text safe to show in a chat. Never contains filesystem paths.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Io(_) => "plugin storage error".to_owned(),
            Self::Fetch { id, .. } => format!("could not download plugin '{id}'"),
            other => other.to_string(),
        }
    }
}

/// Describes a reqwest failure without echoing the request URL.
pub(crate) fn describe_http_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_owned()
    } else if let Some(status) = err.status() {
        format!("server answered {status}")
    } else if err.is_connect() {
        "connection failed".to_owned()
    } else {
        "network error".to_owned()
    }
}
