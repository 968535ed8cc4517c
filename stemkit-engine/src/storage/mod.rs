//! Remote object store collaborators
//!
//! Every operation fails soft: an unreachable or disabled store answers
//! `exists = false`, `ok = false` or an unsuccessful listing instead of
//! raising, so callers can degrade to local-only mode.

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use stemkit_common::EngineConfig;

pub mod directory;

pub use directory::DirectoryStore;

/// Result of an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    pub ok: bool,
    pub remote_path: String,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn success(remote_path: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            ok: true,
            remote_path: remote_path.into(),
            url: Some(url.into()),
            error: None,
        }
    }

    pub fn failure(remote_path: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            remote_path: remote_path.into(),
            url: None,
            error: Some(error.into()),
        }
    }
}

/// Result of a prefix listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub ok: bool,
    /// Full object paths, including the prefix
    pub objects: Vec<String>,
    pub error: Option<String>,
}

impl Listing {
    pub fn success(objects: Vec<String>) -> Self {
        Self {
            ok: true,
            objects,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            objects: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Remote object store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Store identifier for logs (e.g. "directory", "disabled")
    fn name(&self) -> &'static str;

    /// Whether the store is configured at all
    fn is_enabled(&self) -> bool {
        true
    }

    async fn exists(&self, remote_path: &str) -> bool;

    async fn upload(&self, local_path: &Path, remote_path: &str) -> UploadOutcome;

    async fn list(&self, prefix: &str) -> Listing;
}

/// Store used when no remote is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledStore;

#[async_trait]
impl RemoteStore for DisabledStore {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn exists(&self, _remote_path: &str) -> bool {
        false
    }

    async fn upload(&self, _local_path: &Path, remote_path: &str) -> UploadOutcome {
        UploadOutcome::failure(remote_path, "remote store disabled")
    }

    async fn list(&self, _prefix: &str) -> Listing {
        Listing::failure("remote store disabled")
    }
}

/// Store selected by configuration: a directory bucket when
/// `remote_root` is set, local-only otherwise
pub fn from_config(config: &EngineConfig) -> Arc<dyn RemoteStore> {
    match &config.remote_root {
        Some(root) => Arc::new(DirectoryStore::new(root)),
        None => Arc::new(DisabledStore),
    }
}

/// Join path segments into an object path without duplicate slashes
pub fn object_path(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_store_fails_soft() {
        let store = DisabledStore;
        assert!(!store.is_enabled());
        assert!(!store.exists("stems/name/name.alice.wav").await);

        let outcome = store.upload(Path::new("/tmp/x.wav"), "stems/x.wav").await;
        assert!(!outcome.ok);
        assert!(outcome.url.is_none());

        let listing = store.list("stems/").await;
        assert!(!listing.ok);
        assert!(listing.objects.is_empty());
    }

    #[test]
    fn test_object_path() {
        assert_eq!(object_path(&["stems/", "/name/", "name.a.wav"]), "stems/name/name.a.wav");
        assert_eq!(object_path(&["", "name"]), "name");
    }
}
