//! Directory-backed remote store
//!
//! A local (or mounted) directory acting as the bucket: the object path is
//! the path relative to the root, and URLs are `file://` URLs.

use super::{Listing, RemoteStore, UploadOutcome};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, remote_path: &str) -> Option<PathBuf> {
        let relative = remote_path.trim_start_matches('/');
        // Refuse paths that would escape the bucket
        if relative.split('/').any(|part| part == "..") {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl RemoteStore for DirectoryStore {
    fn name(&self) -> &'static str {
        "directory"
    }

    async fn exists(&self, remote_path: &str) -> bool {
        let Some(path) = self.resolve(remote_path) else {
            return false;
        };
        tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> UploadOutcome {
        let Some(target) = self.resolve(remote_path) else {
            return UploadOutcome::failure(remote_path, "object path escapes the store root");
        };

        if let Some(parent) = target.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(remote_path, error = %e, "Upload failed");
                return UploadOutcome::failure(remote_path, e.to_string());
            }
        }

        match tokio::fs::copy(local_path, &target).await {
            Ok(bytes) => {
                info!(remote_path, bytes, "Uploaded stem");
                UploadOutcome::success(remote_path, format!("file://{}", target.display()))
            }
            Err(e) => {
                warn!(local = %local_path.display(), remote_path, error = %e, "Upload failed");
                UploadOutcome::failure(remote_path, e.to_string())
            }
        }
    }

    async fn list(&self, prefix: &str) -> Listing {
        let root = self.root.clone();
        let prefix = prefix.trim_matches('/').to_string();

        let scan = tokio::task::spawn_blocking(move || {
            scan_relative(&root, Path::new(&prefix))
                .into_iter()
                .map(|relative| super::object_path(&[&prefix, &relative]))
                .collect::<Vec<_>>()
        })
        .await;

        match scan {
            Ok(objects) => {
                debug!(count = objects.len(), "Listed directory store");
                Listing::success(objects)
            }
            Err(e) => Listing::failure(format!("listing task failed: {}", e)),
        }
    }
}

/// Files under `root/subdir`, as `/`-separated paths relative to `root/subdir`
///
/// A missing directory yields an empty list; unreadable entries are skipped.
pub fn scan_relative(root: &Path, subdir: &Path) -> Vec<String> {
    let base = root.join(subdir);
    if !base.is_dir() {
        return Vec::new();
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&base).follow_links(false) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if let Ok(relative) = entry.path().strip_prefix(&base) {
                    let parts: Vec<_> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    files.push(parts.join("/"));
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Error accessing entry: {}", e),
        }
    }
    files.sort();
    files
}
