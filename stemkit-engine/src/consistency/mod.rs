//! Local/remote consistency and repair
//!
//! Compares the local stem directory with the remote store per category
//! and repairs individual labels: regenerate the local file when it is
//! missing, then upload it. Comparison and repair never raise for a single
//! label; they report per-label status instead.

use crate::cache::StemCache;
use crate::retry::with_timeout;
use crate::storage::directory::scan_relative;
use crate::storage::{object_path, Listing, RemoteStore};
use crate::synthesis::{StemGenerator, StemOrigin};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stemkit_common::{StemCategory, StemLabel};
use tracing::{debug, info, warn};

/// Four-way local/remote partition of one category
///
/// Entries are stem paths relative to the category directory
/// (`name.alice.wav`); `missing` holds labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyRecord {
    pub category: String,
    pub matches: Vec<String>,
    pub local_only: Vec<String>,
    pub remote_only: Vec<String>,
    pub missing: Vec<String>,
    pub local_count: usize,
    pub remote_count: usize,
    /// False when the remote listing failed or the store is disabled
    pub remote_ok: bool,
}

/// Status of a single label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStatus {
    Match,
    LocalOnly,
    RemoteOnly,
    Missing,
}

/// All categories at once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencySummary {
    pub remote_enabled: bool,
    pub categories: BTreeMap<StemCategory, ConsistencyRecord>,
}

/// Result of repairing one label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairOutcome {
    pub ok: bool,
    pub label: String,
    /// Local file present before repair
    pub local_exists: bool,
    /// Remote object present before repair
    pub remote_exists: bool,
    /// Local file was regenerated
    pub repaired: bool,
    pub uploaded: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairSummary {
    pub total: usize,
    pub total_missing: usize,
    pub repaired: usize,
    pub uploaded: usize,
    pub failed: usize,
}

/// Per-label outcomes plus their aggregate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub results: Vec<RepairOutcome>,
    pub summary: RepairSummary,
}

/// Consistency and repair engine
pub struct ConsistencyEngine {
    cache: Arc<StemCache>,
    store: Arc<dyn RemoteStore>,
    generator: Option<Arc<StemGenerator>>,
    prefix: String,
    timeout: Duration,
    workers: usize,
}

impl ConsistencyEngine {
    pub fn new(cache: Arc<StemCache>, store: Arc<dyn RemoteStore>) -> Self {
        Self {
            cache,
            store,
            generator: None,
            prefix: "stems".to_string(),
            timeout: Duration::from_secs(30),
            workers: 4,
        }
    }

    /// Enable regeneration of missing local stems
    pub fn with_generator(mut self, generator: Arc<StemGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    fn category_prefix(&self, category: StemCategory) -> String {
        object_path(&[&self.prefix, category.as_str()])
    }

    /// Partition one category into matches / local-only / remote-only
    ///
    /// `reference` items (free text or labels) absent on both sides are
    /// reported as `missing`.
    pub async fn compare_category(&self, category: StemCategory, reference: &[String]) -> ConsistencyRecord {
        let (local, remote) = tokio::join!(self.local_files(category), self.remote_files(category));
        let remote_ok = remote.ok;
        let remote: BTreeSet<String> = remote.objects.into_iter().collect();

        let mut record = ConsistencyRecord {
            category: category.to_string(),
            local_count: local.len(),
            remote_count: remote.len(),
            remote_ok,
            ..ConsistencyRecord::default()
        };

        record.matches = local.intersection(&remote).cloned().collect();
        record.local_only = local.difference(&remote).cloned().collect();
        record.remote_only = remote.difference(&local).cloned().collect();

        let missing: BTreeSet<String> = reference
            .iter()
            .filter(|item| !item.trim().is_empty())
            .map(|item| reference_label(category, item))
            .filter(|label| {
                let file = label.file_name();
                !local.contains(&file) && !remote.contains(&file)
            })
            .map(|label| label.to_string())
            .collect();
        record.missing = missing.into_iter().collect();

        debug!(
            category = %category,
            matches = record.matches.len(),
            local_only = record.local_only.len(),
            remote_only = record.remote_only.len(),
            missing = record.missing.len(),
            "Compared category"
        );
        record
    }

    /// Compare every category concurrently
    pub async fn summarize_all(&self) -> ConsistencySummary {
        let records = join_all(
            StemCategory::ALL
                .iter()
                .map(|&category| async move { (category, self.compare_category(category, &[]).await) }),
        )
        .await;

        ConsistencySummary {
            remote_enabled: self.store.is_enabled(),
            categories: records.into_iter().collect(),
        }
    }

    /// Where `label` currently exists
    pub async fn compare_label(&self, label: &StemLabel) -> LabelStatus {
        let local = local_file_ok(&self.cache.stem_path(label)).await;
        let remote = self.remote_exists(label).await;
        match (local, remote) {
            (true, true) => LabelStatus::Match,
            (true, false) => LabelStatus::LocalOnly,
            (false, true) => LabelStatus::RemoteOnly,
            (false, false) => LabelStatus::Missing,
        }
    }

    /// Make `label` present locally and remotely, best effort
    pub async fn repair(&self, label: &StemLabel) -> RepairOutcome {
        let local_path = self.cache.stem_path(label);
        let local_exists = local_file_ok(&local_path).await;
        let remote_exists = self.remote_exists(label).await;

        let mut outcome = RepairOutcome {
            ok: false,
            label: label.to_string(),
            local_exists,
            remote_exists,
            repaired: false,
            uploaded: false,
            error: None,
        };

        if !local_exists {
            let Some(generator) = &self.generator else {
                outcome.error = Some("local stem missing and no synthesis provider configured".to_string());
                warn!(label = %label, "Cannot regenerate stem without a provider");
                return outcome;
            };
            if let Err(e) = generator
                .synthesize(label, &label.spoken_text(), &StemOrigin::default())
                .await
            {
                warn!(label = %label, error = %e, "Stem regeneration failed");
                outcome.error = Some(e.to_string());
                return outcome;
            }
            outcome.repaired = true;
        }

        if !local_file_ok(&local_path).await {
            outcome.error = Some(format!("{} missing or empty after repair", local_path.display()));
            warn!(label = %label, "Local stem did not materialize");
            return outcome;
        }

        if !self.store.is_enabled() {
            // Local-only mode: nothing to upload to
            outcome.ok = true;
            return outcome;
        }

        if remote_exists && !outcome.repaired {
            outcome.ok = true;
            return outcome;
        }

        let remote_path = label.object_path(&self.prefix);
        let upload = with_timeout(self.timeout, "upload", async {
            Ok::<_, crate::Error>(self.store.upload(&local_path, &remote_path).await)
        })
        .await;
        match upload {
            Ok(result) if result.ok => {
                outcome.uploaded = true;
                outcome.ok = true;
            }
            Ok(result) => {
                outcome.error = result.error.or_else(|| Some("upload failed".to_string()));
            }
            Err(e) => {
                outcome.error = Some(crate::Error::StorageUnavailable(e.to_string()).to_string());
            }
        }

        info!(
            label = %label,
            repaired = outcome.repaired,
            uploaded = outcome.uploaded,
            ok = outcome.ok,
            "Repair finished"
        );
        outcome
    }

    /// Repair each label independently over the worker pool
    pub async fn verify_and_repair(&self, labels: &[StemLabel]) -> RepairReport {
        let mut indexed: Vec<(usize, RepairOutcome)> = stream::iter(labels.iter().enumerate())
            .map(|(i, label)| async move { (i, self.repair(label).await) })
            .buffer_unordered(self.workers)
            .collect()
            .await;
        indexed.sort_by_key(|(i, _)| *i);
        let results: Vec<RepairOutcome> = indexed.into_iter().map(|(_, r)| r).collect();

        let summary = RepairSummary {
            total: results.len(),
            total_missing: results
                .iter()
                .filter(|r| !r.local_exists || !r.remote_exists)
                .count(),
            repaired: results.iter().filter(|r| r.repaired).count(),
            uploaded: results.iter().filter(|r| r.uploaded).count(),
            failed: results.iter().filter(|r| !r.ok).count(),
        };

        info!(
            total = summary.total,
            total_missing = summary.total_missing,
            repaired = summary.repaired,
            failed = summary.failed,
            "Verify and repair finished"
        );
        RepairReport { results, summary }
    }

    /// Compare a category, then repair every inconsistent or missing label
    pub async fn repair_category(&self, category: StemCategory, reference: &[String]) -> RepairReport {
        let record = self.compare_category(category, reference).await;

        let mut labels = BTreeSet::new();
        for file in record.local_only.iter().chain(&record.remote_only) {
            let name = file.rsplit('/').next().unwrap_or(file);
            match StemLabel::parse_file_name(name) {
                Some(label) if label.category() == category => {
                    labels.insert(label);
                }
                _ => debug!(file = %file, "Skipping non-stem file"),
            }
        }
        for raw in &record.missing {
            if let Ok(label) = StemLabel::parse(raw) {
                labels.insert(label);
            }
        }

        let labels: Vec<StemLabel> = labels.into_iter().collect();
        self.verify_and_repair(&labels).await
    }

    async fn local_files(&self, category: StemCategory) -> BTreeSet<String> {
        let root = self.cache.stems_dir().to_path_buf();
        tokio::task::spawn_blocking(move || {
            scan_relative(&root, Path::new(category.as_str()))
                .into_iter()
                .filter(|f| f.ends_with(".wav"))
                .collect::<BTreeSet<String>>()
        })
        .await
        .unwrap_or_else(|e| {
            warn!(category = %category, error = %e, "Local scan failed");
            BTreeSet::new()
        })
    }

    async fn remote_files(&self, category: StemCategory) -> Listing {
        if !self.store.is_enabled() {
            return Listing::failure("remote store disabled");
        }

        let prefix = self.category_prefix(category);
        let listing = with_timeout(self.timeout, "list", async { Ok::<_, crate::Error>(self.store.list(&prefix).await) })
            .await
            .unwrap_or_else(|e| Listing::failure(e.to_string()));
        if !listing.ok {
            warn!(
                category = %category,
                store = self.store.name(),
                error = listing.error.as_deref().unwrap_or(""),
                "Remote listing failed, comparing against local only"
            );
            return listing;
        }

        let strip = format!("{}/", prefix);
        let objects = listing
            .objects
            .into_iter()
            .filter_map(|object| object.strip_prefix(&strip).map(str::to_string))
            .filter(|relative| relative.ends_with(".wav"))
            .collect();
        Listing::success(objects)
    }

    async fn remote_exists(&self, label: &StemLabel) -> bool {
        if !self.store.is_enabled() {
            return false;
        }
        let remote_path = label.object_path(&self.prefix);
        with_timeout(self.timeout, "exists", async { Ok::<_, crate::Error>(self.store.exists(&remote_path).await) })
            .await
            .unwrap_or_else(|e| {
                warn!(label = %label, error = %e, "Remote existence check failed");
                false
            })
    }
}

/// Label for a reference dataset item (free text or an explicit label)
fn reference_label(category: StemCategory, item: &str) -> StemLabel {
    match StemLabel::parse(item) {
        Ok(label) if label.category() == category => label,
        _ => StemLabel::new(category, item),
    }
}

/// Local stem present and non-empty
async fn local_file_ok(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
