//! Contract-aware stem cache
//!
//! Decides whether a stem can be reused or must be synthesized again. A
//! cached stem is served only while its file exists, it is younger than the
//! TTL, and its contract signature matches the current synthesis contract.
//! Entries without a signature predate signatures and are served as-is.
//!
//! All index access goes through one async mutex around load-modify-save,
//! so concurrent registrations never lose updates.

use super::index::{CacheIndex, StemEntry};
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use stemkit_common::time::{age_days, now};
use stemkit_common::{EngineConfig, ResolvedPaths, StemLabel, SynthesisContract};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A cache hit
#[derive(Debug, Clone, PartialEq)]
pub struct CachedStem {
    pub label: StemLabel,
    pub entry: StemEntry,
}

impl CachedStem {
    pub fn path(&self) -> &Path {
        &self.entry.path
    }
}

/// Why a lookup missed; only ever logged
#[derive(Debug, Clone, PartialEq)]
enum MissReason {
    NotIndexed,
    MalformedEntry(String),
    FileMissing(PathBuf),
    Expired { age_days: i64 },
    ContractChanged { stored: String, current: String },
}

/// Registration request
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub label: &'a StemLabel,
    pub text: &'a str,
    pub path: &'a Path,
    /// Defaults to the contract voice
    pub voice_id: Option<&'a str>,
    /// Defaults to the contract model
    pub model_id: Option<&'a str>,
    pub rotational: bool,
    pub dataset_origin: Option<&'a str>,
}

impl<'a> Registration<'a> {
    pub fn new(label: &'a StemLabel, text: &'a str, path: &'a Path) -> Self {
        Self {
            label,
            text,
            path,
            voice_id: None,
            model_id: None,
            rotational: false,
            dataset_origin: None,
        }
    }

    pub fn rotational(mut self, dataset_origin: Option<&'a str>) -> Self {
        self.rotational = true;
        self.dataset_origin = dataset_origin;
        self
    }
}

/// Signature compatibility counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignatureCounts {
    pub compatible: usize,
    pub legacy: usize,
    pub incompatible: usize,
}

/// Aggregate view of the cache
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheSummary {
    pub total: usize,
    pub rotational: usize,
    pub by_origin: BTreeMap<String, usize>,
    pub expired: usize,
    pub missing_files: usize,
    pub malformed: usize,
    pub signatures: SignatureCounts,
    pub total_bytes: u64,
    pub ttl_days: i64,
    pub contract: SynthesisContract,
}

/// Stem cache over a JSON index file
pub struct StemCache {
    index_file: PathBuf,
    stems_dir: PathBuf,
    ttl_days: i64,
    contract: SynthesisContract,
    lock: Mutex<()>,
}

impl StemCache {
    pub fn new(
        index_file: impl Into<PathBuf>,
        stems_dir: impl Into<PathBuf>,
        ttl_days: i64,
        contract: SynthesisContract,
    ) -> Self {
        Self {
            index_file: index_file.into(),
            stems_dir: stems_dir.into(),
            ttl_days,
            contract,
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &EngineConfig, paths: &ResolvedPaths) -> Self {
        Self::new(
            &paths.index_file,
            &paths.stems_dir,
            config.cache_ttl_days,
            config.contract.clone(),
        )
    }

    pub fn contract(&self) -> &SynthesisContract {
        &self.contract
    }

    pub fn stems_dir(&self) -> &Path {
        &self.stems_dir
    }

    pub fn index_file(&self) -> &Path {
        &self.index_file
    }

    pub fn ttl_days(&self) -> i64 {
        self.ttl_days
    }

    /// Canonical local path for `label`
    pub fn stem_path(&self, label: &StemLabel) -> PathBuf {
        self.stems_dir.join(label.relative_path())
    }

    /// Look up a reusable stem; every failed check is a miss
    pub async fn get(&self, label: &StemLabel) -> Option<CachedStem> {
        let _guard = self.lock.lock().await;
        let index = CacheIndex::load(&self.index_file).await;

        match self.check(&index, label).await {
            Ok(entry) => {
                debug!(label = %label, "Cache hit");
                Some(CachedStem {
                    label: label.clone(),
                    entry,
                })
            }
            Err(reason) => {
                debug!(label = %label, reason = ?reason, "Cache miss");
                None
            }
        }
    }

    async fn check(&self, index: &CacheIndex, label: &StemLabel) -> std::result::Result<StemEntry, MissReason> {
        let entry = match index.entry(&label.to_string()) {
            None => return Err(MissReason::NotIndexed),
            Some(Err(e)) => return Err(MissReason::MalformedEntry(e.to_string())),
            Some(Ok(entry)) => entry,
        };

        if !file_exists(&entry.path).await {
            return Err(MissReason::FileMissing(entry.path));
        }

        // Unknown creation time counts as fresh
        let age = entry.created.map(|created| age_days(created, now())).unwrap_or(0);
        if age > self.ttl_days {
            return Err(MissReason::Expired { age_days: age });
        }

        if let Some(stored) = &entry.contract_signature {
            let current = self.contract.signature_for(&entry.text);
            if *stored != current {
                return Err(MissReason::ContractChanged {
                    stored: stored.clone(),
                    current,
                });
            }
        }

        Ok(entry)
    }

    /// Record a stem under the current contract and persist the index
    ///
    /// Returns the stored entry with its bumped version.
    pub async fn register(&self, registration: Registration<'_>) -> Result<StemEntry> {
        let _guard = self.lock.lock().await;
        let mut index = CacheIndex::load(&self.index_file).await;
        let key = registration.label.to_string();

        let voice_id = registration.voice_id.unwrap_or(&self.contract.voice_id);
        let model_id = registration.model_id.unwrap_or(&self.contract.model_id);
        let signature = stemkit_common::contract_signature(&stemkit_common::SignatureInput {
            voice_id,
            model_id,
            ..self.contract.signature_input(registration.text)
        });

        let entry = StemEntry {
            text: registration.text.to_string(),
            path: registration.path.to_path_buf(),
            voice_id: voice_id.to_string(),
            model_id: model_id.to_string(),
            sample_rate: Some(self.contract.sample_rate),
            encoding: Some(self.contract.encoding.clone()),
            provider_version: Some(self.contract.provider_version.clone()),
            contract_signature: Some(signature),
            rotational: registration.rotational,
            dataset_origin: registration.dataset_origin.map(str::to_string),
            version: index.version_of(&key) + 1,
            created: Some(now()),
        };

        index.upsert(&key, &entry)?;
        index.save(&self.index_file).await?;

        info!(
            label = %key,
            version = entry.version,
            signature = entry.contract_signature.as_deref().unwrap_or(""),
            "Registered stem"
        );
        Ok(entry)
    }

    /// Remove the entry for `label`; `false` when it was not indexed
    pub async fn invalidate(&self, label: &StemLabel) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut index = CacheIndex::load(&self.index_file).await;
        let key = label.to_string();

        if !index.remove(&key) {
            debug!(label = %key, "Invalidate: not found");
            return Ok(false);
        }

        index.save(&self.index_file).await?;
        info!(label = %key, "Invalidated stem");
        Ok(true)
    }

    /// Delete entries (and their files) older than `max_age_days`
    ///
    /// Malformed entries and files that cannot be deleted are skipped.
    /// Returns the number of entries removed.
    pub async fn cleanup_expired(&self, max_age_days: i64) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut index = CacheIndex::load(&self.index_file).await;
        let now = now();

        let mut expired = Vec::new();
        for (label, entry) in index.entries() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(label = %label, error = %e, "Skipping malformed cache entry");
                    continue;
                }
            };
            // Unknown creation time is never expired
            let Some(created) = entry.created else {
                continue;
            };
            if age_days(created, now) > max_age_days {
                expired.push((label.to_string(), entry.path));
            }
        }

        let mut removed = 0;
        for (label, path) in expired {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(label = %label, path = %path.display(), error = %e, "Could not delete expired stem");
                    continue;
                }
            }
            index.remove(&label);
            removed += 1;
        }

        if removed > 0 {
            index.save(&self.index_file).await?;
        }
        info!(removed, max_age_days, "Cache cleanup finished");
        Ok(removed)
    }

    /// Aggregate counts over the whole index; read-only
    pub async fn summarize(&self) -> CacheSummary {
        let _guard = self.lock.lock().await;
        let index = CacheIndex::load(&self.index_file).await;
        let now = now();

        let mut summary = CacheSummary {
            ttl_days: self.ttl_days,
            contract: self.contract.clone(),
            ..CacheSummary::default()
        };

        for (_, entry) in index.entries() {
            summary.total += 1;
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => {
                    summary.malformed += 1;
                    continue;
                }
            };

            if entry.rotational {
                summary.rotational += 1;
            }
            let origin = entry.dataset_origin.clone().unwrap_or_else(|| "unknown".to_string());
            *summary.by_origin.entry(origin).or_default() += 1;

            if entry.created.map(|c| age_days(c, now) > self.ttl_days).unwrap_or(false) {
                summary.expired += 1;
            }

            match tokio::fs::metadata(&entry.path).await {
                Ok(meta) => summary.total_bytes += meta.len(),
                Err(_) => summary.missing_files += 1,
            }

            match &entry.contract_signature {
                None => summary.signatures.legacy += 1,
                Some(stored) if *stored == self.contract.signature_for(&entry.text) => {
                    summary.signatures.compatible += 1
                }
                Some(_) => summary.signatures.incompatible += 1,
            }
        }

        summary
    }

    /// Snapshot of all well-formed entries keyed by label
    pub async fn entries(&self) -> BTreeMap<String, StemEntry> {
        let _guard = self.lock.lock().await;
        let index = CacheIndex::load(&self.index_file).await;
        index
            .entries()
            .filter_map(|(label, entry)| entry.ok().map(|e| (label.to_string(), e)))
            .collect()
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
