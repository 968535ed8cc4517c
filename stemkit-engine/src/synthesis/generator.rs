//! Cache-aware stem generation
//!
//! `resolve` serves a stem from the cache when it is still valid and
//! synthesizes it otherwise. `generate_batch` fans `resolve` out over a
//! bounded worker pool and reports every item, succeeded or failed.

use super::{validate_wav_bytes, SynthesisProvider};
use crate::audio::silence::ensure_silence;
use crate::audio::wav::write_bytes_atomic;
use crate::cache::{Registration, StemCache};
use crate::error::{Error, Result};
use crate::retry::{with_retries, with_timeout, RetryPolicy};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stemkit_common::{EngineConfig, StemCategory, StemLabel};
use tracing::{debug, info, warn};

/// Provenance recorded with a stem
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StemOrigin {
    pub rotational: bool,
    pub dataset_origin: Option<String>,
}

impl StemOrigin {
    pub fn rotational(dataset_origin: impl Into<String>) -> Self {
        Self {
            rotational: true,
            dataset_origin: Some(dataset_origin.into()),
        }
    }
}

/// Where a resolved stem came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StemSource {
    Cached,
    Synthesized { attempts: u32 },
    Generated,
}

/// A stem ready on local disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedStem {
    pub label: String,
    pub path: PathBuf,
    pub source: StemSource,
}

/// One failed batch item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub item: String,
    pub label: Option<String>,
    pub error: String,
}

/// Outcome of a batch generation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub generated: usize,
    pub cached: usize,
    pub stems: Vec<ResolvedStem>,
    pub failed: Vec<BatchFailure>,
}

/// Stem generator over a provider and the stem cache
pub struct StemGenerator {
    provider: Arc<dyn SynthesisProvider>,
    cache: Arc<StemCache>,
    policy: RetryPolicy,
    timeout: Duration,
    workers: usize,
}

impl StemGenerator {
    pub fn new(provider: Arc<dyn SynthesisProvider>, cache: Arc<StemCache>) -> Self {
        Self {
            provider,
            cache,
            policy: RetryPolicy::default(),
            timeout: Duration::from_secs(60),
            workers: 4,
        }
    }

    /// Generator with retries, timeout and pool size taken from `config`
    pub fn from_config(provider: Arc<dyn SynthesisProvider>, cache: Arc<StemCache>, config: &EngineConfig) -> Self {
        Self::new(provider, cache)
            .with_retry_policy(RetryPolicy::new(
                config.retries,
                Duration::from_millis(config.retry_delay_ms),
            ))
            .with_timeout(Duration::from_secs(config.provider_timeout_secs))
            .with_workers(config.workers)
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
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

    pub fn cache(&self) -> &Arc<StemCache> {
        &self.cache
    }

    /// Serve `label` from the cache, synthesizing it on a miss
    pub async fn resolve(&self, label: &StemLabel, text: &str, origin: &StemOrigin) -> Result<ResolvedStem> {
        if let Some(hit) = self.cache.get(label).await {
            return Ok(ResolvedStem {
                label: label.to_string(),
                path: hit.entry.path,
                source: StemSource::Cached,
            });
        }
        self.synthesize(label, text, origin).await
    }

    /// Produce `label` unconditionally and register it
    ///
    /// Silence labels are generated locally; everything else goes through
    /// the provider with retries and a per-attempt timeout.
    pub async fn synthesize(&self, label: &StemLabel, text: &str, origin: &StemOrigin) -> Result<ResolvedStem> {
        if label.category() == StemCategory::Silence {
            return self.generate_silence(label, origin).await;
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyInput(format!("no text to synthesize for {}", label)));
        }

        let contract = self.cache.contract();
        let sample_rate = contract.sample_rate;
        let voice_id = contract.voice_id.as_str();
        if voice_id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "contract voice_id is empty; set STEMKIT_VOICE_ID or [contract].voice_id".to_string(),
            ));
        }
        let what = label.to_string();

        let (result, attempts) = with_retries(self.policy, &what, move |attempt| async move {
            debug!(label = %label, attempt, "Synthesizing stem");
            let bytes = with_timeout(self.timeout, "synthesis", self.provider.synthesize(text, voice_id)).await?;
            validate_wav_bytes(&bytes, sample_rate)?;
            Ok(bytes)
        })
        .await;
        let bytes = result?;

        let path = self.cache.stem_path(label);
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_bytes_atomic(&target, &bytes))
            .await
            .map_err(|e| Error::Internal(format!("stem write task failed: {}", e)))??;

        self.register(label, text, &path, origin).await?;
        info!(
            label = %label,
            attempts,
            provider = self.provider.name(),
            "Synthesized stem"
        );

        Ok(ResolvedStem {
            label: label.to_string(),
            path,
            source: StemSource::Synthesized { attempts },
        })
    }

    async fn generate_silence(&self, label: &StemLabel, origin: &StemOrigin) -> Result<ResolvedStem> {
        let duration_ms = label
            .silence_ms()
            .ok_or_else(|| Error::InvalidLabel(format!("{} is not silence.<N>ms", label)))?;
        let stems_dir = self.cache.stems_dir().to_path_buf();
        let sample_rate = self.cache.contract().sample_rate;

        let path = tokio::task::spawn_blocking(move || ensure_silence(&stems_dir, duration_ms, sample_rate))
            .await
            .map_err(|e| Error::Internal(format!("silence task failed: {}", e)))??;

        self.register(label, "", &path, origin).await?;
        Ok(ResolvedStem {
            label: label.to_string(),
            path,
            source: StemSource::Generated,
        })
    }

    async fn register(&self, label: &StemLabel, text: &str, path: &std::path::Path, origin: &StemOrigin) -> Result<()> {
        let mut registration = Registration::new(label, text, path);
        registration.rotational = origin.rotational;
        registration.dataset_origin = origin.dataset_origin.as_deref();
        self.cache.register(registration).await?;
        Ok(())
    }

    /// Resolve every item of `items` as a `category` stem
    ///
    /// Items are slugified into labels (`Mary Jane` -> `name.mary_jane`);
    /// legacy `stem.*` labels are accepted and spoken from their slug.
    pub async fn generate_batch(&self, category: StemCategory, items: &[String], origin: &StemOrigin) -> BatchReport {
        let outcomes: Vec<(String, Result<(StemLabel, ResolvedStem)>)> = stream::iter(items.iter().cloned())
            .map(move |item| async move {
                let outcome = self.resolve_item(category, &item, origin).await;
                (item, outcome)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut report = BatchReport {
            total: items.len(),
            ..BatchReport::default()
        };

        for (item, outcome) in outcomes {
            match outcome {
                Ok((_, stem)) => {
                    match stem.source {
                        StemSource::Cached => report.cached += 1,
                        StemSource::Synthesized { .. } | StemSource::Generated => report.generated += 1,
                    }
                    report.stems.push(stem);
                }
                Err(e) => {
                    warn!(item = %item, error = %e, "Stem generation failed");
                    report.failed.push(BatchFailure {
                        label: item_label(category, &item).map(|(l, _)| l.to_string()),
                        item,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.stems.sort_by(|a, b| a.label.cmp(&b.label));
        report.failed.sort_by(|a, b| a.item.cmp(&b.item));
        info!(
            category = %category,
            total = report.total,
            generated = report.generated,
            cached = report.cached,
            failed = report.failed.len(),
            "Batch generation finished"
        );
        report
    }

    async fn resolve_item(
        &self,
        category: StemCategory,
        item: &str,
        origin: &StemOrigin,
    ) -> Result<(StemLabel, ResolvedStem)> {
        let (label, text) = item_label(category, item)
            .ok_or_else(|| Error::EmptyInput("blank batch item".to_string()))?;
        let stem = self.resolve(&label, &text, origin).await?;
        Ok((label, stem))
    }
}

/// Label and transcript for a batch item
fn item_label(category: StemCategory, item: &str) -> Option<(StemLabel, String)> {
    let item = item.trim();
    if item.is_empty() {
        return None;
    }
    if item.starts_with("stem.") {
        if let Ok(label) = StemLabel::parse(item) {
            let text = label.spoken_text();
            return Some((label, text));
        }
    }
    Some((StemLabel::new(category, item), item.to_string()))
}
