//! Fair rotation over personalization datasets
//!
//! Least-used first: candidates are ordered by `(use_count, last_used)`,
//! never-used items sorting before any timestamp. Selecting an item bumps
//! its count, so over `k × size` selections each enabled item is picked
//! exactly `k` times.

use super::state::{ItemUsage, RotationCategory, RotationState};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use stemkit_common::time::now;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Personalization pair for one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationPair {
    pub ok: bool,
    pub name: Option<String>,
    pub developer: Option<String>,
}

/// Per-category usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RotationStats {
    pub total_items: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub used_at_least_once: usize,
    pub never_used: usize,
}

/// Read-only provider of candidate strings per category
pub trait DatasetSource: Send + Sync {
    fn items(&self, category: RotationCategory) -> Vec<String>;
}

/// Dataset held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticDataset {
    items: BTreeMap<RotationCategory, Vec<String>>,
}

impl StaticDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: RotationCategory, items: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.items
            .insert(category, items.into_iter().map(Into::into).collect());
        self
    }
}

impl DatasetSource for StaticDataset {
    fn items(&self, category: RotationCategory) -> Vec<String> {
        self.items.get(&category).cloned().unwrap_or_default()
    }
}

/// Rotation selector over a JSON state file
pub struct RotationSelector {
    state_file: PathBuf,
    lock: Mutex<()>,
}

impl RotationSelector {
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    /// Pick the least-used enabled item of `dataset` and record the use
    ///
    /// `Ok(None)` when the dataset is empty or every item is disabled.
    pub async fn select_next(&self, category: RotationCategory, dataset: &[String]) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        let mut state = RotationState::load(&self.state_file).await;
        let dataset = normalize(dataset);

        let usage = state.category_mut(category);
        for item in &dataset {
            usage.entry(item.clone()).or_default();
        }

        let Some(chosen) = choose(usage, &dataset) else {
            debug!(category = %category, items = dataset.len(), "No rotation candidate");
            return Ok(None);
        };

        let now = now();
        if let Some(record) = usage.get_mut(&chosen) {
            record.use_count += 1;
            record.last_used = Some(now);
        }
        state.meta.last_update = Some(now);
        state.save(&self.state_file).await?;

        debug!(category = %category, item = %chosen, "Rotation selected");
        Ok(Some(chosen))
    }

    /// Select one name and one developer
    pub async fn select_pair(&self, names: &[String], developers: &[String]) -> Result<RotationPair> {
        let name = self.select_next(RotationCategory::Names, names).await?;
        let developer = self.select_next(RotationCategory::Developers, developers).await?;
        Ok(RotationPair {
            ok: name.is_some() && developer.is_some(),
            name,
            developer,
        })
    }

    /// Clear usage state for one category, or everything when `None`
    ///
    /// A full reset also clears disabled flags.
    pub async fn reset(&self, category: Option<RotationCategory>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut state = RotationState::load(&self.state_file).await;

        match category {
            Some(category) => {
                state.categories.remove(category.as_str());
            }
            None => state = RotationState::default(),
        }
        state.meta.last_update = Some(now());
        state.save(&self.state_file).await?;

        info!(category = ?category.map(|c| c.as_str()), "Rotation state reset");
        Ok(())
    }

    /// Enable or disable an item; returns its previous disabled flag
    pub async fn set_disabled(&self, category: RotationCategory, item: &str, disabled: bool) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut state = RotationState::load(&self.state_file).await;

        let record = state
            .category_mut(category)
            .entry(item.trim().to_string())
            .or_default();
        let previous = record.disabled;
        record.disabled = disabled;
        state.meta.last_update = Some(now());
        state.save(&self.state_file).await?;

        info!(category = %category, item = %item, disabled, "Rotation item updated");
        Ok(previous)
    }

    /// Usage statistics for the items of `dataset`
    pub async fn stats(&self, category: RotationCategory, dataset: &[String]) -> RotationStats {
        let _guard = self.lock.lock().await;
        let state = RotationState::load(&self.state_file).await;
        let usage = state.category(category);

        let mut stats = RotationStats::default();
        for item in normalize(dataset) {
            let record = usage.and_then(|u| u.get(&item)).cloned().unwrap_or_default();
            stats.total_items += 1;
            if record.disabled {
                stats.disabled += 1;
            } else {
                stats.enabled += 1;
            }
            if record.use_count > 0 {
                stats.used_at_least_once += 1;
            } else {
                stats.never_used += 1;
            }
        }
        stats
    }

    /// Raw usage records for `category`
    pub async fn usage(&self, category: RotationCategory) -> BTreeMap<String, ItemUsage> {
        let _guard = self.lock.lock().await;
        RotationState::load(&self.state_file)
            .await
            .category(category)
            .cloned()
            .unwrap_or_default()
    }
}

/// Least-used enabled item of `dataset`; ties keep dataset order
pub fn choose(usage: &BTreeMap<String, ItemUsage>, dataset: &[String]) -> Option<String> {
    let never = DateTime::<Utc>::MIN_UTC;
    dataset
        .iter()
        .filter_map(|item| {
            let record = usage.get(item).cloned().unwrap_or_default();
            (!record.disabled).then_some((item, record))
        })
        .min_by_key(|(_, record)| (record.use_count, record.last_used.unwrap_or(never)))
        .map(|(item, _)| item.clone())
}

/// Trim, drop blanks and duplicates, keep first-seen order
fn normalize(dataset: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    dataset
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_choose_prefers_lowest_count() {
        let mut usage = BTreeMap::new();
        usage.insert("a".to_string(), ItemUsage { use_count: 2, ..ItemUsage::default() });
        usage.insert("b".to_string(), ItemUsage { use_count: 1, ..ItemUsage::default() });

        assert_eq!(choose(&usage, &items(&["a", "b"])), Some("b".to_string()));
    }

    #[test]
    fn test_choose_breaks_ties_by_oldest_use() {
        let earlier = "2025-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let later = "2025-02-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut usage = BTreeMap::new();
        usage.insert("a".to_string(), ItemUsage { use_count: 1, last_used: Some(later), disabled: false });
        usage.insert("b".to_string(), ItemUsage { use_count: 1, last_used: Some(earlier), disabled: false });
        usage.insert("c".to_string(), ItemUsage { use_count: 1, last_used: None, disabled: false });

        assert_eq!(choose(&usage, &items(&["a", "b", "c"])), Some("c".to_string()));
        usage.remove("c");
        assert_eq!(choose(&usage, &items(&["a", "b"])), Some("b".to_string()));
    }

    #[test]
    fn test_choose_skips_disabled_and_foreign_items() {
        let mut usage = BTreeMap::new();
        usage.insert("a".to_string(), ItemUsage { disabled: true, ..ItemUsage::default() });
        usage.insert("zombie".to_string(), ItemUsage::default());

        assert_eq!(choose(&usage, &items(&["a"])), None);
        assert_eq!(choose(&usage, &items(&["a", "b"])), Some("b".to_string()));
        assert_eq!(choose(&usage, &[]), None);
    }

    #[test]
    fn test_normalize_dedups_and_trims() {
        assert_eq!(normalize(&items(&[" Alice", "Bob", "", "Alice "])), items(&["Alice", "Bob"]));
    }
}
