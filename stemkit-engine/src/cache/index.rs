//! Cache index file model
//!
//! The index is a human-editable JSON document:
//!
//! ```json
//! { "stems": { "name.alice": { "text": "Alice", "path": "...", ... } } }
//! ```
//!
//! Older files are a bare `{label: entry}` map without the `stems` wrapper;
//! both layouts load. Entries are kept as raw JSON so that one malformed
//! entry, or fields this version does not know about, survive a rewrite.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use stemkit_common::time::lenient;
use tracing::warn;

const STEMS_KEY: &str = "stems";

/// Metadata for one cached stem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StemEntry {
    #[serde(default)]
    pub text: String,
    pub path: PathBuf,
    #[serde(default)]
    pub voice_id: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_version: Option<String>,
    /// Absent on legacy entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_signature: Option<String>,
    #[serde(default)]
    pub rotational: bool,
    #[serde(default)]
    pub dataset_origin: Option<String>,
    #[serde(default)]
    pub version: u64,
    #[serde(default, with = "lenient")]
    pub created: Option<DateTime<Utc>>,
}

/// In-memory view of the index file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheIndex {
    stems: BTreeMap<String, Value>,
    /// Top-level keys other than `stems`
    extra: Map<String, Value>,
}

impl CacheIndex {
    /// Load the index, repairing to empty on any read or parse failure
    ///
    /// A missing file is simply an empty index.
    pub async fn load(path: &Path) -> Self {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache index unreadable, starting empty");
                return Self::default();
            }
        };

        match Self::parse(&content) {
            Ok(index) => index,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache index corrupt, auto-repairing to empty");
                Self::default()
            }
        }
    }

    /// Parse index JSON, accepting the wrapped and the legacy bare layout
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_str(content)
            .map_err(|e| Error::CacheCorruption(format!("invalid JSON: {}", e)))?;
        let Value::Object(mut root) = value else {
            return Err(Error::CacheCorruption("index root is not an object".to_string()));
        };

        match root.remove(STEMS_KEY) {
            Some(Value::Object(stems)) => Ok(Self {
                stems: stems.into_iter().collect(),
                extra: root,
            }),
            Some(_) => Err(Error::CacheCorruption("'stems' is not an object".to_string())),
            None => Ok(Self {
                stems: root.into_iter().collect(),
                extra: Map::new(),
            }),
        }
    }

    /// Persist the whole index (temp file + rename)
    pub async fn save(&self, path: &Path) -> Result<()> {
        let mut root = self.extra.clone();
        root.insert(
            STEMS_KEY.to_string(),
            Value::Object(self.stems.clone().into_iter().collect()),
        );
        let json = serde_json::to_string_pretty(&Value::Object(root))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.stems.contains_key(label)
    }

    /// Typed entry for `label`; `Some(Err)` for a malformed entry
    pub fn entry(&self, label: &str) -> Option<Result<StemEntry>> {
        self.stems
            .get(label)
            .map(|raw| serde_json::from_value(raw.clone()).map_err(Error::from))
    }

    /// All entries, malformed ones reported as errors
    pub fn entries(&self) -> impl Iterator<Item = (&str, Result<StemEntry>)> + '_ {
        self.stems.iter().map(|(label, raw)| {
            (
                label.as_str(),
                serde_json::from_value(raw.clone()).map_err(Error::from),
            )
        })
    }

    /// Merge `entry` into the stored entry for `label`
    ///
    /// New fields win; fields only present in the stored entry survive.
    pub fn upsert(&mut self, label: &str, entry: &StemEntry) -> Result<()> {
        let Value::Object(fresh) = serde_json::to_value(entry)? else {
            return Err(Error::Internal("stem entry did not serialize to an object".to_string()));
        };

        let mut merged = match self.stems.remove(label) {
            Some(Value::Object(existing)) => existing,
            _ => Map::new(),
        };
        merged.extend(fresh);
        self.stems.insert(label.to_string(), Value::Object(merged));
        Ok(())
    }

    pub fn remove(&mut self, label: &str) -> bool {
        self.stems.remove(label).is_some()
    }

    /// Stored version for `label`, 0 when absent or unreadable
    pub fn version_of(&self, label: &str) -> u64 {
        self.stems
            .get(label)
            .and_then(|raw| raw.get("version"))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(text: &str) -> StemEntry {
        StemEntry {
            text: text.to_string(),
            path: PathBuf::from("/stems/name/name.alice.wav"),
            voice_id: "voice".to_string(),
            model_id: "sonic-3".to_string(),
            sample_rate: Some(48_000),
            encoding: Some("pcm_s16le".to_string()),
            provider_version: Some("2025-04-16".to_string()),
            contract_signature: Some("0123456789abcdef".to_string()),
            rotational: false,
            dataset_origin: None,
            version: 1,
            created: Some(Utc::now()),
        }
    }

    #[test]
    fn test_parse_wrapped_and_legacy_layouts() {
        let wrapped = CacheIndex::parse(r#"{"stems": {"name.alice": {"path": "/a.wav"}}}"#).unwrap();
        let legacy = CacheIndex::parse(r#"{"name.alice": {"path": "/a.wav"}}"#).unwrap();
        assert_eq!(wrapped.len(), 1);
        assert_eq!(legacy.len(), 1);
        assert!(legacy.contains("name.alice"));
    }

    #[test]
    fn test_parse_rejects_non_object_root() {
        assert!(matches!(CacheIndex::parse("[1, 2]"), Err(Error::CacheCorruption(_))));
        assert!(matches!(CacheIndex::parse("{\"stems\": 3}"), Err(Error::CacheCorruption(_))));
    }

    #[tokio::test]
    async fn test_load_corrupt_file_repairs_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stems_index.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        assert!(CacheIndex::load(&path).await.is_empty());
        assert!(CacheIndex::load(&dir.path().join("missing.json")).await.is_empty());
    }

    #[test]
    fn test_upsert_preserves_unknown_fields() {
        let mut index = CacheIndex::parse(
            r#"{"stems": {"name.alice": {"path": "/old.wav", "reviewer": "sam"}}, "schema": 2}"#,
        )
        .unwrap();

        index.upsert("name.alice", &entry("Alice")).unwrap();

        let raw = &index.stems["name.alice"];
        assert_eq!(raw["reviewer"], "sam");
        assert_eq!(raw["path"], "/stems/name/name.alice.wav");
        assert_eq!(index.extra["schema"], 2);
    }

    #[test]
    fn test_malformed_entry_does_not_poison_others() {
        let index = CacheIndex::parse(
            r#"{"stems": {"name.bad": {"text": 5}, "name.good": {"path": "/g.wav"}}}"#,
        )
        .unwrap();

        assert!(index.entry("name.bad").unwrap().is_err());
        assert!(index.entry("name.good").unwrap().is_ok());
        assert!(index.entry("name.none").is_none());
    }

    #[tokio::test]
    async fn test_save_round_trips_through_wrapper() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("stems_index.json");

        let mut index = CacheIndex::default();
        index.upsert("name.alice", &entry("Alice")).unwrap();
        index.save(&path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"stems\""));
        let loaded = CacheIndex::load(&path).await;
        assert_eq!(loaded.entry("name.alice").unwrap().unwrap().text, "Alice");
        assert_eq!(loaded.version_of("name.alice"), 1);
    }
}
