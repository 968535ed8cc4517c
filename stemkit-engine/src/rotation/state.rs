//! Rotation state file
//!
//! ```json
//! {
//!   "names": { "Alice": { "use_count": 3, "last_used": "...", "disabled": false } },
//!   "developers": { },
//!   "_meta": { "last_update": "..." }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use stemkit_common::time::lenient;
use stemkit_common::StemCategory;
use tracing::warn;

/// Personalization dataset with its own rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationCategory {
    Names,
    Developers,
    Scripts,
}

impl RotationCategory {
    pub const ALL: [RotationCategory; 3] = [
        RotationCategory::Names,
        RotationCategory::Developers,
        RotationCategory::Scripts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RotationCategory::Names => "names",
            RotationCategory::Developers => "developers",
            RotationCategory::Scripts => "scripts",
        }
    }

    /// Stem category the selected items are synthesized into
    pub fn stem_category(&self) -> StemCategory {
        match self {
            RotationCategory::Names => StemCategory::Name,
            RotationCategory::Developers => StemCategory::Developer,
            RotationCategory::Scripts => StemCategory::Script,
        }
    }
}

impl fmt::Display for RotationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotationCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "names" | "name" => Ok(RotationCategory::Names),
            "developers" | "developer" => Ok(RotationCategory::Developers),
            "scripts" | "script" => Ok(RotationCategory::Scripts),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown rotation category '{}'",
                other
            ))),
        }
    }
}

/// Usage record for one dataset item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemUsage {
    #[serde(default)]
    pub use_count: u64,
    #[serde(default, with = "lenient")]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RotationMeta {
    #[serde(default, with = "lenient")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Whole rotation state document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RotationState {
    #[serde(rename = "_meta", default)]
    pub meta: RotationMeta,
    #[serde(flatten)]
    pub categories: BTreeMap<String, BTreeMap<String, ItemUsage>>,
}

impl RotationState {
    /// Load state, repairing to default on any read or parse failure
    pub async fn load(path: &Path) -> Self {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Rotation state unreadable, starting fresh");
                return Self::default();
            }
        };

        if content.trim().is_empty() {
            return Self::default();
        }

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Rotation state corrupt, auto-repairing to default");
                Self::default()
            }
        }
    }

    /// Persist state (temp file + rename)
    pub async fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub fn category(&self, category: RotationCategory) -> Option<&BTreeMap<String, ItemUsage>> {
        self.categories.get(category.as_str())
    }

    pub fn category_mut(&mut self, category: RotationCategory) -> &mut BTreeMap<String, ItemUsage> {
        self.categories.entry(category.as_str().to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_state_document() {
        let state: RotationState = serde_json::from_str(
            r#"{
                "names": {"Alice": {"use_count": 2, "last_used": "2025-03-01T10:00:00", "disabled": false}},
                "developers": {},
                "_meta": {"last_update": "2025-03-01T10:00:00"}
            }"#,
        )
        .unwrap();

        let names = state.category(RotationCategory::Names).unwrap();
        assert_eq!(names["Alice"].use_count, 2);
        assert!(names["Alice"].last_used.is_some());
        assert!(state.meta.last_update.is_some());
        assert!(!state.categories.contains_key("_meta"));
    }

    #[tokio::test]
    async fn test_load_corrupt_state_repairs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rotations_meta.json");
        std::fs::write(&path, r#"{"names": "oops"}"#).unwrap();

        assert_eq!(RotationState::load(&path).await, RotationState::default());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("rotations_meta.json");

        let mut state = RotationState::default();
        state.category_mut(RotationCategory::Developers).insert(
            "Acme".to_string(),
            ItemUsage {
                use_count: 4,
                ..ItemUsage::default()
            },
        );
        state.save(&path).await.unwrap();

        let loaded = RotationState::load(&path).await;
        assert_eq!(loaded.category(RotationCategory::Developers).unwrap()["Acme"].use_count, 4);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Names".parse::<RotationCategory>().unwrap(), RotationCategory::Names);
        assert!("planets".parse::<RotationCategory>().is_err());
        assert_eq!(RotationCategory::Developers.stem_category(), StemCategory::Developer);
    }
}
