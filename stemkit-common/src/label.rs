//! Stem labels and categories
//!
//! A stem label is the canonical cache key `<category>.<slug>`, for example
//! `name.alice` or `silence.250ms`. Older indexes and stem directories use
//! a `stem.` prefix (`stem.name.alice`); parsing accepts both forms and
//! always yields the canonical one.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const LEGACY_PREFIX: &str = "stem.";
const WAV_EXTENSION: &str = ".wav";

/// Stem category
///
/// Closed set; every label belongs to exactly one category and the
/// category decides the storage sub-directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemCategory {
    /// Personalized first names
    Name,
    /// Developer / company names
    Developer,
    /// Script fragments shared by all messages
    Script,
    /// Anything else
    Generic,
    /// Zero-valued padding clips
    Silence,
}

impl StemCategory {
    pub const ALL: [StemCategory; 5] = [
        StemCategory::Name,
        StemCategory::Developer,
        StemCategory::Script,
        StemCategory::Generic,
        StemCategory::Silence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StemCategory::Name => "name",
            StemCategory::Developer => "developer",
            StemCategory::Script => "script",
            StemCategory::Generic => "generic",
            StemCategory::Silence => "silence",
        }
    }
}

impl fmt::Display for StemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StemCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "names" => Ok(StemCategory::Name),
            "developer" | "developers" => Ok(StemCategory::Developer),
            "script" | "scripts" => Ok(StemCategory::Script),
            "generic" => Ok(StemCategory::Generic),
            "silence" => Ok(StemCategory::Silence),
            other => Err(Error::InvalidLabel(format!("unknown stem category '{}'", other))),
        }
    }
}

/// Canonical stem identifier `<category>.<slug>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StemLabel {
    category: StemCategory,
    slug: String,
}

impl StemLabel {
    /// Build a label from free text, slugifying it
    ///
    /// Lowercases, collapses every run of characters outside `[a-z0-9]`
    /// into a single `_`, trims leading/trailing `_`, and falls back to
    /// `unnamed` for empty input.
    pub fn new(category: StemCategory, text: &str) -> Self {
        Self {
            category,
            slug: slugify(text),
        }
    }

    /// Label for a silence clip of `duration_ms`
    pub fn silence(duration_ms: u32) -> Self {
        Self {
            category: StemCategory::Silence,
            slug: format!("{}ms", duration_ms),
        }
    }

    /// Parse `<category>.<slug>` or the legacy `stem.<category>.<slug>`
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let body = trimmed.strip_prefix(LEGACY_PREFIX).unwrap_or(trimmed);

        let (category, slug) = body
            .split_once('.')
            .ok_or_else(|| Error::InvalidLabel(format!("'{}' is not <category>.<slug>", raw)))?;
        let category: StemCategory = category.parse()?;

        let slug = slug.to_ascii_lowercase();
        if slug.is_empty() {
            return Err(Error::InvalidLabel(format!("'{}' has an empty slug", raw)));
        }
        if !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::InvalidLabel(format!(
                "'{}' contains characters outside [a-z0-9_-]",
                raw
            )));
        }

        Ok(Self { category, slug })
    }

    /// Recover a label from a stem file name such as `name.alice.wav`
    pub fn parse_file_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(WAV_EXTENSION)?;
        Self::parse(stem).ok()
    }

    pub fn category(&self) -> StemCategory {
        self.category
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// Duration encoded in a silence label (`silence.250ms` -> 250)
    pub fn silence_ms(&self) -> Option<u32> {
        if self.category != StemCategory::Silence {
            return None;
        }
        self.slug.strip_suffix("ms")?.parse().ok()
    }

    /// Human-readable transcript reconstructed from the slug
    ///
    /// `name.mary_jane` -> `Mary Jane`
    pub fn spoken_text(&self) -> String {
        self.slug
            .split(['_', '-'])
            .filter(|word| !word.is_empty())
            .map(title_case)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Storage path relative to the stems root: `<category>/<label>.wav`
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.category.as_str()).join(self.file_name())
    }

    /// Remote object path under `prefix`: `<prefix>/<category>/<label>.wav`
    pub fn object_path(&self, prefix: &str) -> String {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/{}", self.category, self.file_name())
        } else {
            format!("{}/{}/{}", prefix, self.category, self.file_name())
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self, WAV_EXTENSION)
    }
}

impl fmt::Display for StemLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category, self.slug)
    }
}

impl FromStr for StemLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() {
        "unnamed".to_string()
    } else {
        slug
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
