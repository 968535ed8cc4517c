//! Segment timing for message assembly
//!
//! A timing map is an ordered list of transition edges between segment
//! identifiers. Each edge says how the next segment joins the previous
//! one: a raised-cosine crossfade of `crossfade_ms`, followed by
//! `gap_ms` of silence. Transitions that are not declared fall back to
//! [`TransitionTiming::default`] (no gap, 10 ms crossfade).
//!
//! # Conversion
//!
//! Millisecond values become sample counts by truncation:
//! `samples = floor(ms × sample_rate / 1000)`.
//!
//! ```rust
//! use stemkit_common::timing::*;
//!
//! assert_eq!(ms_to_samples(10.0, 48_000), 480);
//! assert_eq!(ms_to_samples(0.5, 44_100), 22);
//!
//! let mut map = TimingMap::new();
//! map.push(Transition::new("greeting", "name", 0.0, 30.0));
//! assert_eq!(map.lookup("greeting", "name").crossfade_ms, 30.0);
//! assert_eq!(map.lookup("name", "outro"), TransitionTiming::default());
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Constants
// ============================================================================

/// Gap used when a transition is not declared
pub const DEFAULT_GAP_MS: f64 = 0.0;

/// Crossfade used when a transition is not declared
pub const DEFAULT_CROSSFADE_MS: f64 = 10.0;

// ============================================================================
// Conversions
// ============================================================================

/// Convert milliseconds to a sample (frame) count, truncating
///
/// Negative and non-finite inputs yield 0.
pub fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    if !ms.is_finite() || ms <= 0.0 {
        return 0;
    }
    (sample_rate as f64 * ms / 1000.0) as usize
}

/// Convert a sample (frame) count to milliseconds
pub fn samples_to_ms(samples: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f64 * 1000.0 / sample_rate as f64
}

// ============================================================================
// Timing Map
// ============================================================================

/// Gap and crossfade applied at one join
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionTiming {
    pub gap_ms: f64,
    pub crossfade_ms: f64,
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            gap_ms: DEFAULT_GAP_MS,
            crossfade_ms: DEFAULT_CROSSFADE_MS,
        }
    }
}

/// Declared transition edge `from -> to`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    #[serde(default = "default_gap_ms")]
    pub gap_ms: f64,
    #[serde(default = "default_crossfade_ms")]
    pub crossfade_ms: f64,
}

fn default_gap_ms() -> f64 {
    DEFAULT_GAP_MS
}

fn default_crossfade_ms() -> f64 {
    DEFAULT_CROSSFADE_MS
}

impl Transition {
    pub fn new(from: impl Into<String>, to: impl Into<String>, gap_ms: f64, crossfade_ms: f64) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            gap_ms,
            crossfade_ms,
        }
    }

    pub fn timing(&self) -> TransitionTiming {
        TransitionTiming {
            gap_ms: self.gap_ms,
            crossfade_ms: self.crossfade_ms,
        }
    }
}

/// Ordered list of transition edges
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimingMap {
    transitions: Vec<Transition>,
}

impl TimingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transitions(transitions: Vec<Transition>) -> Self {
        Self { transitions }
    }

    pub fn push(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Timing for the join `from -> to`
    ///
    /// When an edge is declared more than once the last declaration wins.
    pub fn lookup(&self, from: &str, to: &str) -> TransitionTiming {
        self.transitions
            .iter()
            .rev()
            .find(|t| t.from == from && t.to == to)
            .map(Transition::timing)
            .unwrap_or_default()
    }

    /// Check every edge against the known segment ids and value ranges
    pub fn validate<S: AsRef<str>>(&self, segment_ids: &[S]) -> Result<()> {
        let known: HashSet<&str> = segment_ids.iter().map(|s| s.as_ref()).collect();

        for (i, t) in self.transitions.iter().enumerate() {
            for endpoint in [&t.from, &t.to] {
                if !known.contains(endpoint.as_str()) {
                    return Err(Error::InvalidInput(format!(
                        "transition {} references unknown segment '{}'",
                        i, endpoint
                    )));
                }
            }
            for (name, value) in [("gap_ms", t.gap_ms), ("crossfade_ms", t.crossfade_ms)] {
                if !value.is_finite() || value < 0.0 {
                    return Err(Error::InvalidInput(format!(
                        "transition {} ({} -> {}) has invalid {}: {}",
                        i, t.from, t.to, name, value
                    )));
                }
            }
        }

        Ok(())
    }
}
