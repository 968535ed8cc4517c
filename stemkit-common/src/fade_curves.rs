//! Fade curve implementations for crossfading
//!
//! Curves are evaluated over a discrete fade of `len` samples with both
//! endpoints included: sample `0` sits at position 0.0 and sample `len - 1`
//! at position 1.0. A one-sample fade sits entirely at position 0.0.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fmt;

/// Fade curve types used by the assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Linear: fade-out v(t) = 1 - t
    /// Used for the short tail fade that prevents a hard stop
    Linear,

    /// Raised cosine: fade-out v(t) = (1 + cos(π × t)) / 2
    /// Used for stem-to-stem crossfades; fade-in is its complement
    RaisedCosine,
}

impl FadeCurve {
    /// Calculate fade-out multiplier at normalized position (0.0 to 1.0)
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::RaisedCosine => 0.5 * (1.0 + (PI * t).cos()),
        }
    }

    /// Calculate fade-in multiplier at normalized position (0.0 to 1.0)
    ///
    /// Always `1 - fade_out`, so a fade-in/fade-out pair sums to unity gain.
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        1.0 - self.calculate_fade_out(position)
    }

    /// Fade-out multiplier for sample `index` of a `len`-sample fade
    pub fn fade_out_at(&self, index: usize, len: usize) -> f32 {
        self.calculate_fade_out(position(index, len))
    }

    /// Fade-in multiplier for sample `index` of a `len`-sample fade
    pub fn fade_in_at(&self, index: usize, len: usize) -> f32 {
        self.calculate_fade_in(position(index, len))
    }

    /// Parse curve from a config string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(FadeCurve::Linear),
            "raised_cosine" | "cosine" | "hann" => Some(FadeCurve::RaisedCosine),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::RaisedCosine => "raised_cosine",
        }
    }
}

impl fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn position(index: usize, len: usize) -> f32 {
    if len <= 1 {
        0.0
    } else {
        index as f32 / (len - 1) as f32
    }
}
