//! Sample-accurate crossfade assembler
//!
//! Merges an ordered list of stems into one waveform:
//!
//! ```text
//! running buffer:  [........ head ........][ tail × fade_out ]
//!                                          +
//! next stem:                              [ head × fade_in  ][ gap ][ remainder ]
//! ```
//!
//! Every join looks up its transition in the [`TimingMap`] (keyed by the
//! previous and next segment id). The crossfade length is clamped to the
//! shorter of the two clips; a zero-length crossfade degrades to plain
//! concatenation with the gap in between. A short linear fade-out is
//! applied to the end of the final buffer.
//!
//! Output duration = Σ input durations + Σ gaps − Σ crossfade overlaps.

use super::wav::{read_clip, write_clip, AudioFormat, Clip};
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use stemkit_common::timing::{ms_to_samples, TimingMap, TransitionTiming};
use stemkit_common::FadeCurve;
use tracing::{debug, info};

/// Default tail fade, milliseconds
pub const DEFAULT_TAIL_FADE_MS: f64 = 5.0;

/// One join as actually applied (after clamping)
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedTransition {
    pub from: String,
    pub to: String,
    pub requested: TransitionTiming,
    pub crossfade_frames: usize,
    pub gap_frames: usize,
}

/// Result of a successful assembly
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyReport {
    pub output: PathBuf,
    pub format: AudioFormat,
    pub frames: usize,
    pub duration_ms: f64,
    pub transitions: Vec<AppliedTransition>,
}

/// Crossfade assembler
///
/// Stateless apart from its settings; one instance can serve concurrent
/// assemblies of different outputs.
#[derive(Debug, Clone)]
pub struct CrossfadeAssembler {
    curve: FadeCurve,
    tail_fade_ms: f64,
}

impl Default for CrossfadeAssembler {
    fn default() -> Self {
        Self {
            curve: FadeCurve::RaisedCosine,
            tail_fade_ms: DEFAULT_TAIL_FADE_MS,
        }
    }
}

impl CrossfadeAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tail_fade_ms(mut self, tail_fade_ms: f64) -> Self {
        self.tail_fade_ms = tail_fade_ms.max(0.0);
        self
    }

    pub fn with_curve(mut self, curve: FadeCurve) -> Self {
        self.curve = curve;
        self
    }

    /// Assemble stems into `output`, keying transitions by file stem
    ///
    /// `greeting.wav` is looked up as segment id `greeting`.
    pub fn assemble(&self, stems: &[PathBuf], timing: &TimingMap, output: &Path) -> Result<AssemblyReport> {
        let ids: Vec<String> = stems.iter().map(|p| segment_id(p)).collect();
        self.assemble_segments(stems, &ids, timing, output)
    }

    /// Assemble stems into `output` with explicit segment ids
    pub fn assemble_segments(
        &self,
        stems: &[PathBuf],
        segment_ids: &[String],
        timing: &TimingMap,
        output: &Path,
    ) -> Result<AssemblyReport> {
        if stems.is_empty() {
            return Err(Error::EmptyInput("no stems to assemble".to_string()));
        }
        if segment_ids.len() != stems.len() {
            return Err(Error::InvalidInput(format!(
                "{} segment ids for {} stems",
                segment_ids.len(),
                stems.len()
            )));
        }
        timing.validate(segment_ids)?;

        let mut buffer = read_clip(&stems[0])?;
        let expected = buffer.format;
        let mut transitions = Vec::with_capacity(stems.len().saturating_sub(1));

        for (i, path) in stems.iter().enumerate().skip(1) {
            let next = read_clip(path)?;
            if next.format != expected {
                return Err(Error::FormatMismatch {
                    file: path.display().to_string(),
                    expected,
                    actual: next.format,
                });
            }

            let from = &segment_ids[i - 1];
            let to = &segment_ids[i];
            let requested = timing.lookup(from, to);
            let (crossfade_frames, gap_frames) = self.join(&mut buffer, &next, requested);

            debug!(
                from = %from,
                to = %to,
                crossfade_frames,
                gap_frames,
                "Joined segment"
            );
            transitions.push(AppliedTransition {
                from: from.clone(),
                to: to.clone(),
                requested,
                crossfade_frames,
                gap_frames,
            });
        }

        self.apply_tail_fade(&mut buffer);
        write_clip(output, &buffer)?;

        let report = AssemblyReport {
            output: output.to_path_buf(),
            format: expected,
            frames: buffer.frames(),
            duration_ms: buffer.duration_ms(),
            transitions,
        };
        info!(
            output = %output.display(),
            stems = stems.len(),
            duration_ms = report.duration_ms,
            "Assembled message"
        );
        Ok(report)
    }

    /// Append `next` to `buffer`; returns the applied (crossfade, gap) frames
    ///
    /// Both clips must share a format.
    pub fn join(&self, buffer: &mut Clip, next: &Clip, timing: TransitionTiming) -> (usize, usize) {
        let channels = buffer.format.channels.max(1) as usize;
        let sample_rate = buffer.format.sample_rate;

        let gap_frames = ms_to_samples(timing.gap_ms, sample_rate);
        let crossfade_frames = ms_to_samples(timing.crossfade_ms, sample_rate)
            .min(buffer.frames())
            .min(next.frames());

        let gap = std::iter::repeat(0.0f32).take(gap_frames * channels);

        if crossfade_frames == 0 {
            buffer.samples.extend(gap);
            buffer.samples.extend_from_slice(&next.samples);
            return (0, gap_frames);
        }

        let overlap_start = buffer.samples.len() - crossfade_frames * channels;
        for frame in 0..crossfade_frames {
            let fade_out = self.curve.fade_out_at(frame, crossfade_frames);
            let fade_in = self.curve.fade_in_at(frame, crossfade_frames);
            for ch in 0..channels {
                let idx = frame * channels + ch;
                let a = buffer.samples[overlap_start + idx];
                let b = next.samples[idx];
                buffer.samples[overlap_start + idx] = a * fade_out + b * fade_in;
            }
        }

        buffer.samples.extend(gap);
        buffer
            .samples
            .extend_from_slice(&next.samples[crossfade_frames * channels..]);

        (crossfade_frames, gap_frames)
    }

    /// Linear fade to silence over the last `tail_fade_ms`
    pub fn apply_tail_fade(&self, clip: &mut Clip) {
        let channels = clip.format.channels.max(1) as usize;
        let fade_frames = ms_to_samples(self.tail_fade_ms, clip.format.sample_rate).min(clip.frames());
        if fade_frames == 0 {
            return;
        }

        let start = clip.samples.len() - fade_frames * channels;
        for frame in 0..fade_frames {
            let gain = FadeCurve::Linear.fade_out_at(frame, fade_frames);
            for ch in 0..channels {
                clip.samples[start + frame * channels + ch] *= gain;
            }
        }
    }
}

/// Segment id of a stem path: its file name without extension
pub fn segment_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
