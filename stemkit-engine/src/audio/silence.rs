//! Silence stems
//!
//! Zero-valued mono PCM16 clips stored like any other stem under
//! `<stems>/silence/silence.<N>ms.wav`.

use super::wav::{write_clip, AudioFormat, Clip};
use crate::error::Result;
use std::path::{Path, PathBuf};
use stemkit_common::timing::ms_to_samples;
use stemkit_common::StemLabel;
use tracing::debug;

/// Canonical location of a silence stem
pub fn silence_path(stems_dir: &Path, duration_ms: u32) -> PathBuf {
    stems_dir.join(StemLabel::silence(duration_ms).relative_path())
}

/// Build an in-memory silence clip
pub fn silence_clip(duration_ms: u32, sample_rate: u32) -> Clip {
    let frames = ms_to_samples(duration_ms as f64, sample_rate);
    Clip::new(vec![0.0; frames], AudioFormat::pcm16_mono(sample_rate))
}

/// Write a silence stem to `path`, replacing any existing file
pub fn write_silence(path: &Path, duration_ms: u32, sample_rate: u32) -> Result<()> {
    write_clip(path, &silence_clip(duration_ms, sample_rate))
}

/// Return the silence stem for `duration_ms`, creating it when missing
pub fn ensure_silence(stems_dir: &Path, duration_ms: u32, sample_rate: u32) -> Result<PathBuf> {
    let path = silence_path(stems_dir, duration_ms);
    if !path.is_file() {
        write_silence(&path, duration_ms, sample_rate)?;
        debug!(path = %path.display(), duration_ms, "Created silence stem");
    }
    Ok(path)
}
