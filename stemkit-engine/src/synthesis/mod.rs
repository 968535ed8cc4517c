//! Speech synthesis collaborators and stem generation
//!
//! The provider itself is opaque: it turns a transcript and a voice into
//! WAV bytes. Everything around it (contract validation, retries,
//! timeouts, atomic writes, cache registration) lives in [`generator`].

use crate::audio::wav::{check_contract, decode_bytes};
use crate::audio::AudioFormat;
use crate::error::Result;
use async_trait::async_trait;

pub mod generator;

pub use generator::{BatchFailure, BatchReport, ResolvedStem, StemGenerator, StemOrigin, StemSource};

/// Speech synthesis provider
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    /// Provider identifier for logs
    fn name(&self) -> &'static str;

    /// Synthesize `text` with `voice_id`
    ///
    /// Returns mono 16-bit PCM WAV bytes at the contract sample rate, or
    /// [`crate::Error::Provider`] when the call fails.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>>;
}

/// Validated provider audio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioCheck {
    pub format: AudioFormat,
    pub frames: usize,
    pub duration_ms: f64,
}

/// Check provider bytes: parseable WAV, mono, 16-bit PCM, contract rate, non-empty
pub fn validate_wav_bytes(bytes: &[u8], sample_rate: u32) -> Result<AudioCheck> {
    if bytes.is_empty() {
        return Err(crate::Error::Provider("empty audio response".to_string()));
    }
    let clip = decode_bytes(bytes)
        .map_err(|e| crate::Error::Provider(format!("malformed WAV from provider: {}", e)))?;
    check_contract(&clip, sample_rate)?;

    Ok(AudioCheck {
        format: clip.format,
        frames: clip.frames(),
        duration_ms: clip.duration_ms(),
    })
}
