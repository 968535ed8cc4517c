//! Test helper modules for stemkit-engine integration tests
//!
//! - audio_generator: deterministic WAV files and WAV byte payloads
//! - fakes: scripted synthesis provider and store doubles

#![allow(dead_code)]

pub mod audio_generator;
pub mod fakes;

pub use audio_generator::{generate_silent_wav, generate_sine_wav, sine_wav_bytes, TEST_SAMPLE_RATE};
pub use fakes::{FailingStore, ScriptedProvider};

use std::sync::Arc;
use stemkit_common::SynthesisContract;
use stemkit_engine::cache::StemCache;
use tempfile::TempDir;

/// Contract used across the integration tests
pub fn test_contract() -> SynthesisContract {
    SynthesisContract {
        voice_id: "voice-a".to_string(),
        sample_rate: TEST_SAMPLE_RATE,
        ..SynthesisContract::default()
    }
}

/// Cache rooted in `dir` with a 30 day TTL
pub fn test_cache(dir: &TempDir, contract: SynthesisContract) -> Arc<StemCache> {
    Arc::new(StemCache::new(
        dir.path().join("stems_index.json"),
        dir.path().join("stems"),
        30,
        contract,
    ))
}
