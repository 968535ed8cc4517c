//! Audio Test File Generation Utilities
//!
//! Deterministic mono 16-bit WAV files with known lengths, matching the
//! synthesis output contract unless stated otherwise.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;
use std::path::Path;

/// Standard test sample rate (48 kHz)
pub const TEST_SAMPLE_RATE: u32 = 48_000;

fn spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

fn frames(sample_rate: u32, duration_ms: u64) -> u64 {
    (sample_rate as u64 * duration_ms) / 1000
}

/// Generate a silent mono WAV file
pub fn generate_silent_wav<P: AsRef<Path>>(path: P, duration_ms: u64, sample_rate: u32) -> Result<(), hound::Error> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = WavWriter::create(path, spec(sample_rate, 1))?;
    for _ in 0..frames(sample_rate, duration_ms) {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Generate a sine wave WAV file
///
/// # Arguments
/// * `duration_ms` - Duration in milliseconds
/// * `frequency_hz` - Sine frequency (e.g. 440.0)
/// * `amplitude` - 0.0-1.0
/// * `channels` - 1 for the contract format, 2 to provoke format mismatches
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    frequency_hz: f32,
    amplitude: f32,
    channels: u16,
) -> Result<(), hound::Error> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = WavWriter::create(path, spec(TEST_SAMPLE_RATE, channels))?;
    for i in 0..frames(TEST_SAMPLE_RATE, duration_ms) {
        let t = i as f32 / TEST_SAMPLE_RATE as f32;
        let sample = (amplitude * (2.0 * PI * frequency_hz * t).sin() * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// In-memory mono sine WAV, as a provider would return it
pub fn sine_wav_bytes(duration_ms: u64, sample_rate: u32) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec(sample_rate, 1)).unwrap();
        for i in 0..frames(sample_rate, duration_ms) {
            let t = i as f32 / sample_rate as f32;
            writer
                .write_sample((0.3 * (2.0 * PI * 220.0 * t).sin() * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
