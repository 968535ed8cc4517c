//! WAV file I/O
//!
//! Clips are held as interleaved `f32` samples in -1.0..1.0 together with the
//! format they were read in, so they can be written back without format
//! drift (same rate, channel count, bit depth and sample encoding).

use crate::error::{Error, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Format signature shared by every stem in one assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    /// Mono 16-bit integer PCM at `sample_rate` (the synthesis output contract)
    pub fn pcm16_mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    pub fn spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: self.sample_format,
        }
    }
}

impl From<WavSpec> for AudioFormat {
    fn from(spec: WavSpec) -> Self {
        Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            sample_format: spec.sample_format,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.sample_format {
            SampleFormat::Int => "int",
            SampleFormat::Float => "float",
        };
        write!(
            f,
            "{} Hz / {} ch / {}-bit {}",
            self.sample_rate, self.channels, self.bits_per_sample, kind
        )
    }
}

/// Decoded audio clip
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Interleaved samples, -1.0..1.0
    pub samples: Vec<f32>,
    pub format: AudioFormat,
}

impl Clip {
    pub fn new(samples: Vec<f32>, format: AudioFormat) -> Self {
        Self { samples, format }
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    pub fn duration_ms(&self) -> f64 {
        stemkit_common::timing::samples_to_ms(self.frames(), self.format.sample_rate)
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

/// Read a WAV file into memory
pub fn read_clip(path: &Path) -> Result<Clip> {
    let reader = WavReader::open(path)?;
    decode(reader)
}

/// Decode WAV bytes held in memory
pub fn decode_bytes(bytes: &[u8]) -> Result<Clip> {
    let reader = WavReader::new(Cursor::new(bytes))?;
    decode(reader)
}

fn decode<R: std::io::Read>(reader: WavReader<R>) -> Result<Clip> {
    let format = AudioFormat::from(reader.spec());

    let samples = match format.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = int_scale(format.bits_per_sample);
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(Clip { samples, format })
}

/// Write a clip in its own format
///
/// The file is written next to `path` first and renamed into place, so a
/// reader never observes a half-written stem.
pub fn write_clip(path: &Path, clip: &Clip) -> Result<()> {
    let tmp = temp_path(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let result = write_samples(&tmp, clip);
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Write already-encoded bytes atomically (temp file + rename)
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn write_samples(path: &Path, clip: &Clip) -> Result<()> {
    let mut writer = WavWriter::create(path, clip.format.spec())?;

    match clip.format.sample_format {
        SampleFormat::Float => {
            for &sample in &clip.samples {
                writer.write_sample(sample)?;
            }
        }
        SampleFormat::Int => {
            let scale = int_scale(clip.format.bits_per_sample);
            for &sample in &clip.samples {
                writer.write_sample(quantize(sample, scale))?;
            }
        }
    }

    writer.finalize()?;
    Ok(())
}

fn int_scale(bits_per_sample: u16) -> f32 {
    (1i64 << (bits_per_sample.clamp(1, 32) - 1)) as f32
}

fn quantize(sample: f32, scale: f32) -> i32 {
    (sample * scale).round().clamp(-scale, scale - 1.0) as i32
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Check decoded provider audio against the stem contract
pub fn check_contract(clip: &Clip, sample_rate: u32) -> Result<()> {
    let expected = AudioFormat::pcm16_mono(sample_rate);
    if clip.format != expected {
        return Err(Error::Provider(format!(
            "audio does not match contract: expected {}, got {}",
            expected, clip.format
        )));
    }
    if clip.samples.is_empty() {
        return Err(Error::Provider("audio contains no samples".to_string()));
    }
    Ok(())
}
