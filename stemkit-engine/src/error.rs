//! Error types for stemkit-engine
//!
//! Defines the engine error taxonomy using thiserror. Caller errors
//! (`InvalidLabel`, `EmptyInput`, `InvalidInput`) are rejected immediately;
//! `Provider` and `Timeout` are the retryable kinds.

use crate::audio::AudioFormat;
use thiserror::Error;

/// Main error type for stemkit-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Stems disagree on sample rate, channel count or bit depth
    #[error("Format mismatch in {file}: expected {expected}, got {actual}")]
    FormatMismatch {
        file: String,
        expected: AudioFormat,
        actual: AudioFormat,
    },

    /// Synthesis call failed or returned malformed audio
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider or store call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Remote store disabled or unreachable
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Cache index could not be read
    #[error("Cache corruption: {0}")]
    CacheCorruption(String),

    /// Malformed stem label
    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    /// Required input list was empty
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Invalid caller input (timing maps, plans)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV encode/decode errors
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// JSON state file errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors from stemkit-common that have no engine counterpart
    #[error(transparent)]
    Common(stemkit_common::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a failed attempt should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Provider(_) | Error::Timeout(_))
    }
}

impl From<stemkit_common::Error> for Error {
    fn from(err: stemkit_common::Error) -> Self {
        match err {
            stemkit_common::Error::InvalidLabel(msg) => Error::InvalidLabel(msg),
            stemkit_common::Error::InvalidInput(msg) => Error::InvalidInput(msg),
            stemkit_common::Error::Io(e) => Error::Io(e),
            other => Error::Common(other),
        }
    }
}

/// Convenience Result type using stemkit-engine Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(Error::Provider("503".into()).is_retryable());
        assert!(Error::Timeout("synthesize".into()).is_retryable());
        assert!(!Error::InvalidLabel("x".into()).is_retryable());
        assert!(!Error::EmptyInput("stems".into()).is_retryable());
    }

    #[test]
    fn test_common_errors_map_to_engine_kinds() {
        let err: Error = stemkit_common::Error::InvalidLabel("bad".into()).into();
        assert!(matches!(err, Error::InvalidLabel(_)));

        let err: Error = stemkit_common::Error::Config("oops".into()).into();
        assert!(matches!(err, Error::Common(_)));
    }

    #[test]
    fn test_format_mismatch_message_names_file() {
        let err = Error::FormatMismatch {
            file: "b.wav".into(),
            expected: AudioFormat::pcm16_mono(48_000),
            actual: AudioFormat::pcm16_mono(44_100),
        };
        let msg = err.to_string();
        assert!(msg.contains("b.wav"));
        assert!(msg.contains("48000"));
        assert!(msg.contains("44100"));
    }
}
