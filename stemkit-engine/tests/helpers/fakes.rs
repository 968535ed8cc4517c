//! Collaborator doubles
//!
//! `ScriptedProvider` fails a configurable number of times per transcript
//! before answering, and counts every call.

use super::audio_generator::sine_wav_bytes;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use stemkit_engine::storage::{Listing, RemoteStore, UploadOutcome};
use stemkit_engine::synthesis::SynthesisProvider;
use stemkit_engine::{Error, Result};

/// What the provider answers once its scripted failures are used up
#[derive(Debug, Clone)]
pub enum Reply {
    Wav { duration_ms: u64, sample_rate: u32 },
    Bytes(Vec<u8>),
}

pub struct ScriptedProvider {
    reply: Reply,
    /// Remaining failures per transcript
    failures: Mutex<HashMap<String, usize>>,
    /// Transcripts that always fail
    broken: Vec<String>,
    calls: AtomicUsize,
    voices: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// Always answers with 200 ms of contract-conformant audio
    pub fn new(sample_rate: u32) -> Self {
        Self::with_reply(Reply::Wav {
            duration_ms: 200,
            sample_rate,
        })
    }

    pub fn with_reply(reply: Reply) -> Self {
        Self {
            reply,
            failures: Mutex::new(HashMap::new()),
            broken: Vec::new(),
            calls: AtomicUsize::new(0),
            voices: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first `count` calls for `text`
    pub fn failing(self, text: &str, count: usize) -> Self {
        self.failures.lock().unwrap().insert(text.to_string(), count);
        self
    }

    /// Fail every call for `text`
    pub fn broken(mut self, text: &str) -> Self {
        self.broken.push(text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn voices(&self) -> Vec<String> {
        self.voices.lock().unwrap().clone()
    }
}

#[async_trait]
impl SynthesisProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.voices.lock().unwrap().push(voice_id.to_string());

        if self.broken.iter().any(|b| b == text) {
            return Err(Error::Provider(format!("provider rejected {:?}", text)));
        }
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(text) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Error::Provider("transient provider failure".to_string()));
                }
            }
        }

        Ok(match &self.reply {
            Reply::Wav {
                duration_ms,
                sample_rate,
            } => sine_wav_bytes(*duration_ms, *sample_rate),
            Reply::Bytes(bytes) => bytes.clone(),
        })
    }
}

/// Enabled store whose every operation fails
pub struct FailingStore;

#[async_trait]
impl RemoteStore for FailingStore {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn exists(&self, _remote_path: &str) -> bool {
        false
    }

    async fn upload(&self, _local_path: &Path, remote_path: &str) -> UploadOutcome {
        UploadOutcome::failure(remote_path, "bucket unreachable")
    }

    async fn list(&self, _prefix: &str) -> Listing {
        Listing::failure("bucket unreachable")
    }
}
