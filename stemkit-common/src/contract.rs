//! Synthesis contract and contract signatures
//!
//! Every stem is produced under a synthesis contract: the voice, model,
//! output format and provider API version that shaped its audio. The
//! contract signature binds a cached stem to the parameters that produced
//! it, so a change to any of them turns the cached entry into a miss.
//!
//! The signature is the first 16 hex characters of a SHA-256 digest over a
//! key-sorted JSON object of the six signature inputs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest
pub const SIGNATURE_LEN: usize = 16;

pub const DEFAULT_MODEL_ID: &str = "sonic-3";
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_ENCODING: &str = "pcm_s16le";
pub const DEFAULT_CONTAINER: &str = "wav";
pub const DEFAULT_PROVIDER_VERSION: &str = "2025-04-16";

/// Output contract every stem must satisfy
///
/// Stems are always mono 16-bit PCM at `sample_rate`. The contract is
/// passed explicitly to the cache and the generator; nothing reads it from
/// process state after configuration load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisContract {
    pub voice_id: String,
    pub model_id: String,
    pub sample_rate: u32,
    pub encoding: String,
    pub container: String,
    pub provider_version: String,
}

impl Default for SynthesisContract {
    fn default() -> Self {
        Self {
            voice_id: String::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            encoding: DEFAULT_ENCODING.to_string(),
            container: DEFAULT_CONTAINER.to_string(),
            provider_version: DEFAULT_PROVIDER_VERSION.to_string(),
        }
    }
}

impl SynthesisContract {
    /// Signature of `text` synthesized under this contract
    pub fn signature_for(&self, text: &str) -> String {
        contract_signature(&self.signature_input(text))
    }

    /// Borrow the signature inputs for `text`
    pub fn signature_input<'a>(&'a self, text: &'a str) -> SignatureInput<'a> {
        SignatureInput {
            text,
            voice_id: &self.voice_id,
            model_id: &self.model_id,
            sample_rate: self.sample_rate,
            encoding: &self.encoding,
            provider_version: &self.provider_version,
        }
    }
}

/// The six parameters a contract signature covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureInput<'a> {
    pub text: &'a str,
    pub voice_id: &'a str,
    pub model_id: &'a str,
    pub sample_rate: u32,
    pub encoding: &'a str,
    pub provider_version: &'a str,
}

/// Compute the contract signature for a set of synthesis parameters
///
/// Pure and deterministic. The canonical form is a JSON object whose keys
/// are emitted in sorted order, so field order never affects the result.
pub fn contract_signature(input: &SignatureInput<'_>) -> String {
    let mut fields = Map::new();
    fields.insert("encoding".into(), Value::from(input.encoding));
    fields.insert("model_id".into(), Value::from(input.model_id));
    fields.insert("provider_version".into(), Value::from(input.provider_version));
    fields.insert("sample_rate".into(), Value::from(input.sample_rate));
    fields.insert("text".into(), Value::from(input.text));
    fields.insert("voice_id".into(), Value::from(input.voice_id));

    let canonical = Value::Object(fields).to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let hex = format!("{:x}", digest);
    hex[..SIGNATURE_LEN].to_string()
}
