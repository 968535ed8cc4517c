//! Configuration loading and root folder resolution
//!
//! Configuration lives in a TOML file (`~/.config/stemkit/config.toml` by
//! default). Every field has a default, so a missing or unreadable file
//! never stops the engine; it is logged and defaults are used instead.

use crate::contract::SynthesisContract;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "STEMKIT_ROOT_FOLDER";

/// Environment variable pointing at an explicit config file
pub const CONFIG_FILE_ENV: &str = "STEMKIT_CONFIG";

pub const VOICE_ID_ENV: &str = "STEMKIT_VOICE_ID";
pub const MODEL_ID_ENV: &str = "STEMKIT_MODEL_ID";
pub const SAMPLE_RATE_ENV: &str = "STEMKIT_SAMPLE_RATE";
pub const PROVIDER_VERSION_ENV: &str = "STEMKIT_PROVIDER_VERSION";

/// Engine configuration
///
/// Paths left unset are derived from the resolved root folder, see
/// [`EngineConfig::paths`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub root_folder: Option<PathBuf>,
    pub stems_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub index_file: Option<PathBuf>,
    pub rotation_file: Option<PathBuf>,

    /// Directory acting as the remote bucket; `None` runs local-only
    pub remote_root: Option<PathBuf>,
    /// Object prefix for stems in the remote store
    pub remote_prefix: String,

    pub cache_ttl_days: i64,

    /// Concurrent synthesis / repair workers
    pub workers: usize,
    /// Extra attempts after a failed synthesis call
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub provider_timeout_secs: u64,
    pub storage_timeout_secs: u64,

    /// Linear fade applied to the end of every assembled message
    pub tail_fade_ms: f64,

    pub contract: SynthesisContract,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            stems_dir: None,
            output_dir: None,
            index_file: None,
            rotation_file: None,
            remote_root: None,
            remote_prefix: "stems".to_string(),
            cache_ttl_days: 30,
            workers: 4,
            retries: 2,
            retry_delay_ms: 1000,
            provider_timeout_secs: 60,
            storage_timeout_secs: 30,
            tail_fade_ms: 5.0,
            contract: SynthesisContract::default(),
        }
    }
}

/// Concrete file locations derived from a root folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub root: PathBuf,
    pub stems_dir: PathBuf,
    pub output_dir: PathBuf,
    pub index_file: PathBuf,
    pub rotation_file: PathBuf,
}

impl EngineConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration, falling back to defaults
    ///
    /// `path` wins over `STEMKIT_CONFIG`, which wins over the platform
    /// config file. Contract environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Self {
        let candidate = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from))
            .or_else(default_config_path);

        let mut config = match candidate {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(content) => match Self::from_toml_str(&content) {
                    Ok(config) => {
                        debug!(path = %path.display(), "Loaded configuration");
                        config
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Ignoring unparsable config file");
                        Self::default()
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Could not read config file");
                    Self::default()
                }
            },
            Some(path) => {
                debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config
    }

    /// Apply `STEMKIT_*` contract overrides from the environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(voice) = std::env::var(VOICE_ID_ENV) {
            self.contract.voice_id = voice;
        }
        if let Ok(model) = std::env::var(MODEL_ID_ENV) {
            self.contract.model_id = model;
        }
        if let Ok(rate) = std::env::var(SAMPLE_RATE_ENV) {
            match rate.trim().parse::<u32>() {
                Ok(rate) => self.contract.sample_rate = rate,
                Err(_) => warn!(value = %rate, "Ignoring invalid {}", SAMPLE_RATE_ENV),
            }
        }
        if let Ok(version) = std::env::var(PROVIDER_VERSION_ENV) {
            self.contract.provider_version = version;
        }
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.contract.sample_rate == 0 {
            return Err(Error::Config("contract.sample_rate must be positive".to_string()));
        }
        if self.cache_ttl_days < 0 {
            return Err(Error::Config("cache_ttl_days must not be negative".to_string()));
        }
        if !self.tail_fade_ms.is_finite() || self.tail_fade_ms < 0.0 {
            return Err(Error::Config("tail_fade_ms must be a non-negative number".to_string()));
        }
        if self.contract.voice_id.trim().is_empty() {
            // Cache maintenance works without a voice; synthesis refuses it
            warn!("contract.voice_id is empty; set STEMKIT_VOICE_ID or [contract].voice_id before synthesizing");
        }
        Ok(())
    }

    /// Derive concrete locations under `root`
    pub fn paths(&self, root: &Path) -> ResolvedPaths {
        ResolvedPaths {
            root: root.to_path_buf(),
            stems_dir: self.stems_dir.clone().unwrap_or_else(|| root.join("stems")),
            output_dir: self.output_dir.clone().unwrap_or_else(|| root.join("output")),
            index_file: self
                .index_file
                .clone()
                .unwrap_or_else(|| root.join("stems_index.json")),
            rotation_file: self
                .rotation_file
                .clone()
                .unwrap_or_else(|| root.join("data").join("rotations_meta.json")),
        }
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `STEMKIT_ROOT_FOLDER` environment variable
/// 3. `root_folder` from the TOML config
/// 4. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &EngineConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Platform config file location (`<config dir>/stemkit/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("stemkit").join("config.toml"))
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "macos") {
        // ~/Library/Application Support/stemkit
        dirs::data_dir()
            .map(|d| d.join("stemkit"))
            .unwrap_or_else(|| PathBuf::from("./stemkit_data"))
    } else {
        // ~/.local/share/stemkit, %LOCALAPPDATA%\stemkit
        dirs::data_local_dir()
            .map(|d| d.join("stemkit"))
            .unwrap_or_else(|| PathBuf::from("./stemkit_data"))
    }
}
