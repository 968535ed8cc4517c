//! # stemkit Common Library
//!
//! Shared code for the stemkit crates including:
//! - Configuration loading and root folder resolution
//! - Synthesis contract and contract signatures
//! - Stem labels and categories
//! - Timing map types and sample/millisecond conversions
//! - Fade curve definitions and calculations
//! - Time helpers

pub mod config;
pub mod contract;
pub mod error;
pub mod fade_curves;
pub mod label;
pub mod time;
pub mod timing;

pub use config::{EngineConfig, ResolvedPaths};
pub use contract::{contract_signature, SignatureInput, SynthesisContract};
pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
pub use label::{StemCategory, StemLabel};
pub use timing::{TimingMap, Transition, TransitionTiming};
