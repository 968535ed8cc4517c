//! # stemkit Engine Library (stemkit-engine)
//!
//! Stem lifecycle engine for personalized voice messages.
//!
//! **Purpose:** Decide whether a speech stem must be (re)synthesized, merge
//! ordered stems sample-accurately into a finished message, rotate fairly
//! through personalization datasets, and keep the local stem store
//! consistent with a remote copy.
//!
//! **Components:**
//! - [`cache`]: contract-aware stem cache over a JSON index
//! - [`audio`]: WAV I/O, crossfade assembler, silence stems
//! - [`rotation`]: least-used rotation selector
//! - [`synthesis`]: provider trait, cache-aware generator, batch generation
//! - [`storage`]: remote store trait and adapters
//! - [`consistency`]: local/remote comparison and repair
//! - [`pipeline`]: rotation -> stems -> assembled message

pub mod audio;
pub mod cache;
pub mod consistency;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod rotation;
pub mod storage;
pub mod synthesis;

pub use error::{Error, Result};
