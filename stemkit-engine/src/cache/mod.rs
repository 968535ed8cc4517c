//! Stem cache: durable label -> metadata registry

pub mod index;
pub mod store;

pub use index::{CacheIndex, StemEntry};
pub use store::{CacheSummary, CachedStem, Registration, SignatureCounts, StemCache};
