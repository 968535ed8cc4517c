//! Rotation selector: fair least-used selection over personalization datasets

pub mod selector;
pub mod state;

pub use selector::{DatasetSource, RotationPair, RotationSelector, RotationStats, StaticDataset};
pub use state::{ItemUsage, RotationCategory, RotationState};
