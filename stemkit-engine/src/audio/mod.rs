//! Audio processing: WAV I/O, crossfade assembly and silence stems

pub mod assembler;
pub mod silence;
pub mod wav;

pub use assembler::{AppliedTransition, AssemblyReport, CrossfadeAssembler};
pub use silence::ensure_silence;
pub use wav::{AudioFormat, Clip};
