//! Mixing engine
//!
//! - Decoder abstraction and in-memory sources
//! - WAV import/export
//! - Lane sampler
//! - Mix engine / master clock

pub mod io;
pub mod lane;
pub mod mixer;
pub mod source;

pub use io::{load_wav, write_wav, BitDepth};
pub use lane::{Lane, LaneId, LaneRead};
pub use mixer::{LaneInfo, MixEngine};
pub use source::{AudioSource, MemorySource};
