//! Deckflow - real-time multi-track DJ mix engine
//!
//! Deckflow sums independently positioned clips against one sample clock,
//! computes transition automation between tracks, and runs the mix through
//! a master bus (gain, glue compressor, safety limiter) before it reaches an
//! output sink.
//!
//! # Architecture
//!
//! - [`engine`]: lanes, the mix engine / master clock, WAV I/O
//! - [`transition`]: transition regions and automation
//! - [`dsp`]: curves and the master bus processors
//! - [`output`]: output tiers, sinks and stop notifications
//!
//! ```
//! use deckflow::engine::{Lane, MemorySource, MixEngine};
//!
//! let engine = MixEngine::new(44100, 2);
//! let clip = MemorySource::sine(440.0, 0.5, 44100, 2, 44100);
//! engine.add_lane(Lane::new("track-1", "Intro", Box::new(clip), 0)).unwrap();
//!
//! let mut block = vec![0.0_f32; 1024];
//! engine.read(&mut block);
//! assert_eq!(engine.current_sample_position(), 512);
//! ```

pub mod cli;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod output;
pub mod transition;

pub use config::{EngineConfig, SessionConfig};
pub use engine::{Lane, LaneId, MixEngine};
pub use error::{DeckflowError, Result};
pub use transition::{TransitionAutomation, TransitionEngine, TransitionRegion};
