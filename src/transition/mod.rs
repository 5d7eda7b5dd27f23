//! Transition automation
//!
//! A [`TransitionRegion`] declares when two tracks hand over and how. The
//! [`TransitionEngine`] turns a region and a timeline position into
//! [`TransitionAutomation`] gains.

mod automation;
mod engine;
mod region;

pub use automation::{calculate_automation, TransitionAutomation};
pub use engine::TransitionEngine;
pub use region::{EqSwapConfig, TransitionRegion, TransitionType};
