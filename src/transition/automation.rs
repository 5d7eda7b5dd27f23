//! Automation values for a transition at one timeline position
//!
//! Each value carries both sides of the transition: an overall gain plus
//! low/mid/high band gains for the outgoing and incoming track. Band gains
//! are multipliers for a per-lane EQ stage.

use serde::Serialize;

use super::region::{TransitionRegion, TransitionType};
use crate::dsp::apply_curve;

/// FilterSweep: how far the outgoing gain dips at full progress
const FILTER_SWEEP_DIP: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransitionAutomation {
    pub outgoing_gain: f32,
    pub incoming_gain: f32,
    pub outgoing_low_gain: f32,
    pub outgoing_mid_gain: f32,
    pub outgoing_high_gain: f32,
    pub incoming_low_gain: f32,
    pub incoming_mid_gain: f32,
    pub incoming_high_gain: f32,
}

impl Default for TransitionAutomation {
    fn default() -> Self {
        Self::neutral()
    }
}

impl TransitionAutomation {
    /// No transition: every gain is 1
    pub const fn neutral() -> Self {
        Self {
            outgoing_gain: 1.0,
            incoming_gain: 1.0,
            outgoing_low_gain: 1.0,
            outgoing_mid_gain: 1.0,
            outgoing_high_gain: 1.0,
            incoming_low_gain: 1.0,
            incoming_mid_gain: 1.0,
            incoming_high_gain: 1.0,
        }
    }

    /// Keep the outgoing half; incoming gains are zeroed
    pub fn outgoing_only(self) -> Self {
        Self {
            incoming_gain: 0.0,
            incoming_low_gain: 0.0,
            incoming_mid_gain: 0.0,
            incoming_high_gain: 0.0,
            ..self
        }
    }

    /// Keep the incoming half; outgoing gains are zeroed
    pub fn incoming_only(self) -> Self {
        Self {
            outgoing_gain: 0.0,
            outgoing_low_gain: 0.0,
            outgoing_mid_gain: 0.0,
            outgoing_high_gain: 0.0,
            ..self
        }
    }

    /// Single multiplier for a lane without an EQ stage
    ///
    /// Takes the side that is not zeroed (outgoing first). Band gains are
    /// ignored.
    pub fn lane_gain(&self) -> f32 {
        let outgoing_silent = self.outgoing_gain == 0.0
            && self.outgoing_low_gain == 0.0
            && self.outgoing_mid_gain == 0.0
            && self.outgoing_high_gain == 0.0;
        if outgoing_silent {
            self.incoming_gain
        } else {
            self.outgoing_gain
        }
    }
}

/// Automation for `region` at timeline `position`
pub fn calculate_automation(region: &TransitionRegion, position: u64) -> TransitionAutomation {
    let progress = region.progress(position);
    let curved = apply_curve(progress, region.curve());
    let mut auto = TransitionAutomation::neutral();

    match region.kind() {
        TransitionType::EqSwap => {
            let eq = region.eq();
            if eq.swap_low {
                auto.outgoing_low_gain = 1.0 - curved;
                auto.incoming_low_gain = curved;
            }
            if eq.swap_mid {
                auto.outgoing_mid_gain = 1.0 - curved;
                auto.incoming_mid_gain = curved;
            }
            if eq.swap_high {
                auto.outgoing_high_gain = 1.0 - curved;
                auto.incoming_high_gain = curved;
            }
        }
        TransitionType::Cut => {
            let switched = progress >= 0.5;
            auto.outgoing_gain = if switched { 0.0 } else { 1.0 };
            auto.incoming_gain = if switched { 1.0 } else { 0.0 };
        }
        TransitionType::FilterSweep => {
            // Highs go first, lows last
            auto.outgoing_high_gain = 1.0 - (curved * 2.0).clamp(0.0, 1.0);
            auto.outgoing_mid_gain = 1.0 - ((curved - 0.25) * 2.0).clamp(0.0, 1.0);
            auto.outgoing_low_gain = 1.0 - ((curved - 0.5) * 2.0).clamp(0.0, 1.0);
            auto.outgoing_gain = 1.0 - FILTER_SWEEP_DIP * progress;
            auto.incoming_gain = progress;
        }
        TransitionType::Crossfade | TransitionType::EchoOut | TransitionType::Backspin => {
            auto.outgoing_gain = 1.0 - curved;
            auto.incoming_gain = curved;
        }
    }

    auto
}
