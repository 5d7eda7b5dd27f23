//! Gain stage
//!
//! dB-addressed volume control used for the master bus input and output trims.

use super::{db_to_linear, AudioProcessor};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Minimum gain in dB (-96 dB = effectively silent)
pub const MIN_GAIN_DB: f32 = -96.0;

/// Maximum gain in dB (+24 dB)
pub const MAX_GAIN_DB: f32 = 24.0;

// ============================================================================
// Gain Stage
// ============================================================================

/// Simple gain adjustment stage
///
/// # Parameters
/// - `gain_db`: Gain in decibels (-96 to +24 dB)
///
/// # Example
/// ```
/// use deckflow::dsp::{AudioProcessor, Gain};
///
/// let mut gain = Gain::new(-6.0);
/// let mut buffer = vec![1.0_f32; 4];
/// gain.process(&mut buffer);
/// assert!((buffer[0] - 0.501).abs() < 0.001);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gain {
    gain_db: f32,
    #[serde(skip)]
    gain_linear: f32,
}

impl Gain {
    /// Create a new gain stage, clamping `gain_db` to the valid range
    pub fn new(gain_db: f32) -> Self {
        let clamped = gain_db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        Self {
            gain_db: clamped,
            gain_linear: db_to_linear(clamped),
        }
    }

    /// Set the gain in decibels
    pub fn set_gain_db(&mut self, db: f32) {
        self.gain_db = db.clamp(MIN_GAIN_DB, MAX_GAIN_DB);
        self.gain_linear = db_to_linear(self.gain_db);
    }

    /// Get the current gain in decibels
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Get the current linear gain multiplier
    pub fn gain_linear(&self) -> f32 {
        self.gain_linear
    }

    /// Whether this stage would leave samples untouched
    pub fn is_unity(&self) -> bool {
        (self.gain_linear - 1.0).abs() < f32::EPSILON
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl AudioProcessor for Gain {
    fn process(&mut self, buffer: &mut [f32]) {
        // Unity gain optimization
        if self.is_unity() {
            return;
        }

        for sample in buffer.iter_mut() {
            *sample *= self.gain_linear;
        }
    }

    fn prepare(&mut self, _sample_rate: u32, _channels: usize) {
        // Update linear cache in case gain_db was deserialized
        self.gain_linear = db_to_linear(self.gain_db);
    }

    fn reset(&mut self) {
        // Gain has no internal state to reset
    }

    fn processor_type(&self) -> &'static str {
        "gain"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_gain_new_clamps() {
        assert_eq!(Gain::new(-200.0).gain_db(), MIN_GAIN_DB);
        assert_eq!(Gain::new(100.0).gain_db(), MAX_GAIN_DB);
        assert_abs_diff_eq!(Gain::new(-6.0).gain_linear(), 0.501187, epsilon = 1e-4);
    }

    #[test]
    fn test_gain_unity_passthrough() {
        let mut gain = Gain::default();
        let mut buffer = vec![0.3, -0.7, 1.5];
        gain.process(&mut buffer);
        assert_eq!(buffer, vec![0.3, -0.7, 1.5]);
    }

    #[test]
    fn test_gain_process() {
        let mut gain = Gain::new(6.0);
        let mut buffer = vec![0.25_f32; 8];
        gain.process(&mut buffer);
        for sample in buffer {
            assert_abs_diff_eq!(sample, 0.25 * 1.995262, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_gain_prepare_restores_linear_after_deserialize() {
        let json = serde_json::json!({ "gain_db": -20.0 });
        let mut gain: Gain = serde_json::from_value(json).unwrap();
        assert_eq!(gain.gain_linear(), 0.0);
        gain.prepare(44100, 2);
        assert_abs_diff_eq!(gain.gain_linear(), 0.1, epsilon = 1e-6);
    }
}
