//! Safety limiter
//!
//! Final ceiling on the master bus. Every sample whose magnitude exceeds the
//! threshold is replaced by `sign(sample) * threshold`. NaN samples become
//! silence and infinities are clamped like any other over.
//!
//! A look-ahead buffer is sized from `lookahead_ms`, but processing is an
//! instantaneous hard clip: no delay compensation is applied, so peaks are
//! squared off rather than smoothly attenuated.

use super::compressor::check_range;
use super::{db_to_linear, AudioProcessor};
use crate::error::Result;
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Minimum threshold in dB
const MIN_THRESHOLD_DB: f32 = -12.0;
/// Maximum threshold in dB
const MAX_THRESHOLD_DB: f32 = 0.0;
/// Maximum look-ahead in ms
const MAX_LOOKAHEAD_MS: f32 = 20.0;

/// Limiter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterParams {
    /// Output ceiling in dB (-12 to 0 dB)
    pub threshold_db: f32,
    /// Look-ahead window in milliseconds (0 to 20 ms)
    pub lookahead_ms: f32,
}

impl Default for LimiterParams {
    fn default() -> Self {
        Self {
            threshold_db: -0.3,
            lookahead_ms: 5.0,
        }
    }
}

impl LimiterParams {
    /// Validate parameters against their ranges
    pub fn validate(&self) -> Result<()> {
        check_range(
            "threshold_db",
            self.threshold_db,
            MIN_THRESHOLD_DB,
            MAX_THRESHOLD_DB,
            "-12 to 0 dB",
        )?;
        check_range(
            "lookahead_ms",
            self.lookahead_ms,
            0.0,
            MAX_LOOKAHEAD_MS,
            "0 to 20 ms",
        )?;
        Ok(())
    }

    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        self.threshold_db = self.threshold_db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB);
        self.lookahead_ms = self.lookahead_ms.clamp(0.0, MAX_LOOKAHEAD_MS);
    }
}

/// Brick-wall limiter
#[derive(Debug, Clone)]
pub struct Limiter {
    params: LimiterParams,
    threshold_linear: f32,
    sample_rate: u32,
    channels: usize,
    lookahead: Vec<f32>,
}

impl Limiter {
    /// Create a limiter with the given ceiling and look-ahead
    pub fn new(mut params: LimiterParams, sample_rate: u32, channels: usize) -> Self {
        params.clamp();
        let mut limiter = Self {
            threshold_linear: db_to_linear(params.threshold_db),
            params,
            sample_rate,
            channels: channels.max(1),
            lookahead: Vec::new(),
        };
        limiter.allocate_lookahead();
        limiter
    }

    /// Get the current parameters
    pub fn params(&self) -> &LimiterParams {
        &self.params
    }

    /// Set ceiling in dB
    pub fn set_threshold_db(&mut self, db: f32) {
        self.params.threshold_db = db.clamp(MIN_THRESHOLD_DB, MAX_THRESHOLD_DB);
        self.threshold_linear = db_to_linear(self.params.threshold_db);
    }

    /// Set look-ahead in milliseconds; reallocates the look-ahead buffer
    pub fn set_lookahead_ms(&mut self, ms: f32) {
        self.params.lookahead_ms = ms.clamp(0.0, MAX_LOOKAHEAD_MS);
        self.allocate_lookahead();
    }

    /// Ceiling as linear amplitude
    pub fn threshold_linear(&self) -> f32 {
        self.threshold_linear
    }

    /// Frames held by the look-ahead buffer
    pub fn lookahead_frames(&self) -> usize {
        self.lookahead.len() / self.channels
    }

    fn allocate_lookahead(&mut self) {
        let frames = (self.params.lookahead_ms / 1000.0 * self.sample_rate as f32).round() as usize;
        self.lookahead = vec![0.0; frames * self.channels];
    }
}

impl AudioProcessor for Limiter {
    fn process(&mut self, buffer: &mut [f32]) {
        let threshold = self.threshold_linear;
        for sample in buffer.iter_mut() {
            if sample.is_nan() {
                *sample = 0.0;
            } else if sample.abs() > threshold {
                *sample = sample.signum() * threshold;
            }
        }
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.sample_rate = sample_rate;
        self.channels = channels.max(1);
        self.allocate_lookahead();
    }

    fn reset(&mut self) {
        self.lookahead.iter_mut().for_each(|s| *s = 0.0);
    }

    fn processor_type(&self) -> &'static str {
        "limiter"
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
    fn test_limiter_ceiling_holds() {
        let mut limiter = Limiter::new(
            LimiterParams {
                threshold_db: -6.0,
                lookahead_ms: 5.0,
            },
            44100,
            2,
        );
        let mut buffer: Vec<f32> = (0..2000).map(|i| ((i as f32) * 0.37).sin() * 3.0).collect();
        limiter.process(&mut buffer);

        let ceiling = limiter.threshold_linear();
        assert!(buffer.iter().all(|s| s.abs() <= ceiling));
    }

    #[test]
    fn test_limiter_is_instantaneous_clip() {
        let mut limiter = Limiter::new(
            LimiterParams {
                threshold_db: 0.0,
                lookahead_ms: 10.0,
            },
            48000,
            2,
        );
        let mut buffer = vec![0.5, 2.0, -3.0, 0.99, -0.2, 1.0];
        limiter.process(&mut buffer);
        // No delay: samples stay in place, only overs are squared off
        assert_eq!(buffer, vec![0.5, 1.0, -1.0, 0.99, -0.2, 1.0]);
    }

    #[test]
    fn test_non_finite_samples_respect_ceiling() {
        let mut limiter = Limiter::new(
            LimiterParams {
                threshold_db: -1.0,
                lookahead_ms: 5.0,
            },
            44100,
            2,
        );
        let ceiling = limiter.threshold_linear();
        let mut buffer = vec![f32::NAN, 0.5, f32::INFINITY, f32::NEG_INFINITY];
        limiter.process(&mut buffer);

        assert!(buffer.iter().all(|s| s.abs() <= ceiling));
        assert_eq!(buffer[0], 0.0);
        assert_eq!(buffer[1], 0.5);
        assert_eq!(buffer[2], ceiling);
        assert_eq!(buffer[3], -ceiling);
    }

    #[test]
    fn test_lookahead_buffer_sizing() {
        let mut limiter = Limiter::new(LimiterParams::default(), 48000, 2);
        assert_eq!(limiter.lookahead_frames(), 240);

        limiter.set_lookahead_ms(10.0);
        assert_eq!(limiter.lookahead_frames(), 480);

        limiter.prepare(96000, 2);
        assert_eq!(limiter.lookahead_frames(), 960);
    }

    #[test]
    fn test_params_clamp_and_validate() {
        let limiter = Limiter::new(
            LimiterParams {
                threshold_db: 6.0,
                lookahead_ms: 100.0,
            },
            44100,
            2,
        );
        assert_eq!(limiter.params().threshold_db, 0.0);
        assert_eq!(limiter.params().lookahead_ms, 20.0);
        assert_abs_diff_eq!(limiter.threshold_linear(), 1.0);

        assert!(LimiterParams::default().validate().is_ok());
        let bad = LimiterParams {
            threshold_db: -30.0,
            lookahead_ms: 5.0,
        };
        assert!(bad.validate().is_err());
    }
}
