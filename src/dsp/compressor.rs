//! Bus glue compressor
//!
//! Hard-knee, feed-forward compressor driven by a single one-pole envelope
//! follower. The follower runs over the interleaved stream sample by sample,
//! so all channels share one detector. No make-up gain is applied.

use super::{db_to_linear, linear_to_db, time_to_coeff, AudioProcessor};
use crate::error::{DeckflowError, Result};
use serde::{Deserialize, Serialize};

/// Compressor parameters with validation ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressorParams {
    /// Threshold level in dB (-60 to 0 dB)
    pub threshold_db: f32,
    /// Compression ratio (1.0 to 20.0, representing 1:1 to 20:1)
    pub ratio: f32,
    /// Attack time in milliseconds (0.1 to 100 ms)
    pub attack_ms: f32,
    /// Release time in milliseconds (10 to 1000 ms)
    pub release_ms: f32,
}

impl Default for CompressorParams {
    fn default() -> Self {
        Self {
            threshold_db: -10.0,
            ratio: 2.0,
            attack_ms: 10.0,
            release_ms: 100.0,
        }
    }
}

impl CompressorParams {
    /// Validate parameters against their ranges
    pub fn validate(&self) -> Result<()> {
        check_range("threshold_db", self.threshold_db, -60.0, 0.0, "-60 to 0 dB")?;
        check_range("ratio", self.ratio, 1.0, 20.0, "1 to 20")?;
        check_range("attack_ms", self.attack_ms, 0.1, 100.0, "0.1 to 100 ms")?;
        check_range("release_ms", self.release_ms, 10.0, 1000.0, "10 to 1000 ms")?;
        Ok(())
    }

    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        self.threshold_db = self.threshold_db.clamp(-60.0, 0.0);
        self.ratio = self.ratio.clamp(1.0, 20.0);
        self.attack_ms = self.attack_ms.clamp(0.1, 100.0);
        self.release_ms = self.release_ms.clamp(10.0, 1000.0);
    }
}

pub(crate) fn check_range(
    param: &str,
    value: f32,
    min: f32,
    max: f32,
    expected: &str,
) -> Result<()> {
    if !value.is_finite() || value < min || value > max {
        return Err(DeckflowError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        });
    }
    Ok(())
}

/// Envelope-follower compressor
#[derive(Debug, Clone)]
pub struct Compressor {
    params: CompressorParams,
    sample_rate: u32,
    /// Linear threshold, cached from `params.threshold_db`
    threshold_linear: f32,
    attack_coeff: f32,
    release_coeff: f32,
    /// Current envelope level (linear)
    envelope: f32,
    /// Last applied gain (linear), for metering
    last_gain: f32,
}

impl Compressor {
    /// Create a new compressor with default parameters
    pub fn new(sample_rate: u32) -> Self {
        Self::with_params(CompressorParams::default(), sample_rate)
    }

    /// Create a new compressor with custom parameters (clamped)
    pub fn with_params(mut params: CompressorParams, sample_rate: u32) -> Self {
        params.clamp();
        let mut comp = Self {
            params,
            sample_rate,
            threshold_linear: 1.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            last_gain: 1.0,
        };
        comp.update_coefficients();
        comp
    }

    /// Get the current parameters
    pub fn params(&self) -> &CompressorParams {
        &self.params
    }

    /// Set the parameters (clamped)
    pub fn set_params(&mut self, mut params: CompressorParams) {
        params.clamp();
        self.params = params;
        self.update_coefficients();
    }

    /// Set threshold in dB
    pub fn set_threshold_db(&mut self, threshold_db: f32) {
        self.params.threshold_db = threshold_db.clamp(-60.0, 0.0);
        self.update_coefficients();
    }

    /// Set compression ratio (1:1 to 20:1)
    pub fn set_ratio(&mut self, ratio: f32) {
        self.params.ratio = ratio.clamp(1.0, 20.0);
    }

    /// Set attack time in milliseconds
    pub fn set_attack_ms(&mut self, attack_ms: f32) {
        self.params.attack_ms = attack_ms.clamp(0.1, 100.0);
        self.update_coefficients();
    }

    /// Set release time in milliseconds
    pub fn set_release_ms(&mut self, release_ms: f32) {
        self.params.release_ms = release_ms.clamp(10.0, 1000.0);
        self.update_coefficients();
    }

    /// Current envelope level (linear)
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    /// Gain reduction applied to the most recent sample, in dB (<= 0)
    pub fn gain_reduction_db(&self) -> f32 {
        linear_to_db(self.last_gain)
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = time_to_coeff(self.params.attack_ms, self.sample_rate);
        self.release_coeff = time_to_coeff(self.params.release_ms, self.sample_rate);
        self.threshold_linear = db_to_linear(self.params.threshold_db);
    }

    /// Gain for the current envelope; 1.0 at or below threshold
    #[inline]
    fn compute_gain(&self) -> f32 {
        if self.envelope <= self.threshold_linear {
            return 1.0;
        }
        let db_over = 20.0 * (self.envelope / self.threshold_linear).log10();
        let reduction_db = db_over - db_over / self.params.ratio;
        10.0_f32.powf(-reduction_db / 20.0)
    }
}

impl AudioProcessor for Compressor {
    fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let rectified = sample.abs();
            let coeff = if rectified > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * rectified;

            let gain = self.compute_gain();
            self.last_gain = gain;
            if gain < 1.0 {
                *sample *= gain;
            }
        }
    }

    fn prepare(&mut self, sample_rate: u32, _channels: usize) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
        self.last_gain = 1.0;
    }

    fn processor_type(&self) -> &'static str {
        "compressor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sine(amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect()
    }

    #[test]
    fn test_default_params_are_valid() {
        let params = CompressorParams::default();
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_parameter_validation() {
        let mut params = CompressorParams::default();

        params.threshold_db = -70.0;
        assert!(params.validate().is_err());
        params.threshold_db = -10.0;

        params.ratio = 0.5;
        assert!(params.validate().is_err());
        params.ratio = 2.0;

        params.attack_ms = 0.01;
        assert!(params.validate().is_err());
        params.attack_ms = 10.0;

        params.release_ms = f32::NAN;
        let err = params.validate().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PARAMETER");
    }

    #[test]
    fn test_parameter_clamping() {
        let mut params = CompressorParams {
            threshold_db: -100.0,
            ratio: 50.0,
            attack_ms: 0.001,
            release_ms: 5000.0,
        };
        params.clamp();
        assert_eq!(params.threshold_db, -60.0);
        assert_eq!(params.ratio, 20.0);
        assert_eq!(params.attack_ms, 0.1);
        assert_eq!(params.release_ms, 1000.0);
    }

    #[test]
    fn test_passthrough_below_threshold() {
        let mut comp = Compressor::with_params(
            CompressorParams {
                threshold_db: -6.0,
                ..Default::default()
            },
            44100,
        );

        // 0.4 peak is below the ~0.501 linear threshold
        let input = sine(0.4, 4410);
        let mut output = input.clone();
        comp.process(&mut output);

        assert_eq!(output, input);
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_reduces_signal_above_threshold() {
        let mut comp = Compressor::with_params(
            CompressorParams {
                threshold_db: -20.0,
                ratio: 4.0,
                attack_ms: 0.1,
                release_ms: 10.0,
            },
            44100,
        );

        let mut buffer = vec![0.9_f32; 4410];
        comp.process(&mut buffer);

        // Settled envelope ~0.9: 19.08 dB over, 4:1 keeps a quarter of it
        let settled = buffer[4409];
        let expected_db = -20.0 + linear_to_db(0.9 / 0.1) / 4.0;
        assert_abs_diff_eq!(linear_to_db(settled), expected_db, epsilon = 0.05);
        assert!(comp.gain_reduction_db() < -10.0);
    }

    #[test]
    fn test_ratio_one_is_transparent() {
        let mut comp = Compressor::with_params(
            CompressorParams {
                threshold_db: -40.0,
                ratio: 1.0,
                ..Default::default()
            },
            44100,
        );
        let input = sine(0.8, 1000);
        let mut output = input.clone();
        comp.process(&mut output);
        for (a, b) in input.iter().zip(output.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_reset_clears_envelope() {
        let mut comp = Compressor::new(44100);
        let mut buffer = vec![0.9_f32; 1000];
        comp.process(&mut buffer);
        assert!(comp.envelope() > 0.0);

        comp.reset();
        assert_eq!(comp.envelope(), 0.0);
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_prepare_updates_coefficients() {
        let mut comp = Compressor::new(44100);
        let attack_44k = comp.attack_coeff;
        comp.prepare(96000, 2);
        assert!(comp.attack_coeff > attack_44k);
    }
}
