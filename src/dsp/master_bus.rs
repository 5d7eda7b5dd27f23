//! Master bus
//!
//! Fixed chain applied to the mixed output before it reaches the sink:
//! input gain -> compressor -> limiter -> output gain. Disabled dynamics
//! stages are skipped entirely rather than run at unity.

use super::{AudioProcessor, Compressor, CompressorParams, Gain, Limiter, LimiterParams};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Serializable master bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterBusSettings {
    pub input_gain_db: f32,
    pub output_gain_db: f32,
    pub compressor_enabled: bool,
    pub limiter_enabled: bool,
    pub compressor: CompressorParams,
    pub limiter: LimiterParams,
}

impl Default for MasterBusSettings {
    fn default() -> Self {
        Self {
            input_gain_db: 0.0,
            output_gain_db: 0.0,
            compressor_enabled: true,
            limiter_enabled: true,
            compressor: CompressorParams::default(),
            limiter: LimiterParams::default(),
        }
    }
}

impl MasterBusSettings {
    pub fn validate(&self) -> Result<()> {
        self.compressor.validate()?;
        self.limiter.validate()?;
        Ok(())
    }
}

/// Gain-staging and dynamics chain wrapping the mix output
#[derive(Debug, Clone)]
pub struct MasterBus {
    input_gain: Gain,
    output_gain: Gain,
    compressor: Compressor,
    limiter: Limiter,
    compressor_enabled: bool,
    limiter_enabled: bool,
}

impl MasterBus {
    /// Create a master bus with default settings
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self::with_settings(&MasterBusSettings::default(), sample_rate, channels)
    }

    pub fn with_settings(settings: &MasterBusSettings, sample_rate: u32, channels: usize) -> Self {
        Self {
            input_gain: Gain::new(settings.input_gain_db),
            output_gain: Gain::new(settings.output_gain_db),
            compressor: Compressor::with_params(settings.compressor.clone(), sample_rate),
            limiter: Limiter::new(settings.limiter.clone(), sample_rate, channels),
            compressor_enabled: settings.compressor_enabled,
            limiter_enabled: settings.limiter_enabled,
        }
    }

    /// Snapshot of the current configuration
    pub fn settings(&self) -> MasterBusSettings {
        MasterBusSettings {
            input_gain_db: self.input_gain.gain_db(),
            output_gain_db: self.output_gain.gain_db(),
            compressor_enabled: self.compressor_enabled,
            limiter_enabled: self.limiter_enabled,
            compressor: self.compressor.params().clone(),
            limiter: self.limiter.params().clone(),
        }
    }

    pub fn set_input_gain_db(&mut self, db: f32) {
        self.input_gain.set_gain_db(db);
    }

    pub fn set_output_gain_db(&mut self, db: f32) {
        self.output_gain.set_gain_db(db);
    }

    pub fn set_compressor_enabled(&mut self, enabled: bool) {
        if enabled && !self.compressor_enabled {
            self.compressor.reset();
        }
        self.compressor_enabled = enabled;
    }

    pub fn set_limiter_enabled(&mut self, enabled: bool) {
        self.limiter_enabled = enabled;
    }

    pub fn input_gain_db(&self) -> f32 {
        self.input_gain.gain_db()
    }

    pub fn output_gain_db(&self) -> f32 {
        self.output_gain.gain_db()
    }

    pub fn compressor_enabled(&self) -> bool {
        self.compressor_enabled
    }

    pub fn limiter_enabled(&self) -> bool {
        self.limiter_enabled
    }

    pub fn compressor(&self) -> &Compressor {
        &self.compressor
    }

    pub fn compressor_mut(&mut self) -> &mut Compressor {
        &mut self.compressor
    }

    pub fn limiter(&self) -> &Limiter {
        &self.limiter
    }

    pub fn limiter_mut(&mut self) -> &mut Limiter {
        &mut self.limiter
    }
}

impl AudioProcessor for MasterBus {
    fn process(&mut self, buffer: &mut [f32]) {
        self.input_gain.process(buffer);
        if self.compressor_enabled {
            self.compressor.process(buffer);
        }
        if self.limiter_enabled {
            self.limiter.process(buffer);
        }
        self.output_gain.process(buffer);
    }

    fn prepare(&mut self, sample_rate: u32, channels: usize) {
        self.input_gain.prepare(sample_rate, channels);
        self.output_gain.prepare(sample_rate, channels);
        self.compressor.prepare(sample_rate, channels);
        self.limiter.prepare(sample_rate, channels);
    }

    fn reset(&mut self) {
        self.compressor.reset();
        self.limiter.reset();
    }

    fn processor_type(&self) -> &'static str {
        "master_bus"
    }
}
