//! DSP building blocks for the master bus
//!
//! Every stage implements [`AudioProcessor`] and works in place on an
//! interleaved `f32` buffer, so the same code runs inside the device
//! callback and in offline renders.

mod compressor;
pub mod curve;
mod gain;
mod limiter;
mod master_bus;

pub use compressor::{Compressor, CompressorParams};
pub use curve::{apply_curve, CurveType};
pub use gain::Gain;
pub use limiter::{Limiter, LimiterParams};
pub use master_bus::{MasterBus, MasterBusSettings};

/// Floor used when converting silence to decibels
pub const SILENCE_DB: f32 = -96.0;

/// Base trait for in-place processing stages
///
/// Implementations must not allocate or block inside [`process`](Self::process):
/// it runs on the real-time audio thread.
pub trait AudioProcessor: Send {
    /// Process an interleaved buffer in place
    fn process(&mut self, buffer: &mut [f32]);

    /// Prepare for a new stream format
    ///
    /// Called when sample rate or channel count changes.
    fn prepare(&mut self, sample_rate: u32, channels: usize);

    /// Clear internal state (envelopes, delay lines)
    fn reset(&mut self);

    /// Get the processor type identifier
    fn processor_type(&self) -> &'static str;
}

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels, floored at [`SILENCE_DB`]
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear > 0.0 {
        (20.0 * linear.log10()).max(SILENCE_DB)
    } else {
        SILENCE_DB
    }
}

/// Calculate a one-pole smoothing coefficient from a time constant
#[inline]
pub(crate) fn time_to_coeff(time_ms: f32, sample_rate: u32) -> f32 {
    let samples = time_ms / 1000.0 * sample_rate as f32;
    if samples > 0.0 {
        (-1.0 / samples).exp()
    } else {
        0.0
    }
}
