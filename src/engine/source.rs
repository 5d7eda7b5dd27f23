//! Decodable audio sources
//!
//! Lanes pull audio through [`AudioSource`], which hides the decoder. The
//! crate ships [`MemorySource`], a fully decoded interleaved clip; WAV files
//! are decoded into one by [`crate::engine::io::load_wav`].

use crate::error::Result;
use std::sync::Arc;

/// A positioned, sequentially-read audio stream
///
/// Positions and lengths are in frames. `read` works on interleaved samples
/// and advances the position by the frames it produced.
pub trait AudioSource: Send {
    /// Fill `buffer` with interleaved samples from the current position
    ///
    /// Returns the number of samples written. Any remainder of `buffer`
    /// past the end of the source is zeroed.
    fn read(&mut self, buffer: &mut [f32]) -> Result<usize>;

    /// Current read position in frames
    fn position(&self) -> u64;

    /// Move the read position; values past the end clamp to the length
    fn set_position(&mut self, frame: u64);

    /// Total length in frames
    fn len_frames(&self) -> u64;

    /// Interleaved channel count
    fn channels(&self) -> usize;

    /// Native sample rate in Hz
    fn sample_rate(&self) -> u32;
}

/// Interleaved clip held entirely in memory
///
/// The sample data is reference counted, so cloning a source to place the
/// same clip on several lanes is cheap; each clone keeps its own position.
#[derive(Debug, Clone)]
pub struct MemorySource {
    samples: Arc<[f32]>,
    channels: usize,
    sample_rate: u32,
    position: u64,
}

impl MemorySource {
    /// Wrap interleaved samples. A trailing partial frame is dropped.
    pub fn new(mut samples: Vec<f32>, channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels;
        samples.truncate(whole);
        Self {
            samples: samples.into(),
            channels,
            sample_rate,
            position: 0,
        }
    }

    /// A clip of constant value, handy for level checks
    pub fn constant(value: f32, frames: usize, channels: usize, sample_rate: u32) -> Self {
        Self::new(vec![value; frames * channels.max(1)], channels, sample_rate)
    }

    /// Sine tone copied to every channel
    pub fn sine(
        frequency: f32,
        amplitude: f32,
        frames: usize,
        channels: usize,
        sample_rate: u32,
    ) -> Self {
        let channels = channels.max(1);
        let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let value = amplitude * (angular_freq * i as f32).sin();
            samples.extend(std::iter::repeat(value).take(channels));
        }
        Self::new(samples, channels, sample_rate)
    }

    /// The underlying interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl AudioSource for MemorySource {
    fn read(&mut self, buffer: &mut [f32]) -> Result<usize> {
        let start = (self.position as usize).saturating_mul(self.channels);
        let available = self.samples.len().saturating_sub(start);
        let count = available.min(buffer.len());

        buffer[..count].copy_from_slice(&self.samples[start..start + count]);
        buffer[count..].fill(0.0);

        self.position += (count / self.channels) as u64;
        Ok(count)
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn set_position(&mut self, frame: u64) {
        self.position = frame.min(self.len_frames());
    }

    fn len_frames(&self) -> u64 {
        (self.samples.len() / self.channels) as u64
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
