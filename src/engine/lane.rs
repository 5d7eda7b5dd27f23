//! Lane sampler
//!
//! A lane is one clip placed on the shared timeline. It converts the master
//! clock (timeline frames) into a clip-relative position and reads its source
//! sequentially; random access only happens on seek.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::source::AudioSource;

/// Stable handle for a lane in the mix engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LaneId(Uuid);

impl LaneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LaneId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a lane produced for one block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneRead {
    /// Audio from the source was written
    Audio,
    /// The block is outside the clip bounds, has no source, or faulted
    Silence,
}

/// One clip on the timeline
pub struct Lane {
    id: LaneId,
    track_id: String,
    title: String,
    source: Option<Box<dyn AudioSource>>,
    /// Timeline frame where the clip begins
    start_sample_offset: i64,
    /// Timeline frame where the clip ends (exclusive)
    end_sample: i64,
    volume: f32,
    muted: bool,
    solo: bool,
    active: bool,
    faulted: bool,
}

impl Lane {
    /// Create a lane whose clip starts at `start_sample_offset`
    ///
    /// The end boundary defaults to the start plus the source length.
    pub fn new(
        track_id: impl Into<String>,
        title: impl Into<String>,
        source: Box<dyn AudioSource>,
        start_sample_offset: i64,
    ) -> Self {
        let end_sample = start_sample_offset.saturating_add(source.len_frames() as i64);
        Self {
            id: LaneId::new(),
            track_id: track_id.into(),
            title: title.into(),
            source: Some(source),
            start_sample_offset,
            end_sample,
            volume: 1.0,
            muted: false,
            solo: false,
            active: true,
            faulted: false,
        }
    }

    /// A lane with no source; always reads silence
    pub fn empty(track_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: LaneId::new(),
            track_id: track_id.into(),
            title: title.into(),
            source: None,
            start_sample_offset: 0,
            end_sample: 0,
            volume: 1.0,
            muted: false,
            solo: false,
            active: true,
            faulted: false,
        }
    }

    /// Override the clip end (timeline frames). Ends at or before the start
    /// are pushed to `start + 1` to keep the clip non-empty.
    pub fn with_end_sample(mut self, end_sample: i64) -> Self {
        self.set_end_sample(end_sample);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.set_volume(volume);
        self
    }

    pub fn id(&self) -> LaneId {
        self.id
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn start_sample_offset(&self) -> i64 {
        self.start_sample_offset
    }

    pub fn end_sample(&self) -> i64 {
        self.end_sample
    }

    pub fn set_end_sample(&mut self, end_sample: i64) {
        self.end_sample = end_sample.max(self.start_sample_offset.saturating_add(1));
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Linear volume, clamped to `[0, 1]`
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_solo(&self) -> bool {
        self.solo
    }

    pub fn set_solo(&mut self, solo: bool) {
        self.solo = solo;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Whether the source errored or panicked during a read
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Channel count and sample rate of the source, if any
    pub fn source_format(&self) -> Option<(usize, u32)> {
        self.source
            .as_ref()
            .map(|source| (source.channels(), source.sample_rate()))
    }

    /// Clip length on the timeline, in frames
    pub fn clip_len(&self) -> i64 {
        self.end_sample - self.start_sample_offset
    }

    /// Whether the timeline frame `position` lies inside the clip
    pub fn contains(&self, position: u64) -> bool {
        let relative = position as i64 - self.start_sample_offset;
        relative >= 0 && relative < self.clip_len()
    }

    /// Read one block at the master position into `buffer`
    ///
    /// `buffer` is interleaved with `channels` channels. Frames of the block
    /// before `start_sample_offset` or at and past `end_sample` are zeroed; a
    /// block entirely outside the clip leaves the source untouched. Source
    /// errors and panics are contained here: the lane is marked faulted and
    /// reads silence from then on.
    pub fn read(&mut self, buffer: &mut [f32], channels: usize, master_position: u64) -> LaneRead {
        let channels = channels.max(1);
        let frames = (buffer.len() / channels) as i64;
        let relative = master_position as i64 - self.start_sample_offset;
        let clip_len = self.clip_len();

        if self.faulted || relative + frames <= 0 || relative >= clip_len {
            buffer.fill(0.0);
            return LaneRead::Silence;
        }
        let Some(source) = self.source.as_mut() else {
            buffer.fill(0.0);
            return LaneRead::Silence;
        };

        // Clip starts inside this block
        let lead = (-relative).max(0) as usize * channels;
        buffer[..lead].fill(0.0);

        let body = &mut buffer[lead..];
        let outcome = catch_unwind(AssertUnwindSafe(|| source.read(body)));
        match outcome {
            Ok(Ok(_)) => {}
            Ok(Err(_)) | Err(_) => {
                self.faulted = true;
                buffer.fill(0.0);
                return LaneRead::Silence;
            }
        }

        let tail = ((clip_len - relative) as usize).saturating_mul(channels);
        if tail < buffer.len() {
            buffer[tail..].fill(0.0);
        }

        LaneRead::Audio
    }

    /// Reposition the source to match a master clock position
    ///
    /// The clip-relative frame is clamped to `[0, source length]`.
    pub fn seek_to_master_position(&mut self, master_sample_position: u64) {
        let relative = master_sample_position as i64 - self.start_sample_offset;
        if let Some(source) = self.source.as_mut() {
            let len = source.len_frames();
            let target = (relative.max(0) as u64).min(len);
            source.set_position(target);
        }
    }

    /// Current source position in frames (0 without a source)
    pub fn source_position(&self) -> u64 {
        self.source.as_ref().map_or(0, |s| s.position())
    }

    /// Drop the source, turning the lane silent
    pub fn release_source(&mut self) {
        self.source = None;
    }
}

impl fmt::Debug for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lane")
            .field("id", &self.id)
            .field("track_id", &self.track_id)
            .field("title", &self.title)
            .field("has_source", &self.source.is_some())
            .field("start_sample_offset", &self.start_sample_offset)
            .field("end_sample", &self.end_sample)
            .field("volume", &self.volume)
            .field("muted", &self.muted)
            .field("solo", &self.solo)
            .field("active", &self.active)
            .field("faulted", &self.faulted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::source::MemorySource;
    use crate::error::{DeckflowError, Result};

    struct FailingSource;

    impl AudioSource for FailingSource {
        fn read(&mut self, _buffer: &mut [f32]) -> Result<usize> {
            Err(DeckflowError::InvalidAudio {
                reason: "corrupt frame".to_string(),
            })
        }
        fn position(&self) -> u64 {
            0
        }
        fn set_position(&mut self, _frame: u64) {}
        fn len_frames(&self) -> u64 {
            1_000
        }
        fn channels(&self) -> usize {
            2
        }
        fn sample_rate(&self) -> u32 {
            44100
        }
    }

    struct PanickingSource;

    impl AudioSource for PanickingSource {
        fn read(&mut self, _buffer: &mut [f32]) -> Result<usize> {
            panic!("decoder blew up");
        }
        fn position(&self) -> u64 {
            0
        }
        fn set_position(&mut self, _frame: u64) {}
        fn len_frames(&self) -> u64 {
            1_000
        }
        fn channels(&self) -> usize {
            2
        }
        fn sample_rate(&self) -> u32 {
            44100
        }
    }

    fn bounded_lane() -> Lane {
        let source = MemorySource::constant(0.5, 5_000, 2, 44100);
        Lane::new("t1", "Track 1", Box::new(source), 1000).with_end_sample(2000)
    }

    #[test]
    fn test_silence_before_and_after_clip() {
        let mut lane = bounded_lane();
        let mut buffer = vec![1.0_f32; 256];

        for position in [0_u64, 500, 872, 2000, 2500] {
            buffer.fill(1.0);
            assert_eq!(lane.read(&mut buffer, 2, position), LaneRead::Silence);
            assert!(buffer.iter().all(|&s| s == 0.0), "audio at {}", position);
        }
        assert_eq!(lane.source_position(), 0);
    }

    #[test]
    fn test_audio_inside_clip() {
        let mut lane = bounded_lane();
        let mut buffer = vec![0.0_f32; 256];

        assert_eq!(lane.read(&mut buffer, 2, 1000), LaneRead::Audio);
        assert!(buffer.iter().all(|&s| s == 0.5));
        assert_eq!(lane.source_position(), 128);

        assert_eq!(lane.read(&mut buffer, 2, 1500), LaneRead::Audio);
        assert!(buffer.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_block_tail_past_end_is_zeroed() {
        let mut lane = bounded_lane();
        let mut buffer = vec![0.0_f32; 200];

        // 1950 + 100 frames crosses end_sample at 2000
        assert_eq!(lane.read(&mut buffer, 2, 1950), LaneRead::Audio);
        assert!(buffer[..100].iter().all(|&s| s == 0.5));
        assert!(buffer[100..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_clip_starting_mid_block_is_frame_accurate() {
        let ramp: Vec<f32> = (0..200).map(|i| i as f32).collect();
        let mut lane = Lane::new("t", "Ramp", Box::new(MemorySource::new(ramp, 1, 44100)), 50);
        let mut buffer = vec![1.0_f32; 100];

        assert_eq!(lane.read(&mut buffer, 1, 0), LaneRead::Audio);
        assert!(buffer[..50].iter().all(|&s| s == 0.0));
        assert_eq!(buffer[50], 0.0);
        assert_eq!(buffer[99], 49.0);
        assert_eq!(lane.source_position(), 50);

        assert_eq!(lane.read(&mut buffer, 1, 100), LaneRead::Audio);
        assert_eq!(buffer[0], 50.0);
        assert_eq!(buffer[99], 149.0);
    }

    #[test]
    fn test_block_ending_on_clip_start_stays_silent() {
        let mut lane = bounded_lane();
        let mut buffer = vec![1.0_f32; 200];
        // Frames 900..1000 end exactly where the clip begins
        assert_eq!(lane.read(&mut buffer, 2, 900), LaneRead::Silence);
        assert!(buffer.iter().all(|&s| s == 0.0));
        assert_eq!(lane.source_position(), 0);
    }

    #[test]
    fn test_lane_without_source_is_silent() {
        let mut lane = Lane::empty("t", "Empty");
        let mut buffer = vec![1.0_f32; 32];
        assert_eq!(lane.read(&mut buffer, 2, 0), LaneRead::Silence);
        assert!(buffer.iter().all(|&s| s == 0.0));
        assert!(!lane.is_faulted());
    }

    #[test]
    fn test_source_error_marks_lane_faulted() {
        let mut lane = Lane::new("t", "Broken", Box::new(FailingSource), 0);
        let mut buffer = vec![1.0_f32; 32];
        assert_eq!(lane.read(&mut buffer, 2, 0), LaneRead::Silence);
        assert!(buffer.iter().all(|&s| s == 0.0));
        assert!(lane.is_faulted());
    }

    #[test]
    fn test_source_panic_is_contained() {
        let mut lane = Lane::new("t", "Panics", Box::new(PanickingSource), 0);
        let mut buffer = vec![1.0_f32; 32];
        assert_eq!(lane.read(&mut buffer, 2, 10), LaneRead::Silence);
        assert!(buffer.iter().all(|&s| s == 0.0));
        assert!(lane.is_faulted());
    }

    #[test]
    fn test_seek_translates_and_clamps() {
        let mut lane = Lane::new(
            "t",
            "Track",
            Box::new(MemorySource::constant(0.1, 3_000, 2, 44100)),
            1000,
        );

        lane.seek_to_master_position(1500);
        assert_eq!(lane.source_position(), 500);

        lane.seek_to_master_position(10);
        assert_eq!(lane.source_position(), 0);

        lane.seek_to_master_position(100_000);
        assert_eq!(lane.source_position(), 3_000);
    }

    #[test]
    fn test_end_defaults_to_source_length() {
        let lane = Lane::new(
            "t",
            "Track",
            Box::new(MemorySource::constant(0.1, 441, 2, 44100)),
            -100,
        );
        assert_eq!(lane.end_sample(), 341);
        assert!(lane.contains(0));
        assert!(!lane.contains(341));
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut lane = Lane::empty("t", "T");
        lane.set_volume(1.7);
        assert_eq!(lane.volume(), 1.0);
        lane.set_volume(-0.2);
        assert_eq!(lane.volume(), 0.0);
        lane.set_volume(f32::NAN);
        assert_eq!(lane.volume(), 0.0);
    }
}
