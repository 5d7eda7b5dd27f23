//! Mix engine and master clock
//!
//! [`MixEngine`] owns the timeline position, the lane set and the output
//! sink. It is a cheap handle: clones share the same engine.
//!
//! # Locking
//!
//! The lane set is guarded by one mutex that the read path takes for the
//! duration of a block. Control calls take it only to swap or flag lanes, and
//! never while doing I/O (WAV decoding happens before the lock). The sink has
//! its own mutex; when both are needed the sink is locked first.
//!
//! The clock is only advanced by [`MixEngine::read`] and only set by seek and
//! stop, both under the lane lock, so every lane in a block sees the same
//! position.
//!
//! The read path neither allocates nor logs. Blocks longer than the scratch
//! buffer are mixed in scratch-sized chunks, and lane faults are only flagged
//! there; [`MixEngine::report_faults`] logs them from the control side.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crossbeam::channel::Receiver;

use super::io::load_wav;
use super::lane::{Lane, LaneId, LaneRead};
use crate::error::{DeckflowError, Result};
use crate::output::{
    create_sink, OutputMode, OutputSink, OutputSinkSettings, PlaybackStopped, ProcessedProvider,
    SampleProvider, SharedProcessor, SinkState, StopNotifier,
};
use crate::transition::TransitionEngine;

/// Scratch frames reserved up front; `initialize` grows it to the sink block
const INITIAL_SCRATCH_FRAMES: usize = 4096;

/// Read-only view of a lane
#[derive(Debug, Clone, PartialEq)]
pub struct LaneInfo {
    pub id: LaneId,
    pub track_id: String,
    pub title: String,
    pub start_sample_offset: i64,
    pub end_sample: i64,
    pub volume: f32,
    pub muted: bool,
    pub solo: bool,
    pub active: bool,
    pub faulted: bool,
}

impl From<&Lane> for LaneInfo {
    fn from(lane: &Lane) -> Self {
        Self {
            id: lane.id(),
            track_id: lane.track_id().to_string(),
            title: lane.title().to_string(),
            start_sample_offset: lane.start_sample_offset(),
            end_sample: lane.end_sample(),
            volume: lane.volume(),
            muted: lane.is_muted(),
            solo: lane.is_solo(),
            active: lane.is_active(),
            faulted: lane.is_faulted(),
        }
    }
}

struct LaneSet {
    lanes: Vec<Lane>,
    scratch: Vec<f32>,
    transitions: Option<Arc<TransitionEngine>>,
    /// Lanes whose fault has already been logged
    reported_faults: Vec<LaneId>,
}

/// Settings used to (re)build the sink
struct SinkConfig {
    settings: OutputSinkSettings,
    processor: Option<SharedProcessor>,
}

struct Shared {
    sample_rate: u32,
    channels: usize,
    position: AtomicU64,
    lanes: Mutex<LaneSet>,
    sink: Mutex<Option<Box<dyn OutputSink>>>,
    sink_config: Mutex<Option<SinkConfig>>,
    notifier: StopNotifier,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn read(&self, buffer: &mut [f32]) -> usize {
        buffer.fill(0.0);
        let channels = self.channels;

        let mut set = lock(&self.lanes);
        let LaneSet {
            lanes,
            scratch,
            transitions,
            ..
        } = &mut *set;

        // Scratch always holds a whole, non-zero number of frames
        let chunk_len = scratch.len();

        for block in buffer.chunks_mut(chunk_len) {
            let position = self.position.load(Ordering::Acquire);
            mix_block(
                block,
                &mut scratch[..block.len()],
                lanes,
                transitions.as_deref(),
                channels,
                position,
            );
            self.position
                .fetch_add((block.len() / channels) as u64, Ordering::AcqRel);
        }
        buffer.len()
    }
}

/// Sum every audible lane into `out`, which must already be zeroed
fn mix_block(
    out: &mut [f32],
    scratch: &mut [f32],
    lanes: &mut [Lane],
    transitions: Option<&TransitionEngine>,
    channels: usize,
    position: u64,
) {
    let any_solo = lanes.iter().any(|lane| lane.is_active() && lane.is_solo());

    for lane in lanes.iter_mut() {
        if !lane.is_active() {
            continue;
        }

        let outcome = lane.read(scratch, channels, position);

        // Muted and solo-excluded lanes were still read to keep their place
        let audible = !lane.is_muted() && (!any_solo || lane.is_solo());
        if outcome == LaneRead::Silence || !audible {
            continue;
        }

        let mut gain = lane.volume();
        if let Some(transitions) = transitions {
            gain *= transitions
                .get_automation_for_track(lane.track_id(), position)
                .lane_gain();
        }
        for (out, sample) in out.iter_mut().zip(scratch.iter()) {
            *out += sample * gain;
        }
    }
}

/// Pull source handed to sinks
///
/// Holds the engine weakly so a sink stored inside the engine does not keep
/// it alive. Once the engine is gone it reports end of stream.
struct EngineSource {
    shared: Weak<Shared>,
    sample_rate: u32,
    channels: usize,
}

impl SampleProvider for EngineSource {
    fn read(&mut self, buffer: &mut [f32]) -> usize {
        match self.shared.upgrade() {
            Some(shared) => shared.read(buffer),
            None => {
                buffer.fill(0.0);
                0
            }
        }
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Multi-lane mixer with a single sample clock
#[derive(Clone)]
pub struct MixEngine {
    shared: Arc<Shared>,
}

impl MixEngine {
    /// Create an engine at the given format, with no lanes and no sink
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        let channels = channels.max(1);
        Self {
            shared: Arc::new(Shared {
                sample_rate,
                channels,
                position: AtomicU64::new(0),
                lanes: Mutex::new(LaneSet {
                    lanes: Vec::new(),
                    scratch: vec![0.0; INITIAL_SCRATCH_FRAMES * channels],
                    transitions: None,
                    reported_faults: Vec::new(),
                }),
                sink: Mutex::new(None),
                sink_config: Mutex::new(None),
                notifier: StopNotifier::new(),
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.shared.channels
    }

    // ========================================================================
    // Lanes
    // ========================================================================

    /// Add a lane, aligned to the current clock position
    ///
    /// The lane's source must already be in the engine's channel count and
    /// sample rate; [`MixEngine::load`] converts WAV files on the way in.
    pub fn add_lane(&self, mut lane: Lane) -> Result<LaneId> {
        if let Some((channels, sample_rate)) = lane.source_format() {
            if channels != self.shared.channels || sample_rate != self.shared.sample_rate {
                return Err(DeckflowError::UnsupportedFormat {
                    format: format!(
                        "{} ch @ {} Hz source on a {} ch @ {} Hz engine",
                        channels, sample_rate, self.shared.channels, self.shared.sample_rate
                    ),
                });
            }
        }

        let id = lane.id();
        let mut set = lock(&self.shared.lanes);
        lane.seek_to_master_position(self.shared.position.load(Ordering::Acquire));
        log::info!(
            "Added lane {} '{}' (track {}) at sample {}",
            id,
            lane.title(),
            lane.track_id(),
            lane.start_sample_offset()
        );
        set.lanes.push(lane);
        Ok(id)
    }

    /// Remove a lane and release its source
    pub fn remove_lane(&self, id: LaneId) -> Result<()> {
        let mut set = lock(&self.shared.lanes);
        let index = set
            .lanes
            .iter()
            .position(|lane| lane.id() == id)
            .ok_or_else(|| DeckflowError::LaneNotFound {
                lane_id: id.to_string(),
            })?;
        let mut lane = set.lanes.remove(index);
        lane.release_source();
        set.reported_faults.retain(|reported| *reported != id);
        log::info!("Removed lane {} '{}'", id, lane.title());
        Ok(())
    }

    /// Remove every lane, releasing their sources
    pub fn clear_lanes(&self) {
        let mut set = lock(&self.shared.lanes);
        for lane in set.lanes.iter_mut() {
            lane.release_source();
        }
        let count = set.lanes.len();
        set.lanes.clear();
        set.reported_faults.clear();
        log::info!("Cleared {} lanes", count);
    }

    /// Decode a WAV file onto a new lane starting at `start_sample`
    ///
    /// The clip is converted to the engine's format. Decoding happens before
    /// the lane lock is taken.
    pub fn load(&self, track_id: &str, path: &Path, start_sample: i64) -> Result<LaneId> {
        let source = load_wav(path, self.shared.sample_rate, self.shared.channels)?;
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| track_id.to_string());
        self.add_lane(Lane::new(track_id, title, Box::new(source), start_sample))
    }

    fn with_lane<T>(&self, id: LaneId, f: impl FnOnce(&mut Lane) -> T) -> Result<T> {
        let mut set = lock(&self.shared.lanes);
        set.lanes
            .iter_mut()
            .find(|lane| lane.id() == id)
            .map(f)
            .ok_or_else(|| DeckflowError::LaneNotFound {
                lane_id: id.to_string(),
            })
    }

    pub fn set_volume(&self, id: LaneId, volume: f32) -> Result<()> {
        self.with_lane(id, |lane| lane.set_volume(volume))
    }

    pub fn set_mute(&self, id: LaneId, muted: bool) -> Result<()> {
        self.with_lane(id, |lane| lane.set_muted(muted))
    }

    pub fn set_solo(&self, id: LaneId, solo: bool) -> Result<()> {
        self.with_lane(id, |lane| lane.set_solo(solo))
    }

    pub fn set_active(&self, id: LaneId, active: bool) -> Result<()> {
        self.with_lane(id, |lane| lane.set_active(active))
    }

    /// Change where a lane's clip ends on the timeline
    pub fn set_lane_end(&self, id: LaneId, end_sample: i64) -> Result<()> {
        self.with_lane(id, |lane| lane.set_end_sample(end_sample))
    }

    pub fn lane(&self, id: LaneId) -> Option<LaneInfo> {
        self.with_lane(id, |lane| LaneInfo::from(&*lane)).ok()
    }

    pub fn lanes(&self) -> Vec<LaneInfo> {
        lock(&self.shared.lanes)
            .lanes
            .iter()
            .map(LaneInfo::from)
            .collect()
    }

    pub fn lane_count(&self) -> usize {
        lock(&self.shared.lanes).lanes.len()
    }

    /// Last timeline frame covered by any lane
    pub fn timeline_end(&self) -> u64 {
        lock(&self.shared.lanes)
            .lanes
            .iter()
            .filter(|lane| lane.has_source())
            .map(|lane| lane.end_sample().max(0) as u64)
            .max()
            .unwrap_or(0)
    }

    /// Log lanes that faulted since the last call and return their ids
    ///
    /// Faulted lanes stay silent until replaced; each is reported once.
    pub fn report_faults(&self) -> Vec<LaneId> {
        let mut set = lock(&self.shared.lanes);
        let LaneSet {
            lanes,
            reported_faults,
            ..
        } = &mut *set;

        let mut fresh = Vec::new();
        for lane in lanes.iter().filter(|lane| lane.is_faulted()) {
            if reported_faults.contains(&lane.id()) {
                continue;
            }
            log::warn!(
                "Lane {} ({}) faulted; substituting silence",
                lane.id(),
                lane.title()
            );
            reported_faults.push(lane.id());
            fresh.push(lane.id());
        }
        fresh
    }

    /// Scale each lane by its track's transition automation
    ///
    /// The automation is evaluated once per block at the block's start.
    pub fn attach_transitions(&self, transitions: Option<Arc<TransitionEngine>>) {
        lock(&self.shared.lanes).transitions = transitions;
    }

    // ========================================================================
    // Pull path
    // ========================================================================

    /// Mix one block into `buffer` and advance the clock
    ///
    /// `buffer` is interleaved in the engine's channel count. Returns the
    /// number of samples written, which is always `buffer.len()`; the clock
    /// advances by `buffer.len() / channels` frames.
    pub fn read(&self, buffer: &mut [f32]) -> usize {
        self.shared.read(buffer)
    }

    // ========================================================================
    // Output sink
    // ========================================================================

    /// Build the output sink
    ///
    /// The sink pulls from this engine, through `processor` when given
    /// (typically the master bus). An existing sink is disposed first.
    pub fn initialize(
        &self,
        settings: OutputSinkSettings,
        processor: Option<SharedProcessor>,
    ) -> Result<()> {
        if let Some(processor) = &processor {
            lock(processor.as_ref()).prepare(self.shared.sample_rate, self.shared.channels);
        }
        self.reserve_scratch(&settings);

        let mut sink = lock(&self.shared.sink);
        if let Some(mut old) = sink.take() {
            old.dispose();
        }
        *sink = Some(self.build_sink(&settings, processor.clone())?);
        *lock(&self.shared.sink_config) = Some(SinkConfig {
            settings,
            processor,
        });
        Ok(())
    }

    /// Size the mix scratch buffer for the sink's block, off the audio thread
    fn reserve_scratch(&self, settings: &OutputSinkSettings) {
        let frames = settings
            .buffer_frames()
            .max(OutputMode::Compatible.buffer_frames(0)) as usize;
        let wanted = frames * self.shared.channels;
        let mut set = lock(&self.shared.lanes);
        if set.scratch.len() < wanted {
            set.scratch.resize(wanted, 0.0);
        }
    }

    fn build_sink(
        &self,
        settings: &OutputSinkSettings,
        processor: Option<SharedProcessor>,
    ) -> Result<Box<dyn OutputSink>> {
        let shared = Arc::downgrade(&self.shared);
        let sample_rate = self.shared.sample_rate;
        let channels = self.shared.channels;
        let make_source = move || -> Box<dyn SampleProvider> {
            let source = EngineSource {
                shared: shared.clone(),
                sample_rate,
                channels,
            };
            Box::new(ProcessedProvider::new(Box::new(source), processor.clone()))
        };
        create_sink(settings, &make_source, &self.shared.notifier)
    }

    fn with_sink<T>(&self, f: impl FnOnce(&mut dyn OutputSink) -> Result<T>) -> Result<T> {
        let mut sink = lock(&self.shared.sink);
        let sink = sink.as_mut().ok_or(DeckflowError::SinkNotInitialized)?;
        f(sink.as_mut())
    }

    pub fn play(&self) -> Result<()> {
        self.with_sink(|sink| sink.play())?;
        log::debug!("Play from sample {}", self.current_sample_position());
        Ok(())
    }

    /// Pause playback; the clock keeps its position
    pub fn pause(&self) -> Result<()> {
        self.with_sink(|sink| sink.pause())?;
        log::debug!("Paused at sample {}", self.current_sample_position());
        Ok(())
    }

    /// Stop playback and rewind the clock and every lane to zero
    pub fn stop(&self) -> Result<()> {
        self.with_sink(|sink| sink.stop())?;
        self.seek_to_sample(0);
        log::debug!("Stopped, position reset");
        Ok(())
    }

    /// Seek to a time in seconds; negative times clamp to zero
    pub fn seek(&self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.seek_to_sample((seconds * self.shared.sample_rate as f64).round() as u64);
    }

    /// Set the clock and reposition every lane's source
    ///
    /// A block already being mixed finishes at the old position.
    pub fn seek_to_sample(&self, sample: u64) {
        let mut set = lock(&self.shared.lanes);
        self.shared.position.store(sample, Ordering::Release);
        for lane in set.lanes.iter_mut() {
            lane.seek_to_master_position(sample);
        }
        log::debug!("Seek to sample {}", sample);
    }

    /// Rebuild the sink in another tier, restoring the play state
    ///
    /// When neither the requested tier nor its fallback opens, the previous
    /// sink is rebuilt and the error is returned.
    pub fn set_output_mode(&self, mode: OutputMode, device_name: Option<String>) -> Result<()> {
        let (previous, processor) = {
            let config = lock(&self.shared.sink_config);
            let config = config.as_ref().ok_or(DeckflowError::SinkNotInitialized)?;
            (config.settings.clone(), config.processor.clone())
        };
        let settings = OutputSinkSettings {
            mode,
            device_name,
            ..previous.clone()
        };
        self.reserve_scratch(&settings);

        let mut sink = lock(&self.shared.sink);
        let was_playing = sink.as_ref().map_or(false, |s| s.state().is_playing());
        if let Some(mut old) = sink.take() {
            old.dispose();
        }

        let mut new_sink = match self.build_sink(&settings, processor.clone()) {
            Ok(new_sink) => new_sink,
            Err(err) => {
                log::warn!(
                    "Output mode {} unavailable ({}); restoring {}",
                    mode,
                    err,
                    previous.mode
                );
                let mut restored = self.build_sink(&previous, processor)?;
                if was_playing {
                    restored.play()?;
                }
                *sink = Some(restored);
                return Err(err);
            }
        };
        if was_playing {
            new_sink.play()?;
        }
        log::info!(
            "Output mode switched to {} (requested {})",
            new_sink.mode(),
            mode
        );
        *sink = Some(new_sink);
        *lock(&self.shared.sink_config) = Some(SinkConfig {
            settings,
            processor,
        });
        Ok(())
    }

    /// Pull the next block from a caller-driven sink
    ///
    /// Returns the number of samples produced; 0 while paused or stopped.
    pub fn render(&self, out: &mut [f32]) -> Result<usize> {
        let mut sink = lock(&self.shared.sink);
        let sink = sink.as_mut().ok_or(DeckflowError::SinkNotInitialized)?;
        let mode = sink.mode();
        let produced = sink.render(out).ok_or_else(|| DeckflowError::InvalidParameter {
            param: "output_mode".to_string(),
            value: mode.to_string(),
            expected: "offline".to_string(),
        })?;
        self.report_faults();
        Ok(produced)
    }

    /// Stop the sink, release every source and clear the lane set
    ///
    /// Must not be called from inside the audio callback.
    pub fn dispose(&self) {
        if let Some(mut sink) = lock(&self.shared.sink).take() {
            sink.dispose();
        }
        self.clear_lanes();
        log::info!("Mix engine disposed");
    }

    // ========================================================================
    // Transport state
    // ========================================================================

    pub fn current_sample_position(&self) -> u64 {
        self.shared.position.load(Ordering::Acquire)
    }

    pub fn current_time_seconds(&self) -> f64 {
        self.current_sample_position() as f64 / self.shared.sample_rate as f64
    }

    pub fn is_playing(&self) -> bool {
        self.sink_state().is_playing()
    }

    /// Tier of the active sink, if one is built
    pub fn output_mode(&self) -> Option<OutputMode> {
        lock(&self.shared.sink).as_ref().map(|sink| sink.mode())
    }

    pub fn sink_state(&self) -> SinkState {
        lock(&self.shared.sink)
            .as_ref()
            .map_or(SinkState::Uninitialized, |sink| sink.state())
    }

    /// Receive a [`PlaybackStopped`] whenever the sink halts
    pub fn subscribe_stopped(&self) -> Receiver<PlaybackStopped> {
        self.shared.notifier.subscribe()
    }
}

impl SampleProvider for MixEngine {
    fn read(&mut self, buffer: &mut [f32]) -> usize {
        self.shared.read(buffer)
    }

    fn channels(&self) -> usize {
        self.shared.channels
    }

    fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }
}
