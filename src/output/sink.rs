//! Output sink contract, state machine and tiered factory
//!
//! A sink pulls interleaved audio from a [`SampleProvider`] and hands it to
//! a backend. Sinks are built by [`create_sink`], which tries the requested
//! tier and falls back once toward [`OutputMode::Compatible`].

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::notify::StopNotifier;
use super::offline::OfflineSink;
use super::settings::{OutputMode, OutputSinkSettings};
use crate::dsp::AudioProcessor;
use crate::error::{DeckflowError, Result};

/// Processor shared between the control side and the pull path
pub type SharedProcessor = Arc<Mutex<dyn AudioProcessor>>;

/// Pull source for a sink
///
/// `read` runs on the audio thread: it fills the whole buffer with
/// interleaved samples and returns how many it produced. Returning 0 means
/// the stream has ended.
pub trait SampleProvider: Send {
    fn read(&mut self, buffer: &mut [f32]) -> usize;
    fn channels(&self) -> usize;
    fn sample_rate(&self) -> u32;
}

/// Provider with an optional processing stage applied after each read
pub struct ProcessedProvider {
    inner: Box<dyn SampleProvider>,
    processor: Option<SharedProcessor>,
}

impl ProcessedProvider {
    pub fn new(inner: Box<dyn SampleProvider>, processor: Option<SharedProcessor>) -> Self {
        Self { inner, processor }
    }
}

impl SampleProvider for ProcessedProvider {
    fn read(&mut self, buffer: &mut [f32]) -> usize {
        let produced = self.inner.read(buffer);
        if let Some(processor) = &self.processor {
            let mut processor = processor.lock().unwrap_or_else(PoisonError::into_inner);
            processor.process(&mut buffer[..produced]);
        }
        produced
    }

    fn channels(&self) -> usize {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }
}

/// Lifecycle of an output sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SinkState {
    #[default]
    Uninitialized,
    Initialized,
    Playing,
    Paused,
    Stopped,
}

impl SinkState {
    /// State after a play request
    ///
    /// Playing is reachable from every initialized state, including
    /// Stopped (restart).
    pub fn on_play(self) -> Result<SinkState> {
        match self {
            SinkState::Uninitialized => Err(DeckflowError::SinkNotInitialized),
            _ => Ok(SinkState::Playing),
        }
    }

    /// State after a pause request; only Playing actually pauses
    pub fn on_pause(self) -> Result<SinkState> {
        match self {
            SinkState::Uninitialized => Err(DeckflowError::SinkNotInitialized),
            SinkState::Playing => Ok(SinkState::Paused),
            other => Ok(other),
        }
    }

    pub fn on_stop(self) -> Result<SinkState> {
        match self {
            SinkState::Uninitialized => Err(DeckflowError::SinkNotInitialized),
            _ => Ok(SinkState::Stopped),
        }
    }

    pub fn is_playing(self) -> bool {
        self == SinkState::Playing
    }
}

impl fmt::Display for SinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkState::Uninitialized => write!(f, "Uninitialized"),
            SinkState::Initialized => write!(f, "Initialized"),
            SinkState::Playing => write!(f, "Playing"),
            SinkState::Paused => write!(f, "Paused"),
            SinkState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// A concrete output backend
pub trait OutputSink: Send {
    fn mode(&self) -> OutputMode;

    fn state(&self) -> SinkState;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Halt playback; raises the stopped notification
    fn stop(&mut self) -> Result<()>;

    /// Release the backend and the pull source. The sink is unusable afterwards.
    fn dispose(&mut self);

    /// Frames per pull
    fn buffer_frames(&self) -> u32;

    /// Pull rendered audio into `out` for caller-driven sinks
    ///
    /// Device sinks are driven by their own callback and return `None`.
    fn render(&mut self, _out: &mut [f32]) -> Option<usize> {
        None
    }
}

/// Build a sink for `settings`, falling back one tier on failure
///
/// `make_source` is called once per attempt so every attempt gets a fresh
/// pull source. If the fallback also fails, the error from the requested
/// tier is returned.
pub fn create_sink(
    settings: &OutputSinkSettings,
    make_source: &dyn Fn() -> Box<dyn SampleProvider>,
    notifier: &StopNotifier,
) -> Result<Box<dyn OutputSink>> {
    create_sink_with(settings, make_source, notifier, &open_tier)
}

/// Signature of a single-tier sink opener
pub type SinkOpener<'a> = dyn Fn(
    &OutputSinkSettings,
    Box<dyn SampleProvider>,
    StopNotifier,
) -> Result<Box<dyn OutputSink>> + 'a;

/// [`create_sink`] with an injectable opener
pub fn create_sink_with(
    settings: &OutputSinkSettings,
    make_source: &dyn Fn() -> Box<dyn SampleProvider>,
    notifier: &StopNotifier,
    opener: &SinkOpener<'_>,
) -> Result<Box<dyn OutputSink>> {
    let first_error = match opener(settings, make_source(), notifier.clone()) {
        Ok(sink) => {
            log::info!(
                "Output sink initialized: {} ({} frames)",
                sink.mode(),
                sink.buffer_frames()
            );
            return Ok(sink);
        }
        Err(e) => e,
    };

    let Some(fallback) = settings.mode.fallback() else {
        return Err(first_error);
    };

    log::warn!(
        "Output mode {} failed ({}), falling back to {}",
        settings.mode,
        first_error,
        fallback
    );

    let fallback_settings = OutputSinkSettings {
        mode: fallback,
        ..settings.clone()
    };
    match opener(&fallback_settings, make_source(), notifier.clone()) {
        Ok(sink) => {
            log::info!(
                "Output sink initialized: {} ({} frames)",
                sink.mode(),
                sink.buffer_frames()
            );
            Ok(sink)
        }
        Err(fallback_error) => {
            log::warn!("Fallback to {} also failed: {}", fallback, fallback_error);
            Err(first_error)
        }
    }
}

/// Open exactly the tier named in `settings`
pub fn open_tier(
    settings: &OutputSinkSettings,
    provider: Box<dyn SampleProvider>,
    notifier: StopNotifier,
) -> Result<Box<dyn OutputSink>> {
    match settings.mode {
        OutputMode::Offline => Ok(Box::new(OfflineSink::new(
            provider,
            notifier,
            settings.buffer_frames(),
        ))),
        #[cfg(feature = "device-output")]
        _ => Ok(Box::new(super::device::DeviceSink::open(
            settings, provider, notifier,
        )?)),
        #[cfg(not(feature = "device-output"))]
        mode => Err(DeckflowError::BackendUnavailable {
            mode: mode.to_string(),
        }),
    }
}
