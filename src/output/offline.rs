//! Caller-driven sink
//!
//! No device is opened. Audio is pulled with [`OutputSink::render`], which
//! makes rendering deterministic for files and tests.

use super::notify::{StopNotifier, StopReason};
use super::settings::OutputMode;
use super::sink::{OutputSink, SampleProvider, SinkState};
use crate::error::Result;

pub struct OfflineSink {
    provider: Option<Box<dyn SampleProvider>>,
    notifier: StopNotifier,
    state: SinkState,
    buffer_frames: u32,
}

impl OfflineSink {
    pub fn new(provider: Box<dyn SampleProvider>, notifier: StopNotifier, buffer_frames: u32) -> Self {
        Self {
            provider: Some(provider),
            notifier,
            state: SinkState::Initialized,
            buffer_frames,
        }
    }
}

impl OutputSink for OfflineSink {
    fn mode(&self) -> OutputMode {
        OutputMode::Offline
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn play(&mut self) -> Result<()> {
        self.state = self.state.on_play()?;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.state = self.state.on_pause()?;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let was_running = matches!(self.state, SinkState::Playing | SinkState::Paused);
        self.state = self.state.on_stop()?;
        if was_running {
            self.notifier.notify(StopReason::Explicit);
        }
        Ok(())
    }

    fn dispose(&mut self) {
        if matches!(self.state, SinkState::Playing | SinkState::Paused) {
            self.notifier.notify(StopReason::Explicit);
        }
        self.provider = None;
        self.state = SinkState::Uninitialized;
    }

    fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }

    /// Silence unless playing; a provider that runs dry stops the sink
    fn render(&mut self, out: &mut [f32]) -> Option<usize> {
        let provider = match self.provider.as_mut() {
            Some(provider) if self.state.is_playing() => provider,
            _ => {
                out.fill(0.0);
                return Some(0);
            }
        };

        let produced = provider.read(out);
        if produced == 0 {
            self.state = SinkState::Stopped;
            self.notifier.notify(StopReason::EndOfStream);
        }
        Some(produced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Finite {
        remaining: usize,
    }

    impl SampleProvider for Finite {
        fn read(&mut self, buffer: &mut [f32]) -> usize {
            let produced = self.remaining.min(buffer.len());
            buffer[..produced].fill(0.25);
            buffer[produced..].fill(0.0);
            self.remaining -= produced;
            produced
        }
        fn channels(&self) -> usize {
            2
        }
        fn sample_rate(&self) -> u32 {
            44100
        }
    }

    fn sink(remaining: usize, notifier: &StopNotifier) -> OfflineSink {
        OfflineSink::new(Box::new(Finite { remaining }), notifier.clone(), 512)
    }

    #[test]
    fn test_silence_until_played() {
        let notifier = StopNotifier::new();
        let mut sink = sink(100, &notifier);
        let mut out = [1.0_f32; 8];

        assert_eq!(sink.render(&mut out), Some(0));
        assert!(out.iter().all(|&s| s == 0.0));

        sink.play().unwrap();
        assert_eq!(sink.render(&mut out), Some(8));
        assert!(out.iter().all(|&s| s == 0.25));

        sink.pause().unwrap();
        assert_eq!(sink.render(&mut out), Some(0));
    }

    #[test]
    fn test_end_of_stream_stops_and_notifies() {
        let notifier = StopNotifier::new();
        let stopped = notifier.subscribe();
        let mut sink = sink(4, &notifier);
        let mut out = [0.0_f32; 8];

        sink.play().unwrap();
        assert_eq!(sink.render(&mut out), Some(4));
        assert!(stopped.try_recv().is_err());

        assert_eq!(sink.render(&mut out), Some(0));
        assert_eq!(sink.state(), SinkState::Stopped);
        assert_eq!(stopped.try_recv().unwrap().reason, StopReason::EndOfStream);
    }

    #[test]
    fn test_explicit_stop_notifies_once() {
        let notifier = StopNotifier::new();
        let stopped = notifier.subscribe();
        let mut sink = sink(100, &notifier);

        sink.play().unwrap();
        sink.stop().unwrap();
        sink.stop().unwrap();

        assert_eq!(stopped.try_recv().unwrap().reason, StopReason::Explicit);
        assert!(stopped.try_recv().is_err());
    }

    #[test]
    fn test_dispose_makes_sink_unusable() {
        let notifier = StopNotifier::new();
        let mut sink = sink(100, &notifier);
        sink.dispose();
        assert_eq!(sink.state(), SinkState::Uninitialized);
        assert!(sink.play().is_err());
    }
}
