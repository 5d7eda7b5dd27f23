//! cpal-backed device sink
//!
//! `cpal::Stream` is not `Send`, so each sink owns a worker thread that
//! builds the stream and keeps it alive. The sink talks to that thread over
//! crossbeam channels; every command waits for its reply so errors surface
//! on the calling thread.

use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, Host, SampleRate, StreamConfig};
use crossbeam::channel::{bounded, Sender};

use super::notify::{StopNotifier, StopReason};
use super::settings::{OutputMode, OutputSinkSettings};
use super::sink::{OutputSink, SampleProvider, SinkState};
use crate::error::{DeckflowError, Result};

/// Largest device buffer the callback handles without reallocating
const MAX_CALLBACK_FRAMES: usize = 8192;

enum Command {
    Play(Sender<Result<()>>),
    Pause(Sender<Result<()>>),
    Shutdown,
}

pub struct DeviceSink {
    mode: OutputMode,
    state: SinkState,
    buffer_frames: u32,
    commands: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
    notifier: StopNotifier,
}

impl DeviceSink {
    /// Open the device for `settings.mode` and build a paused stream
    pub fn open(
        settings: &OutputSinkSettings,
        provider: Box<dyn SampleProvider>,
        notifier: StopNotifier,
    ) -> Result<Self> {
        let mode = settings.mode;
        let host = host_for(mode)?;
        let device = find_device(&host, settings.device_name.as_deref())?;
        let buffer_frames = settings.buffer_frames();

        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let (command_tx, command_rx) = bounded::<Command>(4);
        let error_notifier = notifier.clone();

        let worker = thread::Builder::new()
            .name(format!("deckflow-{}-output", mode))
            .spawn(move || {
                let stream = match build_stream(&device, buffer_frames, provider, error_notifier) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                for command in command_rx.iter() {
                    match command {
                        Command::Play(reply) => {
                            let result = stream.play().map_err(|e| DeckflowError::StreamControl {
                                reason: e.to_string(),
                            });
                            let _ = reply.send(result);
                        }
                        Command::Pause(reply) => {
                            let result = stream.pause().map_err(|e| DeckflowError::StreamControl {
                                reason: e.to_string(),
                            });
                            let _ = reply.send(result);
                        }
                        Command::Shutdown => break,
                    }
                }
            })?;

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(DeckflowError::StreamBuild {
                reason: "output thread exited during setup".to_string(),
            })
        });
        if let Err(e) = ready {
            let _ = worker.join();
            return Err(e);
        }

        Ok(Self {
            mode,
            state: SinkState::Initialized,
            buffer_frames,
            commands: Some(command_tx),
            worker: Some(worker),
            notifier,
        })
    }

    fn request(&self, make: impl FnOnce(Sender<Result<()>>) -> Command) -> Result<()> {
        let commands = self.commands.as_ref().ok_or(DeckflowError::SinkNotInitialized)?;
        let (reply_tx, reply_rx) = bounded(1);
        commands
            .send(make(reply_tx))
            .map_err(|_| DeckflowError::StreamControl {
                reason: "output thread is gone".to_string(),
            })?;
        reply_rx.recv().map_err(|_| DeckflowError::StreamControl {
            reason: "output thread did not reply".to_string(),
        })?
    }
}

impl OutputSink for DeviceSink {
    fn mode(&self) -> OutputMode {
        self.mode
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn play(&mut self) -> Result<()> {
        let next = self.state.on_play()?;
        if next != self.state {
            self.request(Command::Play)?;
        }
        self.state = next;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let next = self.state.on_pause()?;
        if next != self.state {
            self.request(Command::Pause)?;
        }
        self.state = next;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let was_running = matches!(self.state, SinkState::Playing | SinkState::Paused);
        let next = self.state.on_stop()?;
        if self.state.is_playing() {
            self.request(Command::Pause)?;
        }
        self.state = next;
        if was_running {
            self.notifier.notify(StopReason::Explicit);
        }
        Ok(())
    }

    fn dispose(&mut self) {
        if matches!(self.state, SinkState::Playing | SinkState::Paused) {
            self.notifier.notify(StopReason::Explicit);
        }
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("{} output thread panicked", self.mode);
            }
        }
        self.state = SinkState::Uninitialized;
    }

    fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }
}

impl Drop for DeviceSink {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Names of the output devices reachable for `mode`
pub fn list_devices(mode: OutputMode) -> Result<Vec<String>> {
    let host = host_for(mode)?;
    let devices = host
        .output_devices()
        .map_err(|e| DeckflowError::StreamBuild {
            reason: e.to_string(),
        })?;
    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

fn host_for(mode: OutputMode) -> Result<Host> {
    match mode {
        OutputMode::Asio => {
            let asio = cpal::available_hosts()
                .into_iter()
                .find(|id| format!("{:?}", id) == "Asio")
                .ok_or_else(|| DeckflowError::NoDriver {
                    mode: mode.to_string(),
                })?;
            cpal::host_from_id(asio).map_err(|e| DeckflowError::NoDriver {
                mode: format!("{} ({})", mode, e),
            })
        }
        OutputMode::Offline => Err(DeckflowError::BackendUnavailable {
            mode: mode.to_string(),
        }),
        OutputMode::Compatible | OutputMode::Shared | OutputMode::Exclusive => {
            Ok(cpal::default_host())
        }
    }
}

fn find_device(host: &Host, name: Option<&str>) -> Result<Device> {
    match name {
        None => host.default_output_device().ok_or(DeckflowError::NoDevice),
        Some(name) => host
            .output_devices()
            .map_err(|e| DeckflowError::StreamBuild {
                reason: e.to_string(),
            })?
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| DeckflowError::DeviceNotFound {
                name: name.to_string(),
            }),
    }
}

fn build_stream(
    device: &Device,
    buffer_frames: u32,
    mut provider: Box<dyn SampleProvider>,
    notifier: StopNotifier,
) -> Result<cpal::Stream> {
    let supported = device
        .default_output_config()
        .map_err(|e| DeckflowError::StreamBuild {
            reason: e.to_string(),
        })?;
    let device_channels = supported.channels() as usize;
    let source_channels = provider.channels().max(1);
    let config = StreamConfig {
        channels: supported.channels(),
        sample_rate: SampleRate(provider.sample_rate()),
        buffer_size: BufferSize::Fixed(buffer_frames),
    };

    log::info!(
        "Opening {} at {}Hz, {} channels, {} frames",
        device.name().unwrap_or_else(|_| "unknown device".to_string()),
        config.sample_rate.0,
        device_channels,
        buffer_frames
    );

    let mut scratch = vec![0.0_f32; MAX_CALLBACK_FRAMES * source_channels];

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = (data.len() / device_channels).min(MAX_CALLBACK_FRAMES);
                let block = &mut scratch[..frames * source_channels];
                provider.read(block);

                for (frame, out) in data.chunks_mut(device_channels).enumerate() {
                    if frame >= frames {
                        out.fill(0.0);
                        continue;
                    }
                    let input = &block[frame * source_channels..(frame + 1) * source_channels];
                    for (ch, sample) in out.iter_mut().enumerate() {
                        *sample = input[ch % source_channels];
                    }
                }
            },
            move |err| {
                notifier.notify(StopReason::DeviceError(err.to_string()));
            },
            None,
        )
        .map_err(|e| DeckflowError::StreamBuild {
            reason: e.to_string(),
        })?;

    // cpal streams may start running on creation
    stream.pause().map_err(|e| DeckflowError::StreamControl {
        reason: e.to_string(),
    })?;
    Ok(stream)
}
