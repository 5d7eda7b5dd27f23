//! Output sinks
//!
//! Tiers are described by [`OutputMode`]. Every tier implements
//! [`OutputSink`]; [`create_sink`] picks one and handles fallback. Device
//! tiers need the `device-output` feature, the offline tier is always built.

#[cfg(feature = "device-output")]
mod device;
mod notify;
mod offline;
mod settings;
mod sink;

pub use notify::{PlaybackStopped, StopNotifier, StopReason};
pub use offline::OfflineSink;
pub use settings::{OutputMode, OutputSinkSettings};
pub use sink::{
    create_sink, create_sink_with, open_tier, OutputSink, ProcessedProvider, SampleProvider,
    SharedProcessor, SinkOpener, SinkState,
};

#[cfg(feature = "device-output")]
pub use device::DeviceSink;

use crate::error::Result;

/// Output device names available for `mode`
///
/// The offline tier has no devices and returns an empty list.
pub fn list_output_devices(mode: OutputMode) -> Result<Vec<String>> {
    if !mode.uses_device() {
        return Ok(Vec::new());
    }
    list_device_names(mode)
}

#[cfg(feature = "device-output")]
fn list_device_names(mode: OutputMode) -> Result<Vec<String>> {
    device::list_devices(mode)
}

#[cfg(not(feature = "device-output"))]
fn list_device_names(mode: OutputMode) -> Result<Vec<String>> {
    Err(crate::error::DeckflowError::BackendUnavailable {
        mode: mode.to_string(),
    })
}
