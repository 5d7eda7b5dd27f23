//! Output tiers and sink settings

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeckflowError;

/// Frames per buffer for the compatible tier
pub const COMPATIBLE_BUFFER_FRAMES: u32 = 2048;
/// Frames per buffer for the exclusive tier
pub const EXCLUSIVE_BUFFER_FRAMES: u32 = 128;
/// Default requested buffer for the shared tier
pub const DEFAULT_BUFFER_FRAMES: u32 = 512;

/// Output backend tier, ordered from most compatible to lowest latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Default host, large buffer
    Compatible,
    /// Default host, requested buffer size
    Shared,
    /// Default host, smallest buffer
    Exclusive,
    /// ASIO host; needs an installed driver
    Asio,
    /// No device; the caller pulls rendered audio
    #[default]
    Offline,
}

impl OutputMode {
    pub const ALL: [OutputMode; 5] = [
        OutputMode::Compatible,
        OutputMode::Shared,
        OutputMode::Exclusive,
        OutputMode::Asio,
        OutputMode::Offline,
    ];

    /// Tier to retry with when this one fails to initialize
    pub fn fallback(self) -> Option<OutputMode> {
        match self {
            OutputMode::Shared | OutputMode::Exclusive | OutputMode::Asio => {
                Some(OutputMode::Compatible)
            }
            OutputMode::Compatible | OutputMode::Offline => None,
        }
    }

    /// Whether this tier opens a hardware device
    pub fn uses_device(self) -> bool {
        self != OutputMode::Offline
    }

    /// Buffer size in frames used by this tier
    pub fn buffer_frames(self, requested: u32) -> u32 {
        match self {
            OutputMode::Compatible => COMPATIBLE_BUFFER_FRAMES,
            OutputMode::Exclusive => EXCLUSIVE_BUFFER_FRAMES,
            OutputMode::Shared | OutputMode::Asio | OutputMode::Offline => {
                if requested == 0 {
                    DEFAULT_BUFFER_FRAMES
                } else {
                    requested
                }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OutputMode::Compatible => "compatible",
            OutputMode::Shared => "shared",
            OutputMode::Exclusive => "exclusive",
            OutputMode::Asio => "asio",
            OutputMode::Offline => "offline",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = DeckflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OutputMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DeckflowError::InvalidParameter {
                param: "output_mode".to_string(),
                value: s.to_string(),
                expected: "compatible, shared, exclusive, asio or offline".to_string(),
            })
    }
}

/// Settings supplied when the engine builds its sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSinkSettings {
    pub mode: OutputMode,
    /// Device to open; `None` uses the host default
    pub device_name: Option<String>,
    /// Requested buffer size in frames
    pub buffer_size: u32,
}

impl Default for OutputSinkSettings {
    fn default() -> Self {
        Self {
            mode: OutputMode::Offline,
            device_name: None,
            buffer_size: DEFAULT_BUFFER_FRAMES,
        }
    }
}

impl OutputSinkSettings {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device_name: impl Into<String>) -> Self {
        self.device_name = Some(device_name.into());
        self
    }

    /// Effective buffer size for the configured tier
    pub fn buffer_frames(&self) -> u32 {
        self.mode.buffer_frames(self.buffer_size)
    }
}
