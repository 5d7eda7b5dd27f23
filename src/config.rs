//! Engine and session configuration
//!
//! Both documents are pretty-printed JSON. Missing fields take their
//! defaults, so a config file only needs the values it changes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::{CurveType, MasterBusSettings};
use crate::error::{DeckflowError, Result};
use crate::output::OutputSinkSettings;
use crate::transition::{EqSwapConfig, TransitionRegion, TransitionType};

const MAX_CHANNELS: usize = 2;

/// Engine format, output and master bus settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub channels: usize,
    pub output: OutputSinkSettings,
    pub master_bus: MasterBusSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            output: OutputSinkSettings::default(),
            master_bus: MasterBusSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let config: Self = read_json(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(8000..=192_000).contains(&self.sample_rate) {
            return Err(DeckflowError::InvalidParameter {
                param: "sample_rate".to_string(),
                value: self.sample_rate.to_string(),
                expected: "8000 to 192000 Hz".to_string(),
            });
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(DeckflowError::InvalidParameter {
                param: "channels".to_string(),
                value: self.channels.to_string(),
                expected: "1 or 2".to_string(),
            });
        }
        self.master_bus.validate()
    }
}

/// One clip placed on the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipConfig {
    pub track_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub path: String,
    #[serde(default)]
    pub start_seconds: f64,
    /// Timeline time where the clip is cut off
    #[serde(default)]
    pub end_seconds: Option<f64>,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_volume() -> f32 {
    1.0
}

/// A transition between two clips, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub outgoing: String,
    pub incoming: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
    #[serde(default)]
    pub kind: TransitionType,
    #[serde(default)]
    pub curve: CurveType,
    #[serde(default)]
    pub eq: Option<EqSwapConfig>,
}

impl TransitionConfig {
    /// Convert to a region at `sample_rate`; fails on empty or reversed bounds
    pub fn to_region(&self, sample_rate: u32) -> Result<TransitionRegion> {
        let region = TransitionRegion::new(
            self.outgoing.clone(),
            self.incoming.clone(),
            seconds_to_samples(self.start_seconds, sample_rate),
            seconds_to_samples(self.end_seconds, sample_rate),
            self.kind,
            self.curve,
        )?;
        Ok(match &self.eq {
            Some(eq) => region.with_eq(eq.clone()),
            None => region,
        })
    }
}

/// A mix to render: clips plus the transitions between them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub clips: Vec<ClipConfig>,
    pub transitions: Vec<TransitionConfig>,
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    /// Resolve a clip path relative to the session file's directory
    pub fn resolve_clip_path(session_path: &Path, clip: &ClipConfig) -> std::path::PathBuf {
        let clip_path = Path::new(&clip.path);
        if clip_path.is_absolute() {
            return clip_path.to_path_buf();
        }
        session_path
            .parent()
            .map(|dir| dir.join(clip_path))
            .unwrap_or_else(|| clip_path.to_path_buf())
    }
}

/// Seconds to whole frames; negative values clamp to zero
pub fn seconds_to_samples(seconds: f64, sample_rate: u32) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * sample_rate as f64).round() as u64
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DeckflowError::FileNotFound {
                path: path.display().to_string(),
                source: Some(e),
            }
        } else {
            DeckflowError::Io(e)
        }
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}
