//! Transition regions

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dsp::CurveType;
use crate::error::{DeckflowError, Result};

/// Transition archetype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionType {
    #[default]
    Crossfade,
    EqSwap,
    Cut,
    /// Automated as a crossfade
    EchoOut,
    FilterSweep,
    /// Automated as a crossfade
    Backspin,
}

impl TransitionType {
    pub const ALL: [TransitionType; 6] = [
        TransitionType::Crossfade,
        TransitionType::EqSwap,
        TransitionType::Cut,
        TransitionType::EchoOut,
        TransitionType::FilterSweep,
        TransitionType::Backspin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransitionType::Crossfade => "crossfade",
            TransitionType::EqSwap => "eq_swap",
            TransitionType::Cut => "cut",
            TransitionType::EchoOut => "echo_out",
            TransitionType::FilterSweep => "filter_sweep",
            TransitionType::Backspin => "backspin",
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionType {
    type Err = DeckflowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        TransitionType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| DeckflowError::InvalidParameter {
                param: "transition_type".to_string(),
                value: s.to_string(),
                expected: "crossfade, eq_swap, cut, echo_out, filter_sweep or backspin"
                    .to_string(),
            })
    }
}

/// Which bands an EQ swap exchanges
///
/// Crossover frequencies are configuration for the per-lane EQ stage that
/// applies the band gains; nothing here splits bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqSwapConfig {
    pub swap_low: bool,
    pub swap_mid: bool,
    pub swap_high: bool,
    pub low_crossover_hz: f32,
    pub high_crossover_hz: f32,
}

impl Default for EqSwapConfig {
    fn default() -> Self {
        Self {
            swap_low: true,
            swap_mid: false,
            swap_high: false,
            low_crossover_hz: 300.0,
            high_crossover_hz: 3000.0,
        }
    }
}

impl EqSwapConfig {
    /// Swap the low band only
    pub fn bass_only() -> Self {
        Self::default()
    }

    /// Swap low and mid bands
    pub fn low_and_mid() -> Self {
        Self {
            swap_mid: true,
            ..Self::default()
        }
    }
}

/// A transition window on the timeline, `[start_sample, end_sample)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRegion {
    outgoing_track_id: String,
    incoming_track_id: String,
    start_sample: u64,
    end_sample: u64,
    kind: TransitionType,
    curve: CurveType,
    eq: EqSwapConfig,
}

impl TransitionRegion {
    /// Create a region; `end_sample` must be after `start_sample`
    pub fn new(
        outgoing_track_id: impl Into<String>,
        incoming_track_id: impl Into<String>,
        start_sample: u64,
        end_sample: u64,
        kind: TransitionType,
        curve: CurveType,
    ) -> Result<Self> {
        if end_sample <= start_sample {
            return Err(DeckflowError::InvalidTransitionBounds {
                start: start_sample,
                end: end_sample,
            });
        }
        Ok(Self {
            outgoing_track_id: outgoing_track_id.into(),
            incoming_track_id: incoming_track_id.into(),
            start_sample,
            end_sample,
            kind,
            curve,
            eq: EqSwapConfig::default(),
        })
    }

    pub fn with_eq(mut self, eq: EqSwapConfig) -> Self {
        self.eq = eq;
        self
    }

    pub fn outgoing_track_id(&self) -> &str {
        &self.outgoing_track_id
    }

    pub fn incoming_track_id(&self) -> &str {
        &self.incoming_track_id
    }

    pub fn start_sample(&self) -> u64 {
        self.start_sample
    }

    pub fn end_sample(&self) -> u64 {
        self.end_sample
    }

    pub fn duration_samples(&self) -> u64 {
        self.end_sample - self.start_sample
    }

    pub fn kind(&self) -> TransitionType {
        self.kind
    }

    pub fn curve(&self) -> CurveType {
        self.curve
    }

    pub fn eq(&self) -> &EqSwapConfig {
        &self.eq
    }

    pub fn contains(&self, position: u64) -> bool {
        position >= self.start_sample && position < self.end_sample
    }

    /// Whether `track_id` is either side of this transition
    pub fn involves(&self, track_id: &str) -> bool {
        self.outgoing_track_id == track_id || self.incoming_track_id == track_id
    }

    pub fn overlaps(&self, other: &TransitionRegion) -> bool {
        self.start_sample < other.end_sample && other.start_sample < self.end_sample
    }

    /// Whether the two regions share a track
    pub fn shares_track(&self, other: &TransitionRegion) -> bool {
        self.involves(&other.outgoing_track_id) || self.involves(&other.incoming_track_id)
    }

    /// Raw progress through the region, clamped to `[0, 1]`
    pub fn progress(&self, position: u64) -> f32 {
        let elapsed = position.saturating_sub(self.start_sample) as f64;
        (elapsed / self.duration_samples() as f64).clamp(0.0, 1.0) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn region(start: u64, end: u64) -> TransitionRegion {
        TransitionRegion::new("a", "b", start, end, TransitionType::Crossfade, CurveType::Linear)
            .unwrap()
    }

    #[test_case(100, 100; "empty")]
    #[test_case(200, 100; "reversed")]
    fn test_rejects_bad_bounds(start: u64, end: u64) {
        let err = TransitionRegion::new("a", "b", start, end, TransitionType::Cut, CurveType::Linear)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION_BOUNDS");
    }

    #[test]
    fn test_half_open_interval() {
        let r = region(100, 200);
        assert_eq!(r.duration_samples(), 100);
        assert!(!r.contains(99));
        assert!(r.contains(100));
        assert!(r.contains(199));
        assert!(!r.contains(200));
    }

    #[test]
    fn test_progress_is_clamped() {
        let r = region(1000, 2000);
        assert_eq!(r.progress(0), 0.0);
        assert_eq!(r.progress(1500), 0.5);
        assert_eq!(r.progress(5000), 1.0);
    }

    #[test]
    fn test_overlap_and_sharing() {
        let r = region(100, 200);
        assert!(r.overlaps(&region(150, 250)));
        assert!(!r.overlaps(&region(200, 300)));

        let other = TransitionRegion::new("c", "a", 0, 10, TransitionType::Cut, CurveType::Linear)
            .unwrap();
        assert!(r.shares_track(&other));
        let unrelated =
            TransitionRegion::new("x", "y", 0, 10, TransitionType::Cut, CurveType::Linear).unwrap();
        assert!(!r.shares_track(&unrelated));
    }

    #[test]
    fn test_type_parsing() {
        assert_eq!("eq-swap".parse::<TransitionType>().unwrap(), TransitionType::EqSwap);
        assert_eq!(
            "Filter_Sweep".parse::<TransitionType>().unwrap(),
            TransitionType::FilterSweep
        );
        assert!("scratch".parse::<TransitionType>().is_err());
    }
}
