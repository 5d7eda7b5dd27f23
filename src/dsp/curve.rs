//! Transition curve shapes
//!
//! Maps normalized progress `t` in `[0, 1]` through a named shaping
//! function. All shapes return exactly 0 at `t = 0` and exactly 1 at `t = 1`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DeckflowError;

/// Named progress-shaping functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveType {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    /// Smoothstep
    SCurve,
    ExponentialIn,
    ExponentialOut,
}

impl CurveType {
    pub const ALL: [CurveType; 7] = [
        CurveType::Linear,
        CurveType::EaseIn,
        CurveType::EaseOut,
        CurveType::EaseInOut,
        CurveType::SCurve,
        CurveType::ExponentialIn,
        CurveType::ExponentialOut,
    ];

    /// Shape `t` (clamped to `[0, 1]`) through this curve
    pub fn apply(self, t: f32) -> f32 {
        apply_curve(t, self)
    }

    fn as_str(&self) -> &'static str {
        match self {
            CurveType::Linear => "linear",
            CurveType::EaseIn => "ease_in",
            CurveType::EaseOut => "ease_out",
            CurveType::EaseInOut => "ease_in_out",
            CurveType::SCurve => "s_curve",
            CurveType::ExponentialIn => "exponential_in",
            CurveType::ExponentialOut => "exponential_out",
        }
    }
}

impl fmt::Display for CurveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurveType {
    type Err = DeckflowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        CurveType::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| DeckflowError::InvalidParameter {
                param: "curve".to_string(),
                value: s.to_string(),
                expected: "linear, ease_in, ease_out, ease_in_out, s_curve, exponential_in or exponential_out"
                    .to_string(),
            })
    }
}

/// Shape normalized progress through `curve`
#[inline]
pub fn apply_curve(t: f32, curve: CurveType) -> f32 {
    let t = t.clamp(0.0, 1.0);
    match curve {
        CurveType::Linear => t,
        CurveType::EaseIn => t * t,
        CurveType::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
        CurveType::EaseInOut => {
            if t < 0.5 {
                2.0 * t * t
            } else {
                1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
            }
        }
        CurveType::SCurve => t * t * (3.0 - 2.0 * t),
        // Endpoints pinned: the raw exponential never reaches 0 / 1
        CurveType::ExponentialIn => {
            if t <= 0.0 {
                0.0
            } else if t >= 1.0 {
                1.0
            } else {
                2.0_f32.powf(10.0 * (t - 1.0))
            }
        }
        CurveType::ExponentialOut => {
            if t <= 0.0 {
                0.0
            } else if t >= 1.0 {
                1.0
            } else {
                1.0 - 2.0_f32.powf(-10.0 * t)
            }
        }
    }
}
