//! Frame rate representation for seek positions and encoder settings.
//!
//! Frame rates are kept as numerator/denominator pairs so that NTSC rates
//! round-trip exactly between ffprobe and the encoder command line.

use crate::error::{Result, WipeError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Frame rate as a rational number (e.g., 24000/1001 for 23.976 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 24000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Approximate a floating point rate, snapping to the NTSC rates.
    pub fn from_fps_f64(fps: f64) -> Self {
        const KNOWN: [FrameRate; 8] = [
            FrameRate::FPS_23_976,
            FrameRate::FPS_24,
            FrameRate::FPS_25,
            FrameRate::FPS_29_97,
            FrameRate::FPS_30,
            FrameRate::FPS_50,
            FrameRate::FPS_59_94,
            FrameRate::FPS_60,
        ];
        if !fps.is_finite() || fps <= 0.0 {
            return Self::default();
        }
        if let Some(rate) = KNOWN
            .iter()
            .find(|rate| (rate.to_fps_f64() - fps).abs() < 0.001)
        {
            return *rate;
        }
        Self::new((fps * 1000.0).round() as u32, 1000)
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        self.numerator as f64 / self.denominator as f64
    }

    /// Presentation time of a frame index, in seconds.
    #[inline]
    pub fn frame_to_seconds(self, frame: usize) -> f64 {
        if self.numerator == 0 {
            return 0.0;
        }
        frame as f64 * self.denominator as f64 / self.numerator as f64
    }

    /// Number of whole frames in a duration, in seconds.
    #[inline]
    pub fn seconds_to_frames(self, seconds: f64) -> usize {
        (seconds * self.to_fps_f64()).round().max(0.0) as usize
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_59_94: Self = Self::new(60000, 1001);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_24
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// Parses ffprobe's `"num/den"` notation as well as plain numbers.
impl FromStr for FrameRate {
    type Err = WipeError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parse = |part: &str| {
            part.trim().parse::<u32>().map_err(|_| {
                WipeError::InvalidParameter(format!("invalid frame rate: {s:?}"))
            })
        };
        let rate = match s.split_once('/') {
            Some((num, den)) => Self::new(parse(num)?, parse(den)?),
            None => {
                let fps: f64 = s.parse().map_err(|_| {
                    WipeError::InvalidParameter(format!("invalid frame rate: {s:?}"))
                })?;
                Self::from_fps_f64(fps)
            }
        };
        if rate.numerator == 0 || rate.denominator == 0 {
            return Err(WipeError::InvalidParameter(format!(
                "invalid frame rate: {s:?}"
            )));
        }
        Ok(rate)
    }
}
