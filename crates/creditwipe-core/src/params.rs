//! Operator-facing parameter snapshots.
//!
//! Every stage of the preview pipeline remembers the snapshot it last ran
//! with and compares the next one by field equality, so these types are
//! plain values with `PartialEq`.

use crate::error::{Result, WipeError};
use crate::geometry::CropRect;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound of the 8-bit hue channel.
pub const HUE_MAX: i32 = 179;
/// Upper bound of the saturation channel.
pub const SAT_MAX: i32 = 255;
/// Upper bound of the value channel.
pub const VAL_MAX: i32 = 255;

/// How a mask layer contributes to the combined selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MaskMode {
    /// Always inpaint the selected region.
    #[default]
    Include,
    /// Never inpaint the selected region.
    Exclude,
}

impl fmt::Display for MaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Include => write!(f, "Always inpaint"),
            Self::Exclude => write!(f, "Never inpaint"),
        }
    }
}

/// Inclusive `[min, max]` band on one HSV channel.
///
/// Bands are stored as entered. A band with `min > max` selects nothing and
/// out-of-range bounds simply never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HsvBand {
    pub min: i32,
    pub max: i32,
}

impl HsvBand {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(self, value: u8) -> bool {
        let v = value as i32;
        v >= self.min && v <= self.max
    }

    pub fn is_inverted(self) -> bool {
        self.min > self.max
    }
}

/// Parameters of one mask layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaskParameters {
    /// Reference frame the threshold is computed on.
    pub frame: usize,
    pub mode: MaskMode,
    pub hue: HsvBand,
    pub sat: HsvBand,
    pub val: HsvBand,
    /// Dilation kernel size; 0 disables growing.
    pub grow: u32,
    pub crop: CropRect,
}

impl MaskParameters {
    /// Default layer: include everything in a `width × height` frame.
    pub fn full_frame(frame: usize, width: u32, height: u32) -> Self {
        Self {
            frame,
            mode: MaskMode::Include,
            hue: HsvBand::new(0, HUE_MAX),
            sat: HsvBand::new(0, SAT_MAX),
            val: HsvBand::new(0, VAL_MAX),
            grow: 0,
            crop: CropRect::full(width, height),
        }
    }

    /// True if `other` would render the same mask from the same frame.
    ///
    /// The frame and the mode are excluded: the frame is tracked by the load
    /// stage and the mode only affects combination.
    pub fn same_render_fields(&self, other: &Self) -> bool {
        self.hue == other.hue
            && self.sat == other.sat
            && self.val == other.val
            && self.grow == other.grow
            && self.crop == other.crop
    }
}

/// Snapshot of the override paint layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DrawParameters {
    pub frame: usize,
}

/// What the preview shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    /// The decoded frame untouched.
    Original,
    /// The frame with everything outside the mask blacked out.
    #[default]
    Mask,
    /// The override layer.
    Draw,
    /// The frame inpainted with the current mask.
    Preview,
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Original => "Original",
            Self::Mask => "Areas to inpaint",
            Self::Draw => "Overrides",
            Self::Preview => "Preview",
        };
        f.write_str(label)
    }
}

/// Preview zoom.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Zoom {
    /// Scale the whole source into the viewport.
    #[default]
    Fit,
    /// Explicit scale factor (1.0 = 100%).
    Factor(f64),
}

impl Zoom {
    /// Zoom ladder used by [`Zoom::zoom_in`] and [`Zoom::zoom_out`].
    pub const LEVELS: [f64; 9] = [0.10, 0.25, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 5.0];

    /// Effective scale factor, resolving `Fit` to `fit`.
    pub fn factor(self, fit: f64) -> f64 {
        match self {
            Self::Fit => fit,
            Self::Factor(f) => f,
        }
    }

    /// Next ladder level above the current factor. Unchanged at the top.
    pub fn zoom_in(self, fit: f64) -> Self {
        let current = self.factor(fit);
        Self::LEVELS
            .iter()
            .find(|&&level| level > current)
            .map(|&level| Self::Factor(level))
            .unwrap_or(self)
    }

    /// Next ladder level below the current factor, bottoming out at 10%.
    pub fn zoom_out(self, fit: f64) -> Self {
        let current = self.factor(fit);
        let level = Self::LEVELS
            .iter()
            .rev()
            .find(|&&level| level < current)
            .copied()
            .unwrap_or(Self::LEVELS[0]);
        Self::Factor(level)
    }
}

impl fmt::Display for Zoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fit => write!(f, "Fit"),
            Self::Factor(factor) => write!(f, "{}%", (factor * 100.0).round()),
        }
    }
}

/// Parameters of the display stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayParameters {
    pub mode: DisplayMode,
    pub zoom: Zoom,
    /// Point in source coordinates kept centred in the viewport.
    pub anchor_x: f64,
    pub anchor_y: f64,
}

impl DisplayParameters {
    /// Mask view at Fit, anchored at the centre of a `width × height` source.
    pub fn centred(width: u32, height: u32) -> Self {
        Self {
            mode: DisplayMode::Mask,
            zoom: Zoom::Fit,
            anchor_x: (width / 2) as f64,
            anchor_y: (height / 2) as f64,
        }
    }

    /// True if the zoom stage would produce the same crop.
    pub fn same_view(&self, other: &Self) -> bool {
        self.zoom == other.zoom && self.anchor_x == other.anchor_x && self.anchor_y == other.anchor_y
    }
}

impl Default for DisplayParameters {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Mask,
            zoom: Zoom::Fit,
            anchor_x: 0.0,
            anchor_y: 0.0,
        }
    }
}

/// Default inpainting neighbourhood radius in pixels.
pub const DEFAULT_INPAINT_RADIUS: u32 = 3;

/// A full-video render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RenderJobParameters {
    pub start_frame: usize,
    /// Inclusive.
    pub end_frame: usize,
    pub inpaint_radius: u32,
}

impl RenderJobParameters {
    pub fn new(start_frame: usize, end_frame: usize, inpaint_radius: u32) -> Self {
        Self {
            start_frame,
            end_frame,
            inpaint_radius,
        }
    }

    /// Number of frames covered, zero for an inverted range.
    pub fn frame_count(&self) -> usize {
        if self.start_frame > self.end_frame {
            0
        } else {
            self.end_frame - self.start_frame + 1
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_frame > self.end_frame {
            return Err(WipeError::InvalidParameter(format!(
                "start frame {} is after end frame {}",
                self.start_frame, self.end_frame
            )));
        }
        Ok(())
    }
}

impl Default for RenderJobParameters {
    fn default() -> Self {
        Self::new(0, 0, DEFAULT_INPAINT_RADIUS)
    }
}
