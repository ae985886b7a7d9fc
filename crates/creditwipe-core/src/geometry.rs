//! Integer pixel geometry.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from its edges. `right`/`bottom` are exclusive and
    /// must not be smaller than `left`/`top`.
    #[inline]
    pub fn from_edges(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self::new(
            left,
            top,
            right.saturating_sub(left),
            bottom.saturating_sub(top),
        )
    }

    /// Exclusive right edge.
    #[inline]
    pub fn right(self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    #[inline]
    pub fn bottom(self) -> u32 {
        self.y + self.height
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub fn contains(self, x: u32, y: u32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Compute intersection with another rectangle.
    pub fn intersection(self, other: Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x1 < x2 && y1 < y2 {
            Some(Self::from_edges(x1, y1, x2, y2))
        } else {
            None
        }
    }
}

/// A crop box as entered by the operator: edges in source pixels that may be
/// negative, beyond the frame, or swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CropRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl CropRect {
    pub const fn new(left: i64, top: i64, right: i64, bottom: i64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Crop box covering a whole `width × height` frame.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i64, height as i64)
    }

    /// Swap inverted edges, then clamp every edge independently into
    /// `[0, width] × [0, height]`.
    pub fn normalize(self, width: u32, height: u32) -> Rect {
        let (left, right) = if self.left > self.right {
            (self.right, self.left)
        } else {
            (self.left, self.right)
        };
        let (top, bottom) = if self.top > self.bottom {
            (self.bottom, self.top)
        } else {
            (self.top, self.bottom)
        };
        let clamp_x = |v: i64| v.clamp(0, width as i64) as u32;
        let clamp_y = |v: i64| v.clamp(0, height as i64) as u32;
        Rect::from_edges(clamp_x(left), clamp_y(top), clamp_x(right), clamp_y(bottom))
    }
}
