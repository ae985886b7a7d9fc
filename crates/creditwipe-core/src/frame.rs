//! Frame buffer types for decoded video frames in CPU memory.
//!
//! Frames are packed 8-bit images with 64-byte aligned rows. Decoded frames
//! are shared between the frame cache and the pipeline stages as
//! [`SharedFrameBuffer`], so a cache eviction never invalidates an artifact
//! a stage still holds.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGB (24 bits per pixel), the decoder's native output
    #[default]
    Rgb8,
    /// 8-bit RGBA (32 bits per pixel)
    Rgba8,
    /// 8-bit grayscale
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
            Self::Gray8 => 1,
        }
    }

    /// Size in bytes of a tightly packed frame of this format.
    pub fn packed_size(self, width: u32, height: u32) -> usize {
        width as usize * height as usize * self.bytes_per_pixel()
    }
}

/// A video frame in CPU memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per row (may include padding)
    stride: usize,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Create a zeroed frame buffer with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        // Align stride to 64 bytes for SIMD-friendly row access
        let min_stride = width as usize * format.bytes_per_pixel();
        let stride = (min_stride + 63) & !63;
        Self {
            format,
            width,
            height,
            stride,
            data: vec![0u8; stride * height as usize],
        }
    }

    /// Build a frame from tightly packed rows, as produced by ffmpeg's rawvideo
    /// output. Returns `None` if `packed` is too short.
    pub fn from_packed(width: u32, height: u32, format: PixelFormat, packed: &[u8]) -> Option<Self> {
        let row_len = width as usize * format.bytes_per_pixel();
        if packed.len() < row_len * height as usize {
            return None;
        }
        let mut frame = Self::new(width, height, format);
        if row_len > 0 {
            for (y, src) in packed.chunks_exact(row_len).take(height as usize).enumerate() {
                frame.row_mut(y as u32).copy_from_slice(src);
            }
        }
        Some(frame)
    }

    /// Bytes per row, including padding.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Bytes per pixel of this frame's format.
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    /// True if the frame has no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Get a row of pixel data (without padding).
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel();
        &self.data[start..end]
    }

    /// Get a mutable row of pixel data (without padding).
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel();
        &mut self.data[start..end]
    }

    /// Iterate over all rows mutably, yielding `(y, row)`.
    ///
    /// Rows are disjoint, which lets callers hand them to rayon.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = (u32, &mut [u8])> {
        let row_len = self.width as usize * self.bytes_per_pixel();
        self.data
            .chunks_mut(self.stride.max(1))
            .take(self.height as usize)
            .enumerate()
            .map(move |(y, chunk)| (y as u32, &mut chunk[..row_len]))
    }

    /// Raw mutable buffer including row padding, for row-parallel writers.
    #[inline]
    pub fn raw_data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copy the pixels out without row padding.
    pub fn to_packed(&self) -> Vec<u8> {
        let row_len = self.width as usize * self.bytes_per_pixel();
        let mut out = Vec::with_capacity(row_len * self.height as usize);
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }

    /// Read one pixel's channels.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.bytes_per_pixel();
        let i = x as usize * bpp;
        &self.row(y)[i..i + bpp]
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len()
    }

    /// Create a frame filled with a single RGB color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgb8);
        for (_, row) in frame.rows_mut() {
            for px in row.chunks_exact_mut(3) {
                px.copy_from_slice(&rgb);
            }
        }
        frame
    }

    /// Create a test pattern frame (color bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        let colors: [[u8; 3]; 8] = [
            [255, 255, 255], // White
            [255, 255, 0],   // Yellow
            [0, 255, 255],   // Cyan
            [0, 255, 0],     // Green
            [255, 0, 255],   // Magenta
            [255, 0, 0],     // Red
            [0, 0, 255],     // Blue
            [0, 0, 0],       // Black
        ];
        let mut frame = Self::new(width, height, PixelFormat::Rgb8);
        for (_, row) in frame.rows_mut() {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let bar = x * 8 / width.max(1) as usize;
                px.copy_from_slice(&colors[bar.min(7)]);
            }
        }
        frame
    }
}

/// Arc-wrapped frame buffer for shared ownership.
pub type SharedFrameBuffer = Arc<FrameBuffer>;
