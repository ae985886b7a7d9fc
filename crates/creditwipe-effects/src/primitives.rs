//! CPU image primitives used by the mask and display stages.
//!
//! Conventions follow 8-bit OpenCV: HSV stores hue halved into `0..=179`,
//! range thresholds are inclusive, dilation uses a rectangular kernel with a
//! centred anchor and ignores pixels outside the image. Crop and
//! nearest-neighbour resize go through `image::imageops`, which samples the
//! source pixel under each destination pixel's centre.
//!
//! None of these operations fail. Rows are independent, so every per-pixel
//! pass runs over rows with rayon.

use creditwipe_core::{FrameBuffer, HsvBand, Mask, PixelFormat, Rect, MASK_OFF, MASK_ON};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Pixel, Rgb, Rgba};
use rayon::prelude::*;

/// Convert one RGB pixel to 8-bit HSV (`H` in `0..=179`).
#[inline]
pub fn rgb_to_hsv_pixel(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };

    let h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    [
        ((h / 2.0).round() as u32 % 180) as u8,
        s.round() as u8,
        v as u8,
    ]
}

/// Convert a frame to HSV. The result is an `Rgb8` frame whose channels hold
/// H, S and V. Alpha is ignored; grayscale frames get zero hue and saturation.
pub fn rgb_to_hsv(frame: &FrameBuffer) -> FrameBuffer {
    let mut out = FrameBuffer::new(frame.width, frame.height, PixelFormat::Rgb8);
    if frame.is_empty() {
        return out;
    }
    let bpp = frame.bytes_per_pixel();
    let width = frame.width as usize;
    let stride = out.stride();
    out.raw_data_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, dst)| {
            let src = frame.row(y as u32);
            for x in 0..width {
                let px = &src[x * bpp..(x + 1) * bpp];
                let hsv = match frame.format {
                    PixelFormat::Gray8 => [0, 0, px[0]],
                    PixelFormat::Rgb8 | PixelFormat::Rgba8 => {
                        rgb_to_hsv_pixel(px[0], px[1], px[2])
                    }
                };
                dst[x * 3..x * 3 + 3].copy_from_slice(&hsv);
            }
        });
    out
}

/// Select pixels whose three channels each lie inside their inclusive band.
pub fn in_range(hsv: &FrameBuffer, bands: [HsvBand; 3]) -> Mask {
    let mut mask = Mask::empty(hsv.width, hsv.height);
    if hsv.is_empty() {
        return mask;
    }
    let bpp = hsv.bytes_per_pixel();
    let width = hsv.width as usize;
    mask.as_mut_slice()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, dst)| {
            let src = hsv.row(y as u32);
            for (x, out) in dst.iter_mut().enumerate() {
                let px = &src[x * bpp..x * bpp + 3];
                let hit = bands[0].contains(px[0])
                    && bands[1].contains(px[1])
                    && bands[2].contains(px[2]);
                *out = if hit { MASK_ON } else { MASK_OFF };
            }
        });
    mask
}

/// Morphological dilation with a `kernel × kernel` rectangle anchored at
/// `kernel / 2`. Kernels of size 0 or 1 return the input unchanged.
///
/// The rectangle is separable, so this runs a horizontal then a vertical
/// window-max pass, each in O(1) per pixel using prefix counts.
pub fn dilate(mask: &Mask, kernel: u32) -> Mask {
    if kernel <= 1 || mask.width == 0 || mask.height == 0 {
        return mask.clone();
    }
    let anchor = (kernel / 2) as usize;
    // Window covers offsets [-before, +after] around each pixel.
    let before = anchor;
    let after = kernel as usize - 1 - anchor;
    let width = mask.width as usize;
    let height = mask.height as usize;

    let mut horizontal = Mask::empty(mask.width, mask.height);
    horizontal
        .as_mut_slice()
        .par_chunks_mut(width)
        .zip(mask.as_slice().par_chunks(width))
        .for_each(|(dst, src)| window_any(src, dst, before, after));

    // Column pass on the transposed layout.
    let mut transposed = vec![MASK_OFF; width * height];
    transpose(horizontal.as_slice(), &mut transposed, width, height);
    let mut columns = vec![MASK_OFF; width * height];
    columns
        .par_chunks_mut(height)
        .zip(transposed.par_chunks(height))
        .for_each(|(dst, src)| window_any(src, dst, before, after));

    let mut out = Mask::empty(mask.width, mask.height);
    transpose(&columns, out.as_mut_slice(), height, width);
    out
}

/// `dst[i] = ON` iff any of `src[i - before ..= i + after]` (clipped) is set.
fn window_any(src: &[u8], dst: &mut [u8], before: usize, after: usize) {
    let n = src.len();
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0u32);
    let mut running = 0u32;
    for &v in src {
        running += (v != MASK_OFF) as u32;
        prefix.push(running);
    }
    for (i, out) in dst.iter_mut().enumerate() {
        let lo = i.saturating_sub(before);
        let hi = (i + after + 1).min(n);
        *out = if prefix[hi] > prefix[lo] { MASK_ON } else { MASK_OFF };
    }
}

/// Transpose a `width × height` row-major buffer into `height × width`.
fn transpose(src: &[u8], dst: &mut [u8], width: usize, height: usize) {
    dst.par_chunks_mut(height).enumerate().for_each(|(x, column)| {
        for (y, out) in column.iter_mut().enumerate() {
            *out = src[y * width + x];
        }
    });
}

/// Keep frame pixels where the mask is set and black out the rest.
///
/// # Panics
/// Panics if the mask and frame differ in size.
pub fn mask_frame(frame: &FrameBuffer, mask: &Mask) -> FrameBuffer {
    assert!(
        mask.width == frame.width && mask.height == frame.height,
        "mask size mismatch: {}x{} vs frame {}x{}",
        mask.width,
        mask.height,
        frame.width,
        frame.height
    );
    let mut out = frame.clone();
    if out.is_empty() {
        return out;
    }
    let bpp = out.bytes_per_pixel();
    let stride = out.stride();
    out.raw_data_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            let selection = mask.row(y as u32);
            for (px, &m) in row.chunks_exact_mut(bpp).zip(selection) {
                if m == MASK_OFF {
                    px.fill(0);
                }
            }
        });
    out
}

/// Copy the part of `frame` inside `rect`, clipped to the frame.
pub fn crop(frame: &FrameBuffer, rect: Rect) -> FrameBuffer {
    let Some(rect) = rect.intersection(Rect::new(0, 0, frame.width, frame.height)) else {
        return FrameBuffer::new(0, 0, frame.format);
    };
    if rect == Rect::new(0, 0, frame.width, frame.height) {
        return frame.clone();
    }
    match frame.format {
        PixelFormat::Gray8 => crop_as::<Luma<u8>>(frame, rect),
        PixelFormat::Rgb8 => crop_as::<Rgb<u8>>(frame, rect),
        PixelFormat::Rgba8 => crop_as::<Rgba<u8>>(frame, rect),
    }
}

/// Nearest-neighbour resize to `width × height`.
pub fn resize_nearest(frame: &FrameBuffer, width: u32, height: u32) -> FrameBuffer {
    if width == frame.width && height == frame.height {
        return frame.clone();
    }
    if width == 0 || height == 0 || frame.is_empty() {
        return FrameBuffer::new(width, height, frame.format);
    }
    match frame.format {
        PixelFormat::Gray8 => resize_as::<Luma<u8>>(frame, width, height),
        PixelFormat::Rgb8 => resize_as::<Rgb<u8>>(frame, width, height),
        PixelFormat::Rgba8 => resize_as::<Rgba<u8>>(frame, width, height),
    }
}

fn crop_as<P>(frame: &FrameBuffer, rect: Rect) -> FrameBuffer
where
    P: Pixel<Subpixel = u8> + 'static,
{
    match to_image::<P>(frame) {
        Some(src) => {
            let out = imageops::crop_imm(&src, rect.x, rect.y, rect.width, rect.height).to_image();
            from_image(&out, frame.format)
        }
        None => FrameBuffer::new(0, 0, frame.format),
    }
}

fn resize_as<P>(frame: &FrameBuffer, width: u32, height: u32) -> FrameBuffer
where
    P: Pixel<Subpixel = u8> + 'static,
{
    match to_image::<P>(frame) {
        Some(src) => {
            let out = imageops::resize(&src, width, height, FilterType::Nearest);
            from_image(&out, frame.format)
        }
        None => FrameBuffer::new(width, height, frame.format),
    }
}

/// View a frame as an `image` buffer. `P` must match the frame's format.
fn to_image<P>(frame: &FrameBuffer) -> Option<ImageBuffer<P, Vec<u8>>>
where
    P: Pixel<Subpixel = u8>,
{
    ImageBuffer::from_raw(frame.width, frame.height, frame.to_packed())
}

fn from_image<P>(image: &ImageBuffer<P, Vec<u8>>, format: PixelFormat) -> FrameBuffer
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = image.dimensions();
    FrameBuffer::from_packed(width, height, format, image.as_raw())
        .unwrap_or_else(|| FrameBuffer::new(width, height, format))
}
