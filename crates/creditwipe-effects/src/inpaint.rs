//! Onion-peel inpainting.
//!
//! Selected mask pixels are filled from the outside in. Each pass takes the
//! unknown pixels that touch the known region, replaces every one with a
//! distance-weighted average of the known pixels within `radius`, then marks
//! the whole layer known. Values inside a layer only depend on the previous
//! layers, so each layer is computed in parallel.

use creditwipe_core::{FrameBuffer, Mask, MASK_OFF};
use rayon::prelude::*;
use tracing::trace;

/// Fill the pixels selected in `mask` from their surroundings.
///
/// A radius of 0 is treated as 1. If the mask selects every pixel there is
/// nothing to sample from and the frame is returned unchanged.
///
/// # Panics
/// Panics if the mask and frame differ in size.
pub fn inpaint(frame: &FrameBuffer, mask: &Mask, radius: u32) -> FrameBuffer {
    assert!(
        mask.width == frame.width && mask.height == frame.height,
        "mask size mismatch: {}x{} vs frame {}x{}",
        mask.width,
        mask.height,
        frame.width,
        frame.height
    );
    let mut out = frame.clone();
    if frame.is_empty() || mask.is_all_clear() || mask.is_all_selected() {
        return out;
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let bpp = frame.bytes_per_pixel();
    let radius = radius.max(1) as i64;
    let radius_sq = radius * radius;

    let mut known: Vec<bool> = mask.as_slice().iter().map(|&m| m == MASK_OFF).collect();
    let mut queued = known.clone();

    // First layer: unknown pixels with a known 4-neighbour.
    let mut layer: Vec<usize> = (0..width * height)
        .filter(|&i| !known[i] && neighbours(i, width, height).any(|n| known[n]))
        .collect();
    for &i in &layer {
        queued[i] = true;
    }

    let mut passes = 0usize;
    while !layer.is_empty() {
        let fills: Vec<[u8; 4]> = layer
            .par_iter()
            .map(|&i| {
                let (x, y) = ((i % width) as i64, (i / width) as i64);
                let mut acc = [0f64; 4];
                let mut total = 0f64;
                for dy in -radius..=radius {
                    let sy = y + dy;
                    if sy < 0 || sy >= height as i64 {
                        continue;
                    }
                    for dx in -radius..=radius {
                        let sx = x + dx;
                        let d2 = dx * dx + dy * dy;
                        if sx < 0 || sx >= width as i64 || d2 > radius_sq {
                            continue;
                        }
                        let si = sy as usize * width + sx as usize;
                        if !known[si] {
                            continue;
                        }
                        let weight = 1.0 / d2 as f64;
                        let px = out.pixel(sx as u32, sy as u32);
                        for (a, &c) in acc.iter_mut().zip(px) {
                            *a += weight * c as f64;
                        }
                        total += weight;
                    }
                }
                let mut value = [0u8; 4];
                if total > 0.0 {
                    for (v, a) in value.iter_mut().zip(acc) {
                        *v = (a / total).round().clamp(0.0, 255.0) as u8;
                    }
                }
                value
            })
            .collect();

        for (&i, value) in layer.iter().zip(&fills) {
            let (x, y) = ((i % width) as u32, (i / width) as u32);
            let start = x as usize * bpp;
            out.row_mut(y)[start..start + bpp].copy_from_slice(&value[..bpp]);
            known[i] = true;
        }

        let mut next = Vec::new();
        for &i in &layer {
            for n in neighbours(i, width, height) {
                if !queued[n] {
                    queued[n] = true;
                    next.push(n);
                }
            }
        }
        layer = next;
        passes += 1;
    }

    trace!(passes, radius, "inpainted frame");
    out
}

/// 4-connected neighbours of a flat index.
fn neighbours(i: usize, width: usize, height: usize) -> impl Iterator<Item = usize> {
    let (x, y) = (i % width, i / width);
    [
        (x > 0).then(|| i - 1),
        (x + 1 < width).then(|| i + 1),
        (y > 0).then(|| i - width),
        (y + 1 < height).then(|| i + width),
    ]
    .into_iter()
    .flatten()
}
