//! Mapping between the preview viewport and source pixels.

use creditwipe_core::Rect;

/// Computes which part of the source is visible at a given zoom and pan.
pub struct ViewportMapper;

impl ViewportMapper {
    /// Zoom factor at which the whole source fits inside the viewport.
    pub fn fit_zoom(source_w: u32, source_h: u32, viewport_w: u32, viewport_h: u32) -> f64 {
        if source_w == 0 || source_h == 0 {
            return 1.0;
        }
        (viewport_w as f64 / source_w as f64).min(viewport_h as f64 / source_h as f64)
    }

    /// Source-space rectangle that, scaled by `zoom`, fills at most the
    /// viewport, centred on the anchor and clamped into the source.
    ///
    /// A non-positive or non-finite zoom yields the full source. The result
    /// is always at least 1×1 and inside the source.
    pub fn crop_rectangle(
        zoom: f64,
        anchor_x: f64,
        anchor_y: f64,
        source_w: u32,
        source_h: u32,
        viewport_w: u32,
        viewport_h: u32,
    ) -> Rect {
        let full = Rect::new(0, 0, source_w, source_h);
        if !zoom.is_finite() || zoom <= 0.0 || full.is_empty() {
            return full;
        }
        let (x, width) = Self::span(zoom, anchor_x, source_w, viewport_w);
        let (y, height) = Self::span(zoom, anchor_y, source_h, viewport_h);
        Rect::new(x, y, width, height)
    }

    /// One axis of [`ViewportMapper::crop_rectangle`].
    fn span(zoom: f64, anchor: f64, source: u32, viewport: u32) -> (u32, u32) {
        let source_f = source as f64;
        let visible = (source_f * zoom).min(viewport as f64) / zoom;
        let max_origin = (source_f - visible).max(0.0);
        let anchor = if anchor.is_finite() { anchor } else { source_f / 2.0 };
        let origin = (anchor - visible / 2.0).clamp(0.0, max_origin);

        let start = (origin.floor() as u32).min(source - 1);
        let extent = (visible.round() as u32).clamp(1, source - start);
        (start, extent)
    }

    /// Output size of the zoom stage: `rect` scaled by `zoom`, at least 1×1
    /// and no larger than the viewport.
    pub fn scaled_size(rect: Rect, zoom: f64, viewport_w: u32, viewport_h: u32) -> (u32, u32) {
        let scale = |len: u32, limit: u32| {
            let scaled = if zoom.is_finite() && zoom > 0.0 {
                (len as f64 * zoom).round()
            } else {
                len as f64
            };
            (scaled as u32).clamp(1, limit.max(1))
        };
        (scale(rect.width, viewport_w), scale(rect.height, viewport_h))
    }
}
