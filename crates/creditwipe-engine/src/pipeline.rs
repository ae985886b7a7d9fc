//! Incremental preview pipeline.
//!
//! The pipeline keeps, for every stage, the parameter snapshot it last ran
//! with and the artifact it produced:
//!
//! ```text
//! mask frame ─▶ mask ─▶ combined mask ─┐
//!                                      ├─▶ display image ─▶ zoomed image
//!                       display frame ─┘
//! ```
//!
//! A stage reruns only if one of its inputs differs from its snapshot or an
//! upstream stage reran. Every call computes into locals first and commits
//! them only once nothing can fail, so an error leaves the previous state
//! untouched.

use creditwipe_core::{
    DisplayMode, DisplayParameters, DrawParameters, FrameBuffer, Mask, MaskMode, MaskParameters,
    RenderJobParameters, Result, SharedFrameBuffer, WipeError,
};
use creditwipe_effects::primitives::{crop, mask_frame, resize_nearest};
use creditwipe_effects::{inpaint, MaskCombiner, MaskRenderer, ViewportMapper};
use creditwipe_media::{FrameCache, VideoInfo};
use std::sync::Arc;
use tracing::debug;

/// How often each stage actually ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frame_loads: usize,
    pub mask_renders: usize,
    pub mask_combines: usize,
    pub display_renders: usize,
    pub zoom_renders: usize,
}

struct LoadedFrame {
    index: usize,
    frame: SharedFrameBuffer,
}

struct RenderedMask {
    params: MaskParameters,
    mask: Arc<Mask>,
}

struct CombinedMask {
    mode: MaskMode,
    draw: DrawParameters,
    mask: Arc<Mask>,
}

struct DisplayImage {
    mode: DisplayMode,
    radius: u32,
    image: SharedFrameBuffer,
}

struct ZoomedImage {
    view: DisplayParameters,
    image: SharedFrameBuffer,
}

/// Memoized mask and display stages for one open video.
pub struct Pipeline {
    cache: Arc<FrameCache>,
    viewport: (u32, u32),
    mask_frame: Option<LoadedFrame>,
    mask: Option<RenderedMask>,
    combined: Option<CombinedMask>,
    /// Set whenever the combined mask is recomputed; forces the display
    /// stage to rerun on its next call.
    mask_changed: bool,
    display_frame: Option<LoadedFrame>,
    display: Option<DisplayImage>,
    zoomed: Option<ZoomedImage>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(cache: Arc<FrameCache>, viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            cache,
            viewport: (viewport_width.max(1), viewport_height.max(1)),
            mask_frame: None,
            mask: None,
            combined: None,
            mask_changed: false,
            display_frame: None,
            display: None,
            zoomed: None,
            stats: PipelineStats::default(),
        }
    }

    /// Bring the combined mask up to date with `params` and `draw`.
    ///
    /// Returns the combined mask. Fails with [`WipeError::FrameLoad`] if the
    /// reference frame cannot be decoded.
    pub fn update_mask(
        &mut self,
        params: &MaskParameters,
        draw: &DrawParameters,
    ) -> Result<Arc<Mask>> {
        let (frame_changed, frame) = Self::load(&self.cache, &self.mask_frame, params.frame)?;

        let mask_stale = frame_changed
            || self
                .mask
                .as_ref()
                .map_or(true, |last| !last.params.same_render_fields(params));
        let mask = match &self.mask {
            Some(last) if !mask_stale => Arc::clone(&last.mask),
            _ => {
                debug!(frame = params.frame, grow = params.grow, "rendering mask");
                Arc::new(MaskRenderer::render(&frame, params))
            }
        };

        let recombine = mask_stale
            || self
                .combined
                .as_ref()
                .map_or(true, |last| last.mode != params.mode || last.draw != *draw);
        // The override layer is not painted yet, so there is no bottom mask.
        let combined = match &self.combined {
            Some(last) if !recombine => Arc::clone(&last.mask),
            _ => {
                debug!(mode = ?params.mode, "combining mask layers");
                Arc::new(MaskCombiner::combine(params.mode, &mask, None))
            }
        };

        if frame_changed {
            self.stats.frame_loads += 1;
            self.mask_frame = Some(LoadedFrame {
                index: params.frame,
                frame,
            });
        }
        if mask_stale {
            self.stats.mask_renders += 1;
            self.mask = Some(RenderedMask {
                params: params.clone(),
                mask,
            });
        }
        if recombine {
            self.stats.mask_combines += 1;
            self.mask_changed = true;
            self.combined = Some(CombinedMask {
                mode: params.mode,
                draw: *draw,
                mask: Arc::clone(&combined),
            });
        }
        Ok(combined)
    }

    /// Produce the preview image for `frame`.
    ///
    /// Fails with [`WipeError::MaskUnavailable`] before the first successful
    /// [`Pipeline::update_mask`], or with [`WipeError::FrameLoad`].
    pub fn apply_display(
        &mut self,
        frame: usize,
        view: &DisplayParameters,
        render: &RenderJobParameters,
    ) -> Result<SharedFrameBuffer> {
        let combined = self
            .combined
            .as_ref()
            .map(|c| Arc::clone(&c.mask))
            .ok_or(WipeError::MaskUnavailable)?;

        let (frame_changed, loaded) = Self::load(&self.cache, &self.display_frame, frame)?;

        let radius = render.inpaint_radius;
        let mode_stale = frame_changed
            || self.mask_changed
            || self.display.as_ref().map_or(true, |last| {
                last.mode != view.mode
                    || (view.mode == DisplayMode::Preview && last.radius != radius)
            });
        let image = match &self.display {
            Some(last) if !mode_stale => Arc::clone(&last.image),
            _ => {
                debug!(frame, mode = ?view.mode, "rendering display image");
                match view.mode {
                    // The override layer has nothing to draw yet.
                    DisplayMode::Original | DisplayMode::Draw => Arc::clone(&loaded),
                    DisplayMode::Mask => Arc::new(mask_frame(&loaded, &combined)),
                    DisplayMode::Preview => Arc::new(inpaint(&loaded, &combined, radius)),
                }
            }
        };

        let zoom_stale = mode_stale
            || self
                .zoomed
                .as_ref()
                .map_or(true, |last| !last.view.same_view(view));
        let zoomed = match &self.zoomed {
            Some(last) if !zoom_stale => Arc::clone(&last.image),
            _ => Arc::new(self.zoom(&image, view)),
        };

        if frame_changed {
            self.stats.frame_loads += 1;
            self.display_frame = Some(LoadedFrame {
                index: frame,
                frame: loaded,
            });
        }
        if mode_stale {
            self.stats.display_renders += 1;
            self.display = Some(DisplayImage {
                mode: view.mode,
                radius,
                image,
            });
        }
        if zoom_stale {
            self.stats.zoom_renders += 1;
            self.zoomed = Some(ZoomedImage {
                view: *view,
                image: Arc::clone(&zoomed),
            });
        }
        self.mask_changed = false;
        Ok(zoomed)
    }

    /// Reuse `slot` if it holds `index`, else decode through the cache.
    fn load(
        cache: &FrameCache,
        slot: &Option<LoadedFrame>,
        index: usize,
    ) -> Result<(bool, SharedFrameBuffer)> {
        match slot {
            Some(loaded) if loaded.index == index => Ok((false, Arc::clone(&loaded.frame))),
            _ => {
                let frame = cache
                    .get(index)
                    .map_err(|e| WipeError::frame_load(index, e))?;
                Ok((true, frame))
            }
        }
    }

    fn zoom(&self, image: &FrameBuffer, view: &DisplayParameters) -> FrameBuffer {
        let (viewport_w, viewport_h) = self.viewport;
        let factor = view.zoom.factor(self.fit_zoom());
        let rect = ViewportMapper::crop_rectangle(
            factor,
            view.anchor_x,
            view.anchor_y,
            image.width,
            image.height,
            viewport_w,
            viewport_h,
        );
        let (width, height) = ViewportMapper::scaled_size(rect, factor, viewport_w, viewport_h);
        debug!(?rect, width, height, zoom = %view.zoom, "zooming display image");
        resize_nearest(&crop(image, rect), width, height)
    }

    /// The combined mask, frozen for exports.
    pub fn combined_mask(&self) -> Option<Arc<Mask>> {
        self.combined.as_ref().map(|c| Arc::clone(&c.mask))
    }

    /// Zoom factor of `Fit` for this video and viewport.
    pub fn fit_zoom(&self) -> f64 {
        let info = self.cache.info();
        ViewportMapper::fit_zoom(info.width, info.height, self.viewport.0, self.viewport.1)
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn video_info(&self) -> &VideoInfo {
        self.cache.info()
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creditwipe_core::{HsvBand, Zoom};
    use creditwipe_media::MemorySource;

    fn pipeline(frames: usize, width: u32, height: u32) -> Pipeline {
        let source = MemorySource::pattern(frames, width, height);
        let cache = Arc::new(FrameCache::new(Box::new(source), 10));
        Pipeline::new(cache, width, height)
    }

    fn full(pipeline: &Pipeline, frame: usize) -> MaskParameters {
        let info = pipeline.video_info();
        MaskParameters::full_frame(frame, info.width, info.height)
    }

    fn mask_view(width: u32, height: u32) -> DisplayParameters {
        DisplayParameters::centred(width, height)
    }

    #[test]
    fn test_identical_updates_render_once() {
        let mut p = pipeline(5, 32, 16);
        let params = full(&p, 0);
        let draw = DrawParameters::default();
        let a = p.update_mask(&params, &draw).unwrap();
        let b = p.update_mask(&params, &draw).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(p.stats().mask_renders, 1);
        assert_eq!(p.stats().mask_combines, 1);
        assert_eq!(p.stats().frame_loads, 1);
    }

    #[test]
    fn test_mode_change_only_recombines() {
        let mut p = pipeline(5, 32, 16);
        let draw = DrawParameters::default();
        let params = full(&p, 0);
        let include = p.update_mask(&params, &draw).unwrap();

        let exclude = MaskParameters {
            mode: MaskMode::Exclude,
            ..params
        };
        let combined = p.update_mask(&exclude, &draw).unwrap();
        assert_eq!(*combined, include.invert());
        assert_eq!(p.stats().mask_renders, 1);
        assert_eq!(p.stats().mask_combines, 2);
    }

    #[test]
    fn test_frame_change_rerenders() {
        let mut p = pipeline(5, 32, 16);
        let draw = DrawParameters::default();
        p.update_mask(&full(&p, 0), &draw).unwrap();
        p.update_mask(&full(&p, 1), &draw).unwrap();
        assert_eq!(p.stats().frame_loads, 2);
        assert_eq!(p.stats().mask_renders, 2);
    }

    #[test]
    fn test_band_change_rerenders() {
        let mut p = pipeline(5, 32, 16);
        let draw = DrawParameters::default();
        let params = full(&p, 0);
        p.update_mask(&params, &draw).unwrap();
        let narrower = MaskParameters {
            val: HsvBand::new(128, 255),
            ..params
        };
        p.update_mask(&narrower, &draw).unwrap();
        assert_eq!(p.stats().frame_loads, 1);
        assert_eq!(p.stats().mask_renders, 2);
    }

    #[test]
    fn test_display_before_mask_fails() {
        let mut p = pipeline(5, 32, 16);
        let err = p
            .apply_display(0, &mask_view(32, 16), &RenderJobParameters::default())
            .unwrap_err();
        assert!(matches!(err, WipeError::MaskUnavailable));
        assert_eq!(p.stats(), PipelineStats::default());
    }

    #[test]
    fn test_failed_load_keeps_state() {
        let mut p = pipeline(5, 32, 16);
        let draw = DrawParameters::default();
        let good = p.update_mask(&full(&p, 0), &draw).unwrap();

        let err = p.update_mask(&full(&p, 99), &draw).unwrap_err();
        assert!(matches!(err, WipeError::FrameLoad { index: 99, .. }));
        assert!(err.is_invalid_frame());
        assert!(Arc::ptr_eq(&p.combined_mask().unwrap(), &good));

        // Retrying the old parameters is still a pure cache hit
        p.update_mask(&full(&p, 0), &draw).unwrap();
        assert_eq!(p.stats().mask_renders, 1);
    }

    #[test]
    fn test_display_memoization() {
        let mut p = pipeline(5, 32, 16);
        let render = RenderJobParameters::default();
        p.update_mask(&full(&p, 0), &DrawParameters::default())
            .unwrap();

        let view = mask_view(32, 16);
        let first = p.apply_display(0, &view, &render).unwrap();
        let second = p.apply_display(0, &view, &render).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(p.stats().display_renders, 1);
        assert_eq!(p.stats().zoom_renders, 1);

        // Pan/zoom only reruns the zoom stage
        let zoomed = DisplayParameters {
            zoom: Zoom::Factor(2.0),
            ..view
        };
        let out = p.apply_display(0, &zoomed, &render).unwrap();
        assert_eq!((out.width, out.height), (32, 16));
        assert_eq!(p.stats().display_renders, 1);
        assert_eq!(p.stats().zoom_renders, 2);

        // Radius only matters in preview mode
        let wider = RenderJobParameters::new(0, 0, 9);
        p.apply_display(0, &zoomed, &wider).unwrap();
        assert_eq!(p.stats().display_renders, 1);
        let preview = DisplayParameters {
            mode: DisplayMode::Preview,
            ..zoomed
        };
        p.apply_display(0, &preview, &wider).unwrap();
        p.apply_display(0, &preview, &render).unwrap();
        assert_eq!(p.stats().display_renders, 3);
    }

    #[test]
    fn test_mask_change_forces_display() {
        let mut p = pipeline(5, 32, 16);
        let render = RenderJobParameters::default();
        let draw = DrawParameters::default();
        let params = full(&p, 0);
        p.update_mask(&params, &draw).unwrap();
        let view = mask_view(32, 16);
        p.apply_display(0, &view, &render).unwrap();

        let exclude = MaskParameters {
            mode: MaskMode::Exclude,
            ..params
        };
        p.update_mask(&exclude, &draw).unwrap();
        let out = p.apply_display(0, &view, &render).unwrap();
        assert_eq!(p.stats().display_renders, 2);
        // Everything excluded: the mask view is black
        assert_eq!(*out, FrameBuffer::solid(32, 16, [0, 0, 0]));
    }

    #[test]
    fn test_original_mode_passes_frame_through() {
        let mut p = pipeline(5, 32, 16);
        p.update_mask(&full(&p, 0), &DrawParameters::default())
            .unwrap();
        let view = DisplayParameters {
            mode: DisplayMode::Original,
            ..mask_view(32, 16)
        };
        let out = p
            .apply_display(3, &view, &RenderJobParameters::default())
            .unwrap();
        let expected = p.cache().get(3).unwrap();
        assert_eq!(*out, *expected);
    }
}
