//! Integration tests for the preview pipeline.
//!
//! Exercises cross-crate interactions between creditwipe-media's frame cache,
//! creditwipe-effects' mask and viewport stages, and creditwipe-engine.

use creditwipe_core::{
    CropRect, DisplayMode, DisplayParameters, DrawParameters, HsvBand, MaskMode, MaskParameters,
    Rect, RenderJobParameters, Zoom, MASK_ON,
};
use creditwipe_effects::primitives::{crop, resize_nearest};
use creditwipe_media::{FrameCache, MemorySource, VideoSource};
use creditwipe_engine::Pipeline;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn long_video() -> (Arc<FrameCache>, Arc<AtomicUsize>) {
    let source = MemorySource::pattern(300, WIDTH, HEIGHT);
    let reads = source.reads_handle();
    (Arc::new(FrameCache::new(Box::new(source), 10)), reads)
}

fn mask_view(mode: DisplayMode) -> DisplayParameters {
    DisplayParameters {
        mode,
        ..DisplayParameters::centred(WIDTH, HEIGHT)
    }
}

// ── End to end ─────────────────────────────────────────────────

#[test]
fn full_range_mask_selects_everything() {
    let (cache, _) = long_video();
    let mut pipeline = Pipeline::new(cache, 32, 24);
    let params = MaskParameters::full_frame(0, WIDTH, HEIGHT);

    let mask = pipeline
        .update_mask(&params, &DrawParameters::default())
        .unwrap();
    assert_eq!((mask.width, mask.height), (WIDTH, HEIGHT));
    assert!(mask.as_slice().iter().all(|&m| m == MASK_ON));
}

#[test]
fn mask_view_at_fit_is_resized_original() {
    let (cache, _) = long_video();
    let mut pipeline = Pipeline::new(Arc::clone(&cache), 32, 24);
    pipeline
        .update_mask(
            &MaskParameters::full_frame(0, WIDTH, HEIGHT),
            &DrawParameters::default(),
        )
        .unwrap();

    let image = pipeline
        .apply_display(0, &mask_view(DisplayMode::Mask), &RenderJobParameters::default())
        .unwrap();
    let original = cache.get(0).unwrap();
    assert_eq!(*image, resize_nearest(&original, 32, 24));
}

#[test]
fn zoomed_view_is_centred_crop() {
    let (cache, _) = long_video();
    let mut pipeline = Pipeline::new(Arc::clone(&cache), WIDTH, HEIGHT);
    pipeline
        .update_mask(
            &MaskParameters::full_frame(5, WIDTH, HEIGHT),
            &DrawParameters::default(),
        )
        .unwrap();

    let view = DisplayParameters {
        mode: DisplayMode::Original,
        zoom: Zoom::Factor(2.0),
        anchor_x: 32.0,
        anchor_y: 24.0,
    };
    let image = pipeline
        .apply_display(5, &view, &RenderJobParameters::default())
        .unwrap();
    let original = cache.get(5).unwrap();
    let centre = crop(&original, Rect::new(16, 12, 32, 24));
    assert_eq!(*image, resize_nearest(&centre, WIDTH, HEIGHT));
}

#[test]
fn preview_inpaints_only_inside_mask() {
    let (cache, _) = long_video();
    let mut pipeline = Pipeline::new(Arc::clone(&cache), WIDTH, HEIGHT);
    // Bottom band of the frame, as credits usually are
    let params = MaskParameters {
        crop: CropRect::new(0, 40, WIDTH as i64, HEIGHT as i64),
        ..MaskParameters::full_frame(3, WIDTH, HEIGHT)
    };
    pipeline
        .update_mask(&params, &DrawParameters::default())
        .unwrap();

    let image = pipeline
        .apply_display(3, &mask_view(DisplayMode::Preview), &RenderJobParameters::default())
        .unwrap();
    let original = cache.get(3).unwrap();
    for y in 0..40 {
        assert_eq!(image.row(y), original.row(y), "row {y} changed");
    }
}

#[test]
fn exclude_mode_never_inpaints() {
    let (cache, _) = long_video();
    let mut pipeline = Pipeline::new(Arc::clone(&cache), WIDTH, HEIGHT);
    let params = MaskParameters {
        mode: MaskMode::Exclude,
        ..MaskParameters::full_frame(0, WIDTH, HEIGHT)
    };
    let mask = pipeline
        .update_mask(&params, &DrawParameters::default())
        .unwrap();
    assert!(mask.is_all_clear());

    let image = pipeline
        .apply_display(0, &mask_view(DisplayMode::Preview), &RenderJobParameters::default())
        .unwrap();
    assert_eq!(*image, *cache.get(0).unwrap());
}

// ── Incremental recomputation ──────────────────────────────────

#[test]
fn scrubbing_display_reuses_mask() {
    let (cache, _) = long_video();
    let mut pipeline = Pipeline::new(cache, WIDTH, HEIGHT);
    let params = MaskParameters {
        val: HsvBand::new(128, 255),
        ..MaskParameters::full_frame(0, WIDTH, HEIGHT)
    };
    pipeline
        .update_mask(&params, &DrawParameters::default())
        .unwrap();

    let view = mask_view(DisplayMode::Mask);
    for frame in 0..20 {
        pipeline
            .apply_display(frame, &view, &RenderJobParameters::default())
            .unwrap();
    }
    let stats = pipeline.stats();
    assert_eq!(stats.mask_renders, 1);
    assert_eq!(stats.display_renders, 20);
    assert_eq!(stats.zoom_renders, 20);
}

#[test]
fn evicted_frames_are_decoded_again() {
    let (cache, reads) = long_video();
    let mut pipeline = Pipeline::new(Arc::clone(&cache), WIDTH, HEIGHT);
    pipeline
        .update_mask(
            &MaskParameters::full_frame(0, WIDTH, HEIGHT),
            &DrawParameters::default(),
        )
        .unwrap();

    let view = mask_view(DisplayMode::Original);
    for frame in 1..=10 {
        pipeline
            .apply_display(frame, &view, &RenderJobParameters::default())
            .unwrap();
    }
    // Frame 0 was the LRU entry when frame 10 arrived
    assert_eq!(reads.load(Ordering::Relaxed), 11);
    assert!(!cache.contains(0));
    assert_eq!(cache.len(), 10);

    pipeline
        .apply_display(0, &view, &RenderJobParameters::default())
        .unwrap();
    assert_eq!(reads.load(Ordering::Relaxed), 12);
}

#[test]
fn out_of_range_display_frame_keeps_last_image() {
    let (cache, _) = long_video();
    let frame_count = cache.info().frame_count;
    let mut pipeline = Pipeline::new(cache, WIDTH, HEIGHT);
    pipeline
        .update_mask(
            &MaskParameters::full_frame(0, WIDTH, HEIGHT),
            &DrawParameters::default(),
        )
        .unwrap();
    let view = mask_view(DisplayMode::Mask);
    let render = RenderJobParameters::default();
    let good = pipeline.apply_display(7, &view, &render).unwrap();

    let err = pipeline
        .apply_display(frame_count, &view, &render)
        .unwrap_err();
    assert!(err.is_invalid_frame());

    let again = pipeline.apply_display(7, &view, &render).unwrap();
    assert!(Arc::ptr_eq(&good, &again));
}

#[test]
fn memory_source_reports_metadata() {
    let source = MemorySource::pattern(300, WIDTH, HEIGHT);
    assert_eq!(source.frame_count(), 300);
    assert_eq!((source.width(), source.height()), (WIDTH, HEIGHT));
}
