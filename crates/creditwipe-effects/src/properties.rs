//! Property tests for the mask and viewport stages.

use crate::{MaskCombiner, MaskRenderer, ViewportMapper};
use creditwipe_core::{CropRect, FrameBuffer, HsvBand, Mask, MaskMode, MaskParameters, PixelFormat};
use proptest::prelude::*;

/// Small RGB frame with arbitrary pixel content.
fn frame_strategy() -> impl Strategy<Value = FrameBuffer> {
    (1u32..24, 1u32..16).prop_flat_map(|(w, h)| {
        proptest::collection::vec(any::<u8>(), (w * h * 3) as usize).prop_map(move |packed| {
            FrameBuffer::from_packed(w, h, PixelFormat::Rgb8, &packed)
                .expect("packed buffer matches dimensions")
        })
    })
}

fn band_strategy(max: i32) -> impl Strategy<Value = HsvBand> {
    (-10..=max + 10, -10..=max + 10).prop_map(|(min, max)| HsvBand::new(min, max))
}

fn params_strategy() -> impl Strategy<Value = MaskParameters> {
    (
        band_strategy(179),
        band_strategy(255),
        band_strategy(255),
        0u32..6,
        (-20i64..40, -20i64..40, -20i64..40, -20i64..40),
    )
        .prop_map(|(hue, sat, val, grow, (l, t, r, b))| MaskParameters {
            frame: 0,
            mode: MaskMode::Include,
            hue,
            sat,
            val,
            grow,
            crop: CropRect::new(l, t, r, b),
        })
}

proptest! {
    #[test]
    fn render_is_idempotent(frame in frame_strategy(), params in params_strategy()) {
        let first = MaskRenderer::render(&frame, &params);
        let second = MaskRenderer::render(&frame, &params);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn swapped_crop_edges_render_identically(frame in frame_strategy(), params in params_strategy()) {
        let c = params.crop;
        let swapped = MaskParameters {
            crop: CropRect::new(c.right, c.bottom, c.left, c.top),
            ..params.clone()
        };
        prop_assert_eq!(
            MaskRenderer::render(&frame, &params),
            MaskRenderer::render(&frame, &swapped)
        );
    }

    #[test]
    fn mask_matches_frame_and_stays_in_crop(frame in frame_strategy(), params in params_strategy()) {
        let mask = MaskRenderer::render(&frame, &params);
        prop_assert_eq!((mask.width, mask.height), (frame.width, frame.height));
        let crop = params.crop.normalize(frame.width, frame.height);
        let region = Mask::from_rect(frame.width, frame.height, crop);
        prop_assert!(mask.is_subset_of(&region));
    }

    #[test]
    fn grow_is_monotonic(
        frame in frame_strategy(),
        params in params_strategy(),
        extra in 1u32..5,
    ) {
        let small = MaskRenderer::render(&frame, &params);
        let larger = MaskParameters { grow: params.grow + extra, ..params.clone() };
        let big = MaskRenderer::render(&frame, &larger);
        prop_assert!(small.is_subset_of(&big));
    }

    #[test]
    fn combiner_identities(frame in frame_strategy(), params in params_strategy()) {
        let top = MaskRenderer::render(&frame, &params);
        let (w, h) = (top.width, top.height);
        prop_assert_eq!(MaskCombiner::combine(MaskMode::Include, &top, None), top.clone());
        prop_assert_eq!(MaskCombiner::combine(MaskMode::Exclude, &top, None), top.invert());
        prop_assert_eq!(
            MaskCombiner::combine(MaskMode::Include, &Mask::empty(w, h), Some(&top)),
            top.clone()
        );
        prop_assert!(
            MaskCombiner::combine(MaskMode::Exclude, &Mask::full(w, h), Some(&top)).is_all_clear()
        );
    }

    #[test]
    fn crop_rectangle_stays_inside_source(
        zoom in -1.0f64..8.0,
        anchor_x in -500.0f64..3000.0,
        anchor_y in -500.0f64..3000.0,
        source_w in 1u32..2000,
        source_h in 1u32..2000,
        viewport_w in 0u32..1500,
        viewport_h in 0u32..1500,
    ) {
        let rect = ViewportMapper::crop_rectangle(
            zoom, anchor_x, anchor_y, source_w, source_h, viewport_w, viewport_h,
        );
        prop_assert!(rect.width >= 1 && rect.height >= 1);
        prop_assert!(rect.right() <= source_w);
        prop_assert!(rect.bottom() <= source_h);

        let (out_w, out_h) = ViewportMapper::scaled_size(rect, zoom, viewport_w, viewport_h);
        prop_assert!(out_w >= 1 && out_h >= 1);
        prop_assert!(out_w <= viewport_w.max(1) && out_h <= viewport_h.max(1));
    }
}
