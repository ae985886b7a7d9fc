//! Integration tests for batch export.

use creditwipe_core::{
    CropRect, FrameRate, HsvBand, MaskParameters, RenderJobParameters, StudioConfig, WipeError,
};
use creditwipe_effects::inpaint;
use creditwipe_engine::Session;
use creditwipe_media::{ExportStep, ExportTarget, MemorySink, MemorySource};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

fn credits_session() -> Session {
    let session =
        Session::open(Box::new(MemorySource::pattern(40, 48, 32)), &StudioConfig::default())
            .unwrap();
    // Bright pixels in the lower third
    session.on_mask_parameters_changed(MaskParameters {
        val: HsvBand::new(200, 255),
        crop: CropRect::new(0, 22, 48, 32),
        grow: 1,
        ..session.controls().mask
    });
    session.update_now().unwrap();
    session
}

fn target(session: &Session, path: &str) -> ExportTarget {
    let info = session.video_info();
    ExportTarget::new(path, info.codec.clone(), FrameRate::FPS_25, info.width, info.height)
}

// ── Tests ──────────────────────────────────────────────────────

#[test]
fn exported_range_matches_preview_inpaint() {
    let session = credits_session();
    let mask = session.combined_mask().unwrap();
    assert!(!mask.is_all_clear());

    let sink = MemorySink::new();
    let job = RenderJobParameters::new(10, 20, 4);
    let handle = session
        .request_export_to(job, target(&session, "clean.mp4"), Arc::new(sink.clone()))
        .unwrap();
    let progress = handle.progress().clone();
    let summary = handle.wait().unwrap();

    assert_eq!(summary.frames_written, 11);
    assert_eq!((summary.start_frame, summary.end_frame), (10, 20));
    assert!(sink.is_closed());
    assert_eq!(sink.target().unwrap().path, summary.output);

    let written = sink.frames();
    for (n, index) in (10..=20).enumerate() {
        let original = session.frame_cache().decode_uncached(index).unwrap();
        assert_eq!(written[n], inpaint(&original, &mask, 4), "frame {index}");
    }

    let reports: Vec<_> = progress.try_iter().collect();
    let loading: Vec<usize> = reports
        .iter()
        .filter(|p| p.step == ExportStep::Loading)
        .map(|p| p.frame)
        .collect();
    assert_eq!(loading, (10..=20).collect::<Vec<_>>());
    assert_eq!(reports.last().unwrap().step, ExportStep::Finished);
}

#[test]
fn two_exports_share_the_decoder() {
    let session = credits_session();
    let first = MemorySink::new();
    let second = MemorySink::new();

    let a = session
        .request_export_to(
            RenderJobParameters::new(0, 15, 3),
            target(&session, "a.mp4"),
            Arc::new(first.clone()),
        )
        .unwrap();
    let b = session
        .request_export_to(
            RenderJobParameters::new(16, 39, 3),
            target(&session, "b.mp4"),
            Arc::new(second.clone()),
        )
        .unwrap();
    assert_ne!(a.id(), b.id());

    a.wait().unwrap();
    b.wait().unwrap();
    assert_eq!(first.frame_count(), 16);
    assert_eq!(second.frame_count(), 24);
}

#[test]
fn sink_failure_aborts_export() {
    let session = credits_session();
    let sink = MemorySink::failing_after(5);
    let err = session
        .request_export_to(
            RenderJobParameters::new(0, 39, 3),
            target(&session, "full.mp4"),
            Arc::new(sink.clone()),
        )
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(matches!(err, WipeError::SinkWrite(_)));
    assert_eq!(sink.frame_count(), 5);
    assert!(!sink.is_closed());
}

#[test]
fn backwards_range_is_rejected_up_front() {
    let session = credits_session();
    let err = session
        .request_export_to(
            RenderJobParameters::new(30, 10, 3),
            target(&session, "x.mp4"),
            Arc::new(MemorySink::new()),
        )
        .err()
        .expect("invalid range");
    assert!(matches!(err, WipeError::InvalidParameter(_)));
}
