//! Integration tests for the session controller and its background lanes.

use creditwipe_core::{
    DisplayMode, DisplayParameters, MaskParameters, RenderJobParameters, StudioConfig, WipeError,
    Zoom,
};
use creditwipe_engine::{ActiveTab, Session, SessionEvent, Stage};
use creditwipe_media::MemorySource;
use crossbeam_channel::RecvTimeoutError;
use std::io::Write;
use std::time::Duration;

// ── Helpers ────────────────────────────────────────────────────

const QUIET: Duration = Duration::from_millis(500);
const WAIT: Duration = Duration::from_secs(10);

fn config(viewport_width: u32, viewport_height: u32) -> StudioConfig {
    StudioConfig {
        viewport_width,
        viewport_height,
        ..StudioConfig::default()
    }
}

fn open(frames: usize) -> Session {
    Session::open(Box::new(MemorySource::pattern(frames, 64, 48)), &config(64, 48)).unwrap()
}

/// Collect events until the lanes have been idle for a while.
fn settle(session: &Session) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        match session.events().recv_timeout(QUIET) {
            Ok(event) => events.push(event),
            Err(RecvTimeoutError::Timeout) => return events,
            Err(RecvTimeoutError::Disconnected) => panic!("session closed"),
        }
    }
}

fn last_display(events: &[SessionEvent]) -> Option<(u32, u32)> {
    events.iter().rev().find_map(|e| match e {
        SessionEvent::DisplayReady(image) => Some((image.width, image.height)),
        _ => None,
    })
}

// ── Lanes ──────────────────────────────────────────────────────

#[test]
fn opening_shows_preview_without_edits() {
    let session = open(30);
    let events = settle(&session);
    assert!(matches!(events.first(), Some(SessionEvent::MaskUpdated(_))));
    assert_eq!(last_display(&events), Some((64, 48)));
}

#[test]
fn rapid_zoom_changes_settle_on_latest() {
    let session = open(30);
    session.update_now().unwrap();
    settle(&session);

    let base = session.controls().display;
    for percent in [150.0, 300.0, 25.0, 400.0, 50.0] {
        session.on_display_parameters_changed(DisplayParameters {
            zoom: Zoom::Factor(percent / 100.0),
            ..base
        });
    }

    let events = settle(&session);
    assert!(!events.is_empty());
    // Half zoom of a 64x48 source
    assert_eq!(last_display(&events), Some((32, 24)));
    let displays = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::DisplayReady(_)))
        .count();
    assert!(displays <= 5, "{displays} display runs for 5 triggers");
}

#[test]
fn mask_edit_flows_into_display() {
    let session = open(30);
    settle(&session);
    session.select_tab(ActiveTab::Mask);
    session.on_mask_parameters_changed(MaskParameters {
        frame: 12,
        ..session.controls().mask
    });

    let events = settle(&session);
    let mask_at = events
        .iter()
        .position(|e| matches!(e, SessionEvent::MaskUpdated(_)))
        .expect("mask update event");
    let display_at = events
        .iter()
        .rposition(|e| matches!(e, SessionEvent::DisplayReady(_)))
        .expect("display event");
    assert!(mask_at < display_at);
    // The opening run plus the edit
    assert_eq!(session.stats().mask_renders, 2);
}

#[test]
fn render_tab_previews_range_bound() {
    let session = open(30);
    session.update_now().unwrap();
    session.on_display_parameters_changed(DisplayParameters {
        mode: DisplayMode::Original,
        ..session.controls().display
    });
    session.select_tab(ActiveTab::Render);
    session.on_render_parameters_changed(RenderJobParameters::new(0, 20, 3));
    settle(&session);

    let image = session.apply_now().unwrap();
    let expected = session.frame_cache().get(20).unwrap();
    assert_eq!(*image, *expected);
}

#[test]
fn failures_are_reported_per_stage() {
    let session = open(10);
    session.update_now().unwrap();
    session.on_mask_parameters_changed(MaskParameters {
        frame: 50,
        ..session.controls().mask
    });

    let events = settle(&session);
    let stages: Vec<Stage> = events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Failed { stage, error } => {
                assert!(error.is_invalid_frame());
                Some(*stage)
            }
            _ => None,
        })
        .collect();
    // The display follows the mask frame, so both lanes fail
    assert!(stages.contains(&Stage::MaskUpdate));
    assert!(stages.contains(&Stage::DisplayApply));
    assert!(session.combined_mask().is_some());
}

#[test]
fn export_needs_a_rendered_mask() {
    let session =
        Session::open(Box::new(MemorySource::pattern(0, 64, 48)), &config(64, 48)).unwrap();
    let err = session
        .request_export(RenderJobParameters::new(0, 5, 3), "never-written.mp4")
        .err()
        .expect("export without mask");
    assert!(matches!(err, WipeError::MaskUnavailable));
}

// ── Configuration ──────────────────────────────────────────────

#[test]
fn config_file_sets_viewport_and_radius() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "viewport_width": 32, "viewport_height": 24, "default_inpaint_radius": 6 }}"#
    )
    .unwrap();
    let config = StudioConfig::load(file.path()).unwrap();
    assert_eq!(config.cache_capacity, 10);

    let session = Session::open(Box::new(MemorySource::pattern(8, 64, 48)), &config).unwrap();
    assert_eq!(session.controls().render.inpaint_radius, 6);
    session.update_now().unwrap();
    let image = session.apply_now().unwrap();
    assert_eq!((image.width, image.height), (32, 24));
}

#[test]
fn invalid_config_is_rejected() {
    let bad = StudioConfig {
        cache_capacity: 0,
        ..StudioConfig::default()
    };
    let err = Session::open(Box::new(MemorySource::pattern(4, 8, 8)), &bad)
        .err()
        .expect("zero capacity");
    assert!(matches!(err, WipeError::Config(_)));
}

#[test]
fn zoom_steps_through_ladder() {
    let session = Session::open(
        Box::new(MemorySource::pattern(4, 64, 48)),
        &config(32, 24),
    )
    .unwrap();
    // Fit is 50% here
    session.zoom_in();
    assert_eq!(session.controls().display.zoom, Zoom::Factor(1.0));
    session.zoom_out();
    session.zoom_out();
    assert_eq!(session.controls().display.zoom, Zoom::Factor(0.25));
    settle(&session);
}
