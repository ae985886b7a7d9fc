//! The controller behind the editor UI.
//!
//! A [`Session`] owns the live controls, the preview [`Pipeline`] and the two
//! background lanes. Control handlers only store the new value and trigger a
//! lane; the lanes read the newest controls when they start and publish their
//! results as [`SessionEvent`]s.
//!
//! Lock order is pipeline, then frame cache cursor, then cache entries. The
//! controls lock is never held while taking the pipeline lock.

use crate::batch::{BatchRenderer, ExportSummary};
use crate::pipeline::{Pipeline, PipelineStats};
use crate::scheduler::{Job, Scheduler};
use creditwipe_core::{
    DisplayParameters, DrawParameters, Mask, MaskParameters, RenderJobParameters, Result,
    SharedFrameBuffer, StudioConfig, WipeError,
};
use creditwipe_effects::ViewportMapper;
use creditwipe_media::{
    ExportCancel, ExportProgress, ExportTarget, FfmpegSink, FfmpegSource, FrameCache,
    OutputSink, VideoInfo, VideoSource,
};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events buffered before the UI drains them.
const EVENT_CAPACITY: usize = 64;

/// The editor tab the user is working in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActiveTab {
    #[default]
    Mask,
    Draw,
    Render,
}

/// Which end of the render range was edited last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeBound {
    #[default]
    Start,
    End,
}

/// Live control values.
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    pub mask: MaskParameters,
    pub draw: DrawParameters,
    pub display: DisplayParameters,
    pub render: RenderJobParameters,
    pub tab: ActiveTab,
    pub last_bound: RangeBound,
}

impl Controls {
    /// Initial values for a freshly opened video.
    pub fn for_video(info: &VideoInfo, config: &StudioConfig) -> Self {
        Self {
            mask: MaskParameters::full_frame(0, info.width, info.height),
            draw: DrawParameters::default(),
            display: DisplayParameters::centred(info.width, info.height),
            render: RenderJobParameters::new(0, 0, config.default_inpaint_radius),
            tab: ActiveTab::Mask,
            last_bound: RangeBound::Start,
        }
    }

    /// Frame the preview shows for the active tab.
    pub fn display_frame(&self) -> usize {
        match self.tab {
            ActiveTab::Mask => self.mask.frame,
            ActiveTab::Draw => self.draw.frame,
            ActiveTab::Render => match self.last_bound {
                RangeBound::Start => self.render.start_frame,
                RangeBound::End => self.render.end_frame,
            },
        }
    }
}

/// Lane that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    MaskUpdate,
    DisplayApply,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::MaskUpdate => write!(f, "mask update"),
            Stage::DisplayApply => write!(f, "display"),
        }
    }
}

/// Results published by the background lanes.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The combined mask was brought up to date.
    MaskUpdated(Arc<Mask>),
    /// A new preview image is ready.
    DisplayReady(SharedFrameBuffer),
    Failed { stage: Stage, error: Arc<WipeError> },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MaskUpdated(_) => "mask-updated",
            Self::DisplayReady(_) => "display-ready",
            Self::Failed { .. } => "failed",
        }
    }
}

struct Shared {
    pipeline: Mutex<Pipeline>,
    controls: RwLock<Controls>,
    events: Sender<SessionEvent>,
}

impl Shared {
    fn publish(&self, event: SessionEvent) {
        match self.events.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                warn!(event = event.kind(), "event queue full, dropping event");
            }
        }
    }

    fn fail(&self, stage: Stage, error: WipeError) -> Arc<WipeError> {
        warn!(%stage, error = %error, "pipeline stage failed");
        let error = Arc::new(error);
        self.publish(SessionEvent::Failed {
            stage,
            error: Arc::clone(&error),
        });
        error
    }

    fn update_mask(&self) -> std::result::Result<Arc<Mask>, Arc<WipeError>> {
        let (mask, draw) = {
            let controls = self.controls.read();
            (controls.mask.clone(), controls.draw)
        };
        let result = self.pipeline.lock().update_mask(&mask, &draw);
        match result {
            Ok(combined) => {
                debug!(frame = mask.frame, selected = combined.selected_count(), "mask updated");
                self.publish(SessionEvent::MaskUpdated(Arc::clone(&combined)));
                Ok(combined)
            }
            Err(e) => Err(self.fail(Stage::MaskUpdate, e)),
        }
    }

    fn apply_display(&self) -> std::result::Result<SharedFrameBuffer, Arc<WipeError>> {
        let (frame, display, render) = {
            let controls = self.controls.read();
            (controls.display_frame(), controls.display, controls.render)
        };
        let result = self.pipeline.lock().apply_display(frame, &display, &render);
        match result {
            Ok(image) => {
                self.publish(SessionEvent::DisplayReady(Arc::clone(&image)));
                Ok(image)
            }
            Err(e) => Err(self.fail(Stage::DisplayApply, e)),
        }
    }
}

/// A running export.
pub struct ExportHandle {
    id: Uuid,
    cancel: ExportCancel,
    progress: Receiver<ExportProgress>,
    join: JoinHandle<Result<ExportSummary>>,
}

impl ExportHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the export to stop before its next frame.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Progress reports, in order.
    pub fn progress(&self) -> &Receiver<ExportProgress> {
        &self.progress
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the export to end.
    pub fn wait(self) -> Result<ExportSummary> {
        let id = self.id;
        self.join
            .join()
            .map_err(|_| WipeError::Io(std::io::Error::other(format!("export {id} panicked"))))?
    }
}

/// One open video and its editor state.
pub struct Session {
    // Dropped first: stopping the lanes releases their handles on `shared`.
    scheduler: Scheduler,
    shared: Arc<Shared>,
    cache: Arc<FrameCache>,
    events: Receiver<SessionEvent>,
    config: StudioConfig,
}

impl Session {
    /// Open a session over any frame source.
    pub fn open(source: Box<dyn VideoSource>, config: &StudioConfig) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(FrameCache::new(source, config.cache_capacity));
        let controls = Controls::for_video(cache.info(), config);
        let pipeline = Pipeline::new(
            Arc::clone(&cache),
            config.viewport_width,
            config.viewport_height,
        );
        let (tx, events) = bounded(EVENT_CAPACITY);
        let shared = Arc::new(Shared {
            pipeline: Mutex::new(pipeline),
            controls: RwLock::new(controls),
            events: tx,
        });

        let mask_job: Job = {
            let shared = Arc::clone(&shared);
            Arc::new(move || {
                let _ = shared.update_mask();
            })
        };
        let display_job: Job = {
            let shared = Arc::clone(&shared);
            Arc::new(move || {
                let _ = shared.apply_display();
            })
        };
        let scheduler = Scheduler::new(mask_job, display_job)?;

        let session = Self {
            scheduler,
            shared,
            cache,
            events,
            config: config.clone(),
        };
        info!(path = %session.video_info().path.display(), "session opened");
        // First preview from the initial controls.
        session.scheduler.trigger_mask();
        Ok(session)
    }

    /// Probe and open a video file.
    pub fn open_path(path: impl AsRef<Path>, config: &StudioConfig) -> Result<Self> {
        let source = FfmpegSource::open(path)?;
        Self::open(Box::new(source), config)
    }

    pub fn on_mask_parameters_changed(&self, params: MaskParameters) {
        {
            let mut controls = self.shared.controls.write();
            // The draw layer follows the mask reference frame.
            if controls.mask.frame != params.frame {
                controls.draw.frame = params.frame;
            }
            controls.mask = params;
        }
        self.scheduler.trigger_mask();
    }

    pub fn on_draw_parameters_changed(&self, params: DrawParameters) {
        self.shared.controls.write().draw = params;
        self.scheduler.trigger_mask();
    }

    pub fn on_display_parameters_changed(&self, params: DisplayParameters) {
        self.shared.controls.write().display = params;
        self.scheduler.trigger_display();
    }

    pub fn on_render_parameters_changed(&self, params: RenderJobParameters) {
        {
            let mut controls = self.shared.controls.write();
            if params.end_frame != controls.render.end_frame {
                controls.last_bound = RangeBound::End;
            } else if params.start_frame != controls.render.start_frame {
                controls.last_bound = RangeBound::Start;
            }
            controls.render = params;
        }
        self.scheduler.trigger_display();
    }

    pub fn select_tab(&self, tab: ActiveTab) {
        self.shared.controls.write().tab = tab;
        self.scheduler.trigger_display();
    }

    /// Step up one zoom level.
    pub fn zoom_in(&self) {
        let fit = self.fit_zoom();
        {
            let mut controls = self.shared.controls.write();
            controls.display.zoom = controls.display.zoom.zoom_in(fit);
        }
        self.scheduler.trigger_display();
    }

    /// Step down one zoom level.
    pub fn zoom_out(&self) {
        let fit = self.fit_zoom();
        {
            let mut controls = self.shared.controls.write();
            controls.display.zoom = controls.display.zoom.zoom_out(fit);
        }
        self.scheduler.trigger_display();
    }

    fn fit_zoom(&self) -> f64 {
        let info = self.cache.info();
        ViewportMapper::fit_zoom(
            info.width,
            info.height,
            self.config.viewport_width,
            self.config.viewport_height,
        )
    }

    /// Snapshot of the live controls.
    pub fn controls(&self) -> Controls {
        self.shared.controls.read().clone()
    }

    /// Results of background runs. Drain it regularly; a full queue drops
    /// events.
    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.events
    }

    /// Run the mask lane on this thread, then schedule the display lane.
    pub fn update_now(&self) -> std::result::Result<Arc<Mask>, Arc<WipeError>> {
        let result = self
            .scheduler
            .mask_lane()
            .exclusive(|| self.shared.update_mask());
        self.scheduler.trigger_display();
        result
    }

    /// Run the display lane on this thread.
    pub fn apply_now(&self) -> std::result::Result<SharedFrameBuffer, Arc<WipeError>> {
        self.scheduler
            .display_lane()
            .exclusive(|| self.shared.apply_display())
    }

    /// The combined mask exports will use.
    pub fn combined_mask(&self) -> Option<Arc<Mask>> {
        self.shared.pipeline.lock().combined_mask()
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.pipeline.lock().stats()
    }

    pub fn video_info(&self) -> &VideoInfo {
        self.cache.info()
    }

    pub fn frame_cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Export `job` to `path` through FFmpeg, matching the source codec.
    pub fn request_export(
        &self,
        job: RenderJobParameters,
        path: impl Into<PathBuf>,
    ) -> Result<ExportHandle> {
        let info = self.cache.info();
        let target = ExportTarget::new(
            path,
            info.codec.clone(),
            info.frame_rate,
            info.width,
            info.height,
        )
        .with_settings(&self.config.export);
        self.request_export_to(job, target, Arc::new(FfmpegSink))
    }

    /// Export `job` on a background thread.
    ///
    /// The combined mask is frozen now; later control changes do not affect
    /// the running export.
    pub fn request_export_to(
        &self,
        job: RenderJobParameters,
        target: ExportTarget,
        sink: Arc<dyn OutputSink>,
    ) -> Result<ExportHandle> {
        job.validate()?;
        let mask = self.combined_mask().ok_or(WipeError::MaskUnavailable)?;

        let id = Uuid::new_v4();
        let cancel = ExportCancel::new();
        let (progress_tx, progress) = unbounded();
        let renderer = BatchRenderer::new(Arc::clone(&self.cache));

        info!(%id, start = job.start_frame, end = job.end_frame, "export requested");
        let join = {
            let cancel = cancel.clone();
            thread::Builder::new()
                .name(format!("creditwipe-export-{id}"))
                .spawn(move || {
                    let result = renderer.render(
                        Some(mask),
                        &job,
                        &target,
                        sink.as_ref(),
                        &cancel,
                        |p| {
                            let _ = progress_tx.send(p);
                        },
                    );
                    if let Err(e) = &result {
                        warn!(%id, error = %e, "export failed");
                    }
                    result
                })?
        };

        Ok(ExportHandle {
            id,
            cancel,
            progress,
            join,
        })
    }
}
