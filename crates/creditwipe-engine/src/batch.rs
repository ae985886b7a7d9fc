//! Batch export: inpaint a frame range with a frozen mask and stream it to a
//! sink.

use creditwipe_core::{Mask, RenderJobParameters, Result, WipeError};
use creditwipe_effects::inpaint;
use creditwipe_media::{
    ExportCancel, ExportProgress, ExportStep, ExportTarget, FrameCache, OutputSink,
    STEPS_PER_FRAME,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of a finished export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub start_frame: usize,
    pub end_frame: usize,
    pub frames_written: usize,
    pub output: PathBuf,
    pub elapsed: Duration,
}

/// Renders export jobs from the shared decode cursor.
///
/// Frames are decoded with [`FrameCache::decode_uncached`]: an export streams
/// through the whole range once, and caching it would only evict the frames
/// the preview is working with.
pub struct BatchRenderer {
    cache: Arc<FrameCache>,
}

impl BatchRenderer {
    pub fn new(cache: Arc<FrameCache>) -> Self {
        Self { cache }
    }

    /// Export `job.start_frame..=job.end_frame` to `target`.
    ///
    /// `on_progress` receives one report per sub-step and a final
    /// [`ExportStep::Finished`]. The first error aborts the export; frames
    /// already written stay in the sink's output.
    pub fn render(
        &self,
        mask: Option<Arc<Mask>>,
        job: &RenderJobParameters,
        target: &ExportTarget,
        sink: &dyn OutputSink,
        cancel: &ExportCancel,
        mut on_progress: impl FnMut(ExportProgress),
    ) -> Result<ExportSummary> {
        let mask = mask.ok_or(WipeError::MaskUnavailable)?;
        job.validate()?;
        let info = self.cache.info();
        info.check_index(job.end_frame)
            .map_err(|e| WipeError::frame_load(job.end_frame, e))?;
        if mask.width != info.width || mask.height != info.height {
            return Err(WipeError::InvalidParameter(format!(
                "mask is {}x{}, video is {}x{}",
                mask.width, mask.height, info.width, info.height
            )));
        }

        let started = Instant::now();
        let total_steps = job.frame_count() * STEPS_PER_FRAME + 1;
        let report = |frame: usize, step: ExportStep, completed_steps: usize| ExportProgress {
            frame,
            start_frame: job.start_frame,
            end_frame: job.end_frame,
            step,
            completed_steps,
            total_steps,
            output: target.path.clone(),
        };

        info!(
            start = job.start_frame,
            end = job.end_frame,
            radius = job.inpaint_radius,
            output = %target.path.display(),
            "starting export"
        );
        let mut writer = sink.open(target)?;

        for (n, index) in (job.start_frame..=job.end_frame).enumerate() {
            if cancel.is_cancelled() {
                warn!(frame = index, "export cancelled");
                return Err(WipeError::Cancelled);
            }
            let done = n * STEPS_PER_FRAME;

            on_progress(report(index, ExportStep::Loading, done));
            let frame = self
                .cache
                .decode_uncached(index)
                .map_err(|e| WipeError::frame_load(index, e))?;

            on_progress(report(index, ExportStep::Inpainting, done + 1));
            let cleaned = inpaint(&frame, &mask, job.inpaint_radius);

            on_progress(report(index, ExportStep::Writing, done + 2));
            writer.write(&cleaned)?;
        }

        writer.close()?;
        on_progress(report(job.end_frame, ExportStep::Finished, total_steps));

        let summary = ExportSummary {
            start_frame: job.start_frame,
            end_frame: job.end_frame,
            frames_written: job.frame_count(),
            output: target.path.clone(),
            elapsed: started.elapsed(),
        };
        info!(
            frames = summary.frames_written,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "export finished"
        );
        Ok(summary)
    }
}
