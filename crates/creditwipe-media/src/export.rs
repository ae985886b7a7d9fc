//! Output sinks for full-video renders.
//!
//! A sink is opened once per export with the target's codec, rate and size,
//! then fed frames in order. The FFmpeg sink pipes raw RGB frames into an
//! encoder process; the memory sink collects them for tests and previews.
//! Progress reporting and cancellation types live here too.

use creditwipe_core::{ExportConfig, FrameBuffer, FrameRate, Result, WipeError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

// ── Codecs ──────────────────────────────────────────────────────

/// Video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoCodec {
    H264,
    H265,
    ProRes422,
    Vp9,
    Av1,
}

impl VideoCodec {
    /// Match an ffprobe `codec_name`. Unknown codecs map to `None`.
    pub fn from_codec_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "h264" | "avc1" | "libx264" => Some(Self::H264),
            "hevc" | "h265" | "hvc1" | "libx265" => Some(Self::H265),
            "prores" | "prores_ks" => Some(Self::ProRes422),
            "vp9" | "libvpx-vp9" => Some(Self::Vp9),
            "av1" | "libaom-av1" => Some(Self::Av1),
            _ => None,
        }
    }

    /// FFmpeg encoder name.
    pub fn ffmpeg_encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::ProRes422 => "prores_ks",
            Self::Vp9 => "libvpx-vp9",
            Self::Av1 => "libaom-av1",
        }
    }

    /// Whether the encoder takes a `-crf` quality setting.
    pub fn supports_crf(self) -> bool {
        !matches!(self, Self::ProRes422)
    }

    /// Output pixel format.
    pub fn pixel_format(self) -> &'static str {
        match self {
            Self::ProRes422 => "yuv422p10le",
            _ => "yuv420p",
        }
    }
}

// ── Targets and sinks ───────────────────────────────────────────

/// Where and how an export is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTarget {
    pub path: PathBuf,
    /// Source codec name; the encoder is chosen to match it.
    pub codec: String,
    pub frame_rate: FrameRate,
    pub width: u32,
    pub height: u32,
    /// Explicit FFmpeg encoder, bypassing the codec match.
    pub encoder: Option<String>,
    pub crf: Option<u8>,
}

impl ExportTarget {
    pub fn new(
        path: impl Into<PathBuf>,
        codec: impl Into<String>,
        frame_rate: FrameRate,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            path: path.into(),
            codec: codec.into(),
            frame_rate,
            width,
            height,
            encoder: None,
            crf: None,
        }
    }

    /// Apply encoder settings from the studio config.
    pub fn with_settings(mut self, settings: &ExportConfig) -> Self {
        self.encoder = settings.encoder.clone();
        self.crf = Some(settings.crf);
        self
    }

    /// Codec used for encoding, falling back to H.264 for unknown sources.
    pub fn video_codec(&self) -> VideoCodec {
        VideoCodec::from_codec_name(&self.codec).unwrap_or(VideoCodec::H264)
    }
}

/// Opens writers for export targets.
pub trait OutputSink: Send + Sync {
    /// Fails with [`WipeError::SinkOpen`] if the target is unusable.
    fn open(&self, target: &ExportTarget) -> Result<Box<dyn FrameWriter>>;
}

/// An open output stream.
pub trait FrameWriter: Send {
    /// Append one frame. Fails with [`WipeError::SinkWrite`].
    fn write(&mut self, frame: &FrameBuffer) -> Result<()>;

    /// Flush and finalize the output. Fails with [`WipeError::SinkWrite`].
    fn close(self: Box<Self>) -> Result<()>;
}

/// Build the FFmpeg command arguments for encoding raw frames from stdin.
pub fn ffmpeg_args(target: &ExportTarget) -> Vec<String> {
    let codec = target.video_codec();
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-v".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pixel_format".into(),
        "rgb24".into(),
        "-video_size".into(),
        format!("{}x{}", target.width, target.height),
        "-framerate".into(),
        format!(
            "{}/{}",
            target.frame_rate.numerator, target.frame_rate.denominator
        ),
        "-i".into(),
        "pipe:0".into(),
    ];

    match &target.encoder {
        Some(encoder) => args.extend(["-c:v".to_string(), encoder.clone()]),
        None => {
            args.extend(["-c:v".to_string(), codec.ffmpeg_encoder().to_string()]);
            if let (Some(crf), true) = (target.crf, codec.supports_crf()) {
                args.extend(["-crf".to_string(), crf.to_string()]);
            }
            if codec == VideoCodec::ProRes422 {
                args.extend(["-profile:v".to_string(), "2".to_string()]);
            }
        }
    }

    args.extend(["-pix_fmt".to_string(), codec.pixel_format().to_string()]);
    args.push(target.path.to_string_lossy().into_owned());
    args
}

/// Encodes through an FFmpeg child process.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegSink;

impl OutputSink for FfmpegSink {
    fn open(&self, target: &ExportTarget) -> Result<Box<dyn FrameWriter>> {
        if target.width == 0 || target.height == 0 {
            return Err(WipeError::SinkOpen(format!(
                "invalid frame size {}x{}",
                target.width, target.height
            )));
        }
        if let Some(parent) = target.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(WipeError::SinkOpen(format!(
                    "directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        let args = ffmpeg_args(target);
        debug!(?args, "spawning encoder");
        let mut child = Command::new(ffmpeg_sidecar::paths::ffmpeg_path())
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| WipeError::SinkOpen(format!("failed to spawn ffmpeg: {e}")))?;

        let (Some(stdin), Some(stderr)) = (child.stdin.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(WipeError::SinkOpen("failed to open ffmpeg pipes".into()));
        };
        let log = match spawn_log_reader(stderr) {
            Ok(log) => log,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(WipeError::SinkOpen(format!("failed to read ffmpeg output: {e}")));
            }
        };

        Ok(Box::new(FfmpegWriter {
            child,
            stdin: Some(stdin),
            log: Some(log),
            width: target.width,
            height: target.height,
            frames: 0,
        }))
    }
}

/// Drain an encoder's error output on a helper thread so the pipe never
/// fills up. The thread yields everything it read once the pipe closes.
fn spawn_log_reader<R>(reader: R) -> io::Result<JoinHandle<String>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("ffmpeg-stderr".into())
        .spawn(move || {
            let mut log = Vec::new();
            for line in BufReader::new(reader).lines().map_while(io::Result::ok) {
                debug!(%line, "encoder output");
                log.push(line);
            }
            log.join("\n")
        })
}

fn encoder_error(message: String, log: &str) -> WipeError {
    let log = log.trim();
    if log.is_empty() {
        WipeError::SinkWrite(message)
    } else {
        WipeError::SinkWrite(format!("{message}: {log}"))
    }
}

struct FfmpegWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    log: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    frames: usize,
}

impl FrameWriter for FfmpegWriter {
    fn write(&mut self, frame: &FrameBuffer) -> Result<()> {
        check_frame(frame, self.width, self.height)?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| WipeError::SinkWrite("encoder already closed".into()))?;
        let written = (0..frame.height).try_for_each(|y| stdin.write_all(frame.row(y)));
        if let Err(e) = written {
            // Usually a broken pipe: the encoder died and its log says why.
            drop(self.stdin.take());
            let _ = self.child.wait();
            return Err(encoder_error(
                format!("failed to write frame: {e}"),
                &self.take_log(),
            ));
        }
        self.frames += 1;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        // Close stdin to signal end-of-stream
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| WipeError::SinkWrite(format!("failed to wait for ffmpeg: {e}")))?;
        let log = self.take_log();
        if !status.success() {
            return Err(encoder_error(
                format!("ffmpeg exited with status: {status}"),
                &log,
            ));
        }
        debug!(frames = self.frames, "encoder finished");
        Ok(())
    }
}

impl FfmpegWriter {
    /// Everything the encoder printed. Only complete once the process exited.
    fn take_log(&mut self) -> String {
        self.log
            .take()
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default()
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        // Still holding stdin means the writer was abandoned mid-export.
        if self.stdin.take().is_some() {
            warn!(frames = self.frames, "killing unfinished encoder");
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn check_frame(frame: &FrameBuffer, width: u32, height: u32) -> Result<()> {
    if frame.width != width || frame.height != height {
        return Err(WipeError::SinkWrite(format!(
            "frame is {}x{}, output is {width}x{height}",
            frame.width, frame.height
        )));
    }
    Ok(())
}

/// Collects written frames in memory.
///
/// Clones share the same storage, so a test can keep one handle and give
/// another to the renderer.
#[derive(Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryOutput>>,
}

#[derive(Default)]
struct MemoryOutput {
    target: Option<ExportTarget>,
    frames: Vec<FrameBuffer>,
    closed: bool,
    fail_open: bool,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `open` always fails.
    pub fn failing_open() -> Self {
        let sink = Self::default();
        sink.state.lock().fail_open = true;
        sink
    }

    /// A sink that rejects writes once `frames` frames were accepted.
    pub fn failing_after(frames: usize) -> Self {
        let sink = Self::default();
        sink.state.lock().fail_after = Some(frames);
        sink
    }

    /// Frames written so far.
    pub fn frames(&self) -> Vec<FrameBuffer> {
        self.state.lock().frames.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Target passed to the last `open`.
    pub fn target(&self) -> Option<ExportTarget> {
        self.state.lock().target.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemorySink")
            .field("frames", &state.frames.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl OutputSink for MemorySink {
    fn open(&self, target: &ExportTarget) -> Result<Box<dyn FrameWriter>> {
        let mut state = self.state.lock();
        if state.fail_open {
            return Err(WipeError::SinkOpen(format!(
                "cannot create {}",
                target.path.display()
            )));
        }
        state.target = Some(target.clone());
        state.frames.clear();
        state.closed = false;
        Ok(Box::new(MemoryWriter {
            state: Arc::clone(&self.state),
            width: target.width,
            height: target.height,
        }))
    }
}

struct MemoryWriter {
    state: Arc<Mutex<MemoryOutput>>,
    width: u32,
    height: u32,
}

impl FrameWriter for MemoryWriter {
    fn write(&mut self, frame: &FrameBuffer) -> Result<()> {
        check_frame(frame, self.width, self.height)?;
        let mut state = self.state.lock();
        if state.fail_after.is_some_and(|limit| state.frames.len() >= limit) {
            return Err(WipeError::SinkWrite("disk full".into()));
        }
        state.frames.push(frame.clone());
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}

// ── Progress and cancellation ───────────────────────────────────

/// Sub-step of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportStep {
    Loading,
    Inpainting,
    Writing,
    Finished,
}

/// Steps reported per exported frame.
pub const STEPS_PER_FRAME: usize = 3;

/// Export progress information.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Frame being processed (last frame once finished).
    pub frame: usize,
    pub start_frame: usize,
    pub end_frame: usize,
    pub step: ExportStep,
    /// Steps completed so far.
    pub completed_steps: usize,
    pub total_steps: usize,
    pub output: PathBuf,
}

impl ExportProgress {
    /// Completion percentage (0.0 to 1.0).
    pub fn fraction(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.completed_steps as f64 / self.total_steps as f64
    }

    /// Human readable status line.
    pub fn status(&self) -> String {
        match self.step {
            ExportStep::Loading => format!("{}/{} loading frame...", self.frame, self.end_frame),
            ExportStep::Inpainting => {
                format!("{}/{} rendering frame...", self.frame, self.end_frame)
            }
            ExportStep::Writing => format!("{}/{} saving frame...", self.frame, self.end_frame),
            ExportStep::Finished => format!(
                "Finished rendering {}-{} to {}",
                self.start_frame,
                self.end_frame,
                self.output.display()
            ),
        }
    }
}

/// Handle for cancelling an in-progress export.
#[derive(Debug, Clone)]
pub struct ExportCancel(Arc<AtomicBool>);

impl ExportCancel {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for ExportCancel {
    fn default() -> Self {
        Self::new()
    }
}
