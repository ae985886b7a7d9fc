//! Sequential frame sources.

use creditwipe_core::{FrameBuffer, FrameRate, Result, WipeError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Stream metadata of an opened video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub frame_count: usize,
    pub frame_rate: FrameRate,
    /// Codec name as reported by ffprobe (e.g. `h264`).
    pub codec: String,
}

impl VideoInfo {
    /// Reject frame indices outside the stream.
    pub fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.frame_count {
            return Err(WipeError::InvalidFrameIndex {
                index,
                frame_count: self.frame_count,
            });
        }
        Ok(())
    }
}

/// A decoder with a single seek/read cursor.
///
/// Reads take `&mut self`: a source is not a random-access store, and callers
/// sharing one must serialize access to it.
pub trait VideoSource: Send {
    /// Stream metadata.
    fn info(&self) -> &VideoInfo;

    /// Seek to `index` and decode that frame as `Rgb8`.
    ///
    /// Fails with [`WipeError::InvalidFrameIndex`] if the index is beyond the
    /// stream.
    fn read_frame(&mut self, index: usize) -> Result<FrameBuffer>;

    fn frame_count(&self) -> usize {
        self.info().frame_count
    }

    fn width(&self) -> u32 {
        self.info().width
    }

    fn height(&self) -> u32 {
        self.info().height
    }

    fn fps(&self) -> f64 {
        self.info().frame_rate.to_fps_f64()
    }

    fn codec_id(&self) -> &str {
        &self.info().codec
    }
}

/// Frames held in memory. Used for tests and still-image sources.
pub struct MemorySource {
    info: VideoInfo,
    frames: Vec<FrameBuffer>,
    reads: Arc<AtomicUsize>,
}

impl MemorySource {
    /// Wrap decoded frames. All frames must share the first frame's size.
    pub fn new(frames: Vec<FrameBuffer>, frame_rate: FrameRate) -> Result<Self> {
        let (width, height) = frames
            .first()
            .map(|f| (f.width, f.height))
            .ok_or_else(|| WipeError::InvalidParameter("memory source has no frames".into()))?;
        if let Some(bad) = frames.iter().position(|f| f.width != width || f.height != height) {
            return Err(WipeError::InvalidParameter(format!(
                "frame {bad} is {}x{}, expected {width}x{height}",
                frames[bad].width, frames[bad].height
            )));
        }
        Ok(Self {
            info: VideoInfo {
                path: PathBuf::from("memory"),
                width,
                height,
                frame_count: frames.len(),
                frame_rate,
                codec: "rawvideo".to_string(),
            },
            frames,
            reads: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// `count` distinct frames: colour bars rolled right by the frame index.
    pub fn pattern(count: usize, width: u32, height: u32) -> Self {
        let base = FrameBuffer::test_pattern(width, height);
        let frames = (0..count)
            .map(|i| {
                let mut frame = base.clone();
                let shift = (i % width.max(1) as usize) * 3;
                for (_, row) in frame.rows_mut() {
                    row.rotate_right(shift);
                }
                frame
            })
            .collect();
        Self {
            info: VideoInfo {
                path: PathBuf::from("memory"),
                width,
                height,
                frame_count: count,
                frame_rate: FrameRate::default(),
                codec: "rawvideo".to_string(),
            },
            frames,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared read counter, still readable after the source is moved.
    pub fn reads_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl VideoSource for MemorySource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn read_frame(&mut self, index: usize) -> Result<FrameBuffer> {
        self.info.check_index(index)?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.frames[index].clone())
    }
}
