//! Video decoder using FFmpeg via ffmpeg-sidecar.

use crate::probe::probe;
use crate::source::{VideoInfo, VideoSource};
use creditwipe_core::{FrameBuffer, PixelFormat, Result, WipeError};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Decodes single frames from a video file.
///
/// Every read spawns an FFmpeg process that seeks to the frame's timestamp
/// and writes exactly one `rgb24` frame to stdout. The FFmpeg binary is the
/// one ffmpeg-sidecar resolves, so no development headers are needed.
pub struct FfmpegSource {
    info: VideoInfo,
    ffmpeg: PathBuf,
}

impl FfmpegSource {
    /// Probe and open a video file for decoding.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let info = probe(path.as_ref())?;
        info!(
            path = %info.path.display(),
            width = info.width,
            height = info.height,
            frames = info.frame_count,
            fps = %info.frame_rate,
            codec = %info.codec,
            "opened video"
        );
        Ok(Self::with_info(info))
    }

    /// Use already-probed metadata.
    pub fn with_info(info: VideoInfo) -> Self {
        Self {
            info,
            ffmpeg: ffmpeg_sidecar::paths::ffmpeg_path(),
        }
    }

    /// FFmpeg arguments that decode frame `index` to raw RGB on stdout.
    pub fn decode_args(&self, index: usize) -> Vec<String> {
        let seconds = self.info.frame_rate.frame_to_seconds(index);
        vec![
            "-v".into(),
            "error".into(),
            "-ss".into(),
            format!("{seconds:.6}"),
            "-i".into(),
            self.info.path.to_string_lossy().into_owned(),
            "-an".into(),
            "-frames:v".into(),
            "1".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-".into(),
        ]
    }
}

impl VideoSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn read_frame(&mut self, index: usize) -> Result<FrameBuffer> {
        self.info.check_index(index)?;
        debug!(index, "decoding frame");

        let output = Command::new(&self.ffmpeg)
            .args(self.decode_args(index))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| WipeError::Decoder(format!("failed to spawn ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(WipeError::Decoder(format!(
                "ffmpeg failed on frame {index}: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let expected = PixelFormat::Rgb8.packed_size(self.info.width, self.info.height);
        if output.stdout.len() < expected {
            // Seeking past the last decodable frame yields no output.
            if output.stdout.is_empty() {
                return Err(WipeError::InvalidFrameIndex {
                    index,
                    frame_count: self.info.frame_count,
                });
            }
            return Err(WipeError::Decoder(format!(
                "frame {index}: expected {expected} bytes, got {}",
                output.stdout.len()
            )));
        }

        FrameBuffer::from_packed(
            self.info.width,
            self.info.height,
            PixelFormat::Rgb8,
            &output.stdout,
        )
        .ok_or_else(|| WipeError::Decoder(format!("frame {index}: short buffer")))
    }
}
