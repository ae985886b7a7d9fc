//! Media file probing to get metadata without full decode.

use crate::source::VideoInfo;
use creditwipe_core::{FrameRate, Result, WipeError};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Probe the first video stream of a file with ffprobe.
pub fn probe(path: &Path) -> Result<VideoInfo> {
    if !path.exists() {
        return Err(WipeError::Probe(format!(
            "file not found: {}",
            path.display()
        )));
    }

    let ffprobe = ffmpeg_sidecar::ffprobe::ffprobe_path();
    debug!(ffprobe = %ffprobe.display(), path = %path.display(), "probing");

    let output = Command::new(&ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| WipeError::Probe(format!("failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(WipeError::Probe(format!(
            "ffprobe failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_ffprobe_json(path, &String::from_utf8_lossy(&output.stdout))
}

/// Extract [`VideoInfo`] from ffprobe's `-print_format json` output.
///
/// The frame count comes from `nb_frames` when the container records it and
/// is otherwise estimated from the duration and frame rate.
pub fn parse_ffprobe_json(path: &Path, json: &str) -> Result<VideoInfo> {
    let json: serde_json::Value = serde_json::from_str(json)?;

    let stream = json["streams"]
        .as_array()
        .and_then(|s| s.first())
        .ok_or_else(|| WipeError::Probe("no video stream found".into()))?;

    let dimension = |key: &str| {
        stream[key]
            .as_u64()
            .filter(|&v| v > 0)
            .map(|v| v as u32)
            .ok_or_else(|| WipeError::Probe(format!("missing {key}")))
    };
    let width = dimension("width")?;
    let height = dimension("height")?;

    let frame_rate = stream["r_frame_rate"]
        .as_str()
        .into_iter()
        .chain(stream["avg_frame_rate"].as_str())
        .find_map(|rate| rate.parse::<FrameRate>().ok())
        .unwrap_or_default();

    let as_number = |value: &serde_json::Value| -> Option<f64> {
        value
            .as_str()
            .and_then(|s| s.parse().ok())
            .or_else(|| value.as_f64())
    };

    let frame_count = as_number(&stream["nb_frames"])
        .map(|n| n as usize)
        .filter(|&n| n > 0)
        .or_else(|| {
            as_number(&stream["duration"])
                .or_else(|| as_number(&json["format"]["duration"]))
                .map(|secs| frame_rate.seconds_to_frames(secs))
        })
        .filter(|&n| n > 0)
        .ok_or_else(|| WipeError::Probe("cannot determine frame count".into()))?;

    let codec = stream["codec_name"]
        .as_str()
        .unwrap_or("unknown")
        .to_string();

    Ok(VideoInfo {
        path: path.to_path_buf(),
        width,
        height,
        frame_count,
        frame_rate,
        codec,
    })
}
