//! Command line arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use creditwipe_core::{
    CropRect, DisplayMode, HsvBand, MaskMode, MaskParameters, RenderJobParameters, Zoom,
};
use creditwipe_media::VideoInfo;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "creditwipe", version, about = "Remove burned-in credits from video")]
pub struct Cli {
    /// Config file (defaults to the user config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `creditwipe_engine=trace`.
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print video metadata.
    Probe {
        video: PathBuf,
    },
    /// Render one preview image as a PNG.
    Preview(PreviewArgs),
    /// Inpaint a frame range into a new video (requires `ffmpeg`).
    Render(RenderArgs),
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    pub video: PathBuf,

    #[command(flatten)]
    pub mask: MaskArgs,

    /// What to show.
    #[arg(long, value_enum, default_value_t = ViewMode::Mask)]
    pub mode: ViewMode,

    /// `fit` or a percentage such as `150`.
    #[arg(long, default_value = "fit", value_parser = parse_zoom)]
    pub zoom: Zoom,

    /// Source point kept centred, as `X,Y`. Defaults to the frame centre.
    #[arg(long, value_parser = parse_point)]
    pub anchor: Option<(f64, f64)>,

    /// Inpaint radius for `--mode preview`.
    #[arg(long)]
    pub radius: Option<u32>,

    /// Output PNG path.
    #[arg(short, long)]
    pub out: PathBuf,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    pub video: PathBuf,

    #[command(flatten)]
    pub mask: MaskArgs,

    /// First frame to export.
    #[arg(long, default_value_t = 0)]
    pub start: usize,

    /// Last frame to export (inclusive). Defaults to the last frame.
    #[arg(long)]
    pub end: Option<usize>,

    /// Inpaint radius. Defaults to the configured radius.
    #[arg(long)]
    pub radius: Option<u32>,

    /// Output video path.
    #[arg(short, long)]
    pub out: PathBuf,
}

/// Flags describing the mask layer.
#[derive(Args, Debug, Clone)]
pub struct MaskArgs {
    /// Reference frame the mask is computed from.
    #[arg(long, default_value_t = 0)]
    pub frame: usize,

    /// Never inpaint the selection instead of always inpainting it.
    #[arg(long)]
    pub exclude: bool,

    /// Hue band `MIN:MAX` (0-179).
    #[arg(long, default_value = "0:179", value_parser = parse_band)]
    pub hue: HsvBand,

    /// Saturation band `MIN:MAX` (0-255).
    #[arg(long, default_value = "0:255", value_parser = parse_band)]
    pub sat: HsvBand,

    /// Value band `MIN:MAX` (0-255).
    #[arg(long, default_value = "0:255", value_parser = parse_band)]
    pub val: HsvBand,

    /// Dilation in pixels.
    #[arg(long, default_value_t = 0)]
    pub grow: u32,

    /// Crop box `LEFT,TOP,RIGHT,BOTTOM`. Defaults to the whole frame.
    #[arg(long, value_parser = parse_crop)]
    pub crop: Option<CropRect>,
}

impl MaskArgs {
    pub fn to_parameters(&self, info: &VideoInfo) -> MaskParameters {
        MaskParameters {
            frame: self.frame,
            mode: if self.exclude {
                MaskMode::Exclude
            } else {
                MaskMode::Include
            },
            hue: self.hue,
            sat: self.sat,
            val: self.val,
            grow: self.grow,
            crop: self
                .crop
                .unwrap_or_else(|| CropRect::full(info.width, info.height)),
        }
    }
}

impl RenderArgs {
    pub fn job(&self, info: &VideoInfo, default_radius: u32) -> RenderJobParameters {
        let end = self
            .end
            .unwrap_or_else(|| info.frame_count.saturating_sub(1));
        RenderJobParameters::new(self.start, end, self.radius.unwrap_or(default_radius))
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Original,
    Mask,
    Draw,
    Preview,
}

impl From<ViewMode> for DisplayMode {
    fn from(mode: ViewMode) -> Self {
        match mode {
            ViewMode::Original => DisplayMode::Original,
            ViewMode::Mask => DisplayMode::Mask,
            ViewMode::Draw => DisplayMode::Draw,
            ViewMode::Preview => DisplayMode::Preview,
        }
    }
}

fn parse_band(s: &str) -> Result<HsvBand, String> {
    let (min, max) = s
        .split_once(':')
        .ok_or_else(|| format!("expected MIN:MAX, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<i32>()
            .map_err(|e| format!("bad bound '{v}': {e}"))
    };
    Ok(HsvBand::new(parse(min)?, parse(max)?))
}

fn parse_numbers<const N: usize>(s: &str) -> Result<[f64; N], String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("bad number '{v}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    values
        .try_into()
        .map_err(|_| format!("expected {N} comma separated numbers, got '{s}'"))
}

fn parse_crop(s: &str) -> Result<CropRect, String> {
    let [left, top, right, bottom] = parse_numbers::<4>(s)?;
    Ok(CropRect::new(
        left as i64,
        top as i64,
        right as i64,
        bottom as i64,
    ))
}

fn parse_point(s: &str) -> Result<(f64, f64), String> {
    let [x, y] = parse_numbers::<2>(s)?;
    Ok((x, y))
}

fn parse_zoom(s: &str) -> Result<Zoom, String> {
    if s.eq_ignore_ascii_case("fit") {
        return Ok(Zoom::Fit);
    }
    let percent: f64 = s
        .trim_end_matches('%')
        .parse()
        .map_err(|e| format!("bad zoom '{s}': {e}"))?;
    if !(percent.is_finite() && percent > 0.0) {
        return Err(format!("zoom must be positive, got '{s}'"));
    }
    Ok(Zoom::Factor(percent / 100.0))
}
