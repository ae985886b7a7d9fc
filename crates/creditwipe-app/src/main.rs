//! creditwipe - remove burned-in credits from video
//!
//! Entry point: parses the command line, installs logging and drives a
//! [`Session`] for each subcommand.

mod args;

use anyhow::{Context, Result};
use args::{Cli, Command, PreviewArgs, RenderArgs};
use clap::Parser;
use creditwipe_core::{DisplayParameters, FrameBuffer, StudioConfig};
use creditwipe_engine::Session;
use creditwipe_media::{probe, ExportStep};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = StudioConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    init_logging(cli.log.as_deref(), &config)?;

    info!("creditwipe starting");
    match cli.cmd {
        Command::Probe { video } => cmd_probe(&video),
        Command::Preview(args) => cmd_preview(args, &config),
        Command::Render(args) => cmd_render(args, &config),
    }
}

/// `--log` wins over `RUST_LOG`, which wins over the configured filter.
fn init_logging(flag: Option<&str>, config: &StudioConfig) -> Result<()> {
    let filter = match flag {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.log_filter))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn cmd_probe(video: &Path) -> Result<()> {
    let info = probe(video).with_context(|| format!("failed to probe {}", video.display()))?;
    println!("path:    {}", info.path.display());
    println!("size:    {}x{}", info.width, info.height);
    println!("frames:  {}", info.frame_count);
    println!("fps:     {} ({:.3})", info.frame_rate, info.frame_rate.to_fps_f64());
    println!("codec:   {}", info.codec);
    Ok(())
}

fn cmd_preview(args: PreviewArgs, config: &StudioConfig) -> Result<()> {
    let session = Session::open_path(&args.video, config)
        .with_context(|| format!("failed to open {}", args.video.display()))?;
    let info = session.video_info().clone();

    session.on_mask_parameters_changed(args.mask.to_parameters(&info));
    let centre = DisplayParameters::centred(info.width, info.height);
    let (anchor_x, anchor_y) = args.anchor.unwrap_or((centre.anchor_x, centre.anchor_y));
    session.on_display_parameters_changed(DisplayParameters {
        mode: args.mode.into(),
        zoom: args.zoom,
        anchor_x,
        anchor_y,
    });
    if let Some(radius) = args.radius {
        let mut job = session.controls().render;
        job.inpaint_radius = radius;
        session.on_render_parameters_changed(job);
    }

    session
        .update_now()
        .map_err(|e| anyhow::anyhow!("mask update failed: {e}"))?;
    let image = session
        .apply_now()
        .map_err(|e| anyhow::anyhow!("display failed: {e}"))?;

    write_png(&image, &args.out)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs, config: &StudioConfig) -> Result<()> {
    let session = Session::open_path(&args.video, config)
        .with_context(|| format!("failed to open {}", args.video.display()))?;
    let info = session.video_info().clone();

    session.on_mask_parameters_changed(args.mask.to_parameters(&info));
    session
        .update_now()
        .map_err(|e| anyhow::anyhow!("mask update failed: {e}"))?;

    let job = args.job(&info, config.default_inpaint_radius);
    let handle = session
        .request_export(job, &args.out)
        .context("failed to start export")?;
    info!(id = %handle.id(), "export started");

    for progress in handle.progress().iter() {
        // One line per frame keeps the output readable
        if matches!(progress.step, ExportStep::Loading | ExportStep::Finished) {
            eprintln!("[{:>5.1}%] {}", progress.fraction() * 100.0, progress.status());
        }
    }

    let summary = handle
        .wait()
        .with_context(|| format!("export to {} failed", args.out.display()))?;
    eprintln!(
        "wrote {} frames to {} in {:.1}s",
        summary.frames_written,
        summary.output.display(),
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}

fn write_png(frame: &FrameBuffer, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        path,
        &frame.to_packed(),
        frame.width,
        frame.height,
        image::ColorType::Rgb8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))
}
