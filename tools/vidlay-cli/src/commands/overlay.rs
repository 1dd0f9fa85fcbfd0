//! Composite one video onto another.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use vidlay_common::config::{AppConfig, FormatFamily};
use vidlay_frame_model::{PixelFormat, Rational};
use vidlay_overlay_engine::{
    EncoderSink, FrameSource, MovieSource, MovieSourceConfig, OverlayConfig, OverlayStage,
    StageStats, VideoFilter,
};

pub struct OverlayArgs {
    pub main: PathBuf,
    pub overlay: PathBuf,
    pub output: PathBuf,
    pub x: Option<String>,
    pub y: Option<String>,
    pub format: Option<FormatFamily>,
    pub main_seek: i64,
    pub overlay_seek: i64,
    pub main_container: Option<String>,
    pub overlay_container: Option<String>,
    pub max_frames: Option<u64>,
}

struct RenderSummary {
    frames: u64,
    stats: StageStats,
    elapsed: Duration,
    cancelled: bool,
}

pub async fn run(args: OverlayArgs, config: AppConfig) -> anyhow::Result<()> {
    println!("Overlaying {} onto {}", args.overlay.display(), args.main.display());
    println!("  Output: {}", args.output.display());

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current frame");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let output = args.output.clone();
    let summary = tokio::task::spawn_blocking(move || render(&args, &config, &cancel))
        .await
        .context("overlay task failed to complete")??;

    let fps = if summary.elapsed.as_secs_f64() > 0.0 {
        summary.frames as f64 / summary.elapsed.as_secs_f64()
    } else {
        0.0
    };
    tracing::info!(
        frames = summary.frames,
        base_reused = summary.stats.base_reused,
        overlay_reused = summary.stats.overlay_reused,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        cancelled = summary.cancelled,
        "Overlay finished"
    );

    if summary.cancelled {
        println!("\nInterrupted after {} frames: {}", summary.frames, output.display());
    } else {
        println!(
            "\nOverlay complete: {} ({} frames, {:.1} fps)",
            output.display(),
            summary.frames,
            fps
        );
    }
    Ok(())
}

/// Base and overlay pixel formats for a format family.
fn format_pair(family: FormatFamily) -> (PixelFormat, PixelFormat) {
    match family {
        FormatFamily::Yuv => (PixelFormat::Yuv420p, PixelFormat::Yuva420p),
        FormatFamily::Rgb => (PixelFormat::Bgr24, PixelFormat::Bgra),
    }
}

fn fallback_rate(config: &AppConfig) -> Rational {
    let fps = config.overlay.fallback_frame_rate.clamp(1, i32::MAX as u32);
    Rational::new(fps as i32, 1)
}

fn render(
    args: &OverlayArgs,
    config: &AppConfig,
    cancel: &AtomicBool,
) -> anyhow::Result<RenderSummary> {
    let (base_format, overlay_format) = format_pair(args.format.unwrap_or(config.overlay.format));
    let fallback = fallback_rate(config);

    let main_config = MovieSourceConfig::new(&args.main)
        .with_seek_point(args.main_seek)
        .with_format_name(args.main_container.clone())
        .with_fallback_frame_rate(fallback);
    let overlay_config = MovieSourceConfig::new(&args.overlay)
        .with_seek_point(args.overlay_seek)
        .with_format_name(args.overlay_container.clone())
        .with_fallback_frame_rate(fallback);

    let main = MovieSource::open(&main_config, base_format, &config.ffmpeg)
        .with_context(|| format!("Failed to open main input {}", args.main.display()))?;
    let overlay = MovieSource::open(&overlay_config, overlay_format, &config.ffmpeg)
        .with_context(|| format!("Failed to open overlay input {}", args.overlay.display()))?;
    let frame_rate = main.info().frame_rate.unwrap_or(fallback);

    let position = OverlayConfig::new(
        args.x.clone().unwrap_or_else(|| config.overlay.x.clone()),
        args.y.clone().unwrap_or_else(|| config.overlay.y.clone()),
    )?;
    let mut stage = OverlayStage::new(&position, Box::new(main), Box::new(overlay))
        .context("Failed to configure overlay")?;

    let info = stage.output_info();
    println!(
        "  Resolution: {}x{} {} @ {} fps",
        info.width, info.height, info.format, frame_rate
    );

    let mut sink = EncoderSink::create(&args.output, &info, frame_rate, &config.ffmpeg)?;
    let started = Instant::now();
    let mut cancelled = false;

    while let Some(frame) = stage.produce_next() {
        let pts = frame.pts;
        sink.write_frame(frame)?;

        let written = sink.frames_written();
        if written % 100 == 0 {
            tracing::debug!(frames = written, pts, "Progress");
        }
        if args.max_frames.is_some_and(|max| written >= max) {
            break;
        }
        if cancel.load(Ordering::SeqCst) {
            cancelled = true;
            break;
        }
    }

    let frames = sink.finish().context("Encoder failed")?;
    Ok(RenderSummary {
        frames,
        stats: stage.stats(),
        elapsed: started.elapsed(),
        cancelled,
    })
}
