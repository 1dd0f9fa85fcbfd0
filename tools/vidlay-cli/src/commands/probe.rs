//! Show the first video stream of a file.

use std::path::PathBuf;

use anyhow::Context;
use vidlay_common::config::AppConfig;
use vidlay_overlay_engine::ffmpeg::probe_video_stream;

pub fn run(path: PathBuf, json: bool, config: &AppConfig) -> anyhow::Result<()> {
    let probed = probe_video_stream(&config.ffmpeg.ffprobe_bin, &path, None)
        .with_context(|| format!("Failed to probe {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&probed)?);
        return Ok(());
    }

    println!("File: {}", path.display());
    if let Some(container) = &probed.container {
        println!("  Container: {container}");
    }
    println!("  Resolution: {}x{}", probed.width, probed.height);
    println!(
        "  Pixel format: {}",
        probed.pix_fmt.as_deref().unwrap_or("unknown")
    );
    match probed.frame_rate {
        Some(rate) => println!("  Frame rate: {rate} ({:.3} fps)", rate.to_f64()),
        None => println!("  Frame rate: unknown"),
    }
    println!("  Sample aspect ratio: {}", probed.sample_aspect_ratio);
    if let Some(start) = probed.start_time_secs {
        println!("  Start: {start:.3}s");
    }
    if let Some(duration) = probed.duration_secs {
        println!("  Duration: {duration:.3}s");
    }

    Ok(())
}
