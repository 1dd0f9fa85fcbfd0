//! Check ffmpeg tooling.

use vidlay_common::config::{config_file_path, AppConfig};
use vidlay_overlay_engine::ffmpeg::{command_exists, tool_version};
use vidlay_overlay_engine::OverlayStage;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("vidlay System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;
    for binary in [&config.ffmpeg.ffmpeg_bin, &config.ffmpeg.ffprobe_bin] {
        if command_exists(binary) {
            let version = tool_version(binary).unwrap_or_else(|| "version unknown".to_string());
            println!("[OK] {binary}: {version}");
        } else {
            println!("[MISSING] {binary}: not found on PATH");
            all_ok = false;
        }
    }

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] Config: {} (not present, using defaults)", config_path.display());
    }

    let descriptor = &OverlayStage::DESCRIPTOR;
    println!();
    println!("Filters:");
    println!("  {}: {}", descriptor.name, descriptor.description);
    println!(
        "     inputs ({}): {}",
        descriptor.input_count(),
        descriptor.inputs.join(", ")
    );
    println!(
        "     outputs ({}): {}",
        descriptor.output_count(),
        descriptor.outputs.join(", ")
    );

    println!();
    if all_ok {
        println!("ffmpeg tooling is available. vidlay is ready.");
    } else {
        println!("Install ffmpeg (which provides ffprobe) or set ffmpeg_bin/ffprobe_bin in the config.");
    }

    Ok(())
}
