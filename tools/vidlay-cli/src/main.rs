//! vidlay CLI: overlay one video on top of another.
//!
//! Usage:
//!   vidlay overlay <MAIN> <OVERLAY> -o <OUT>   Composite OVERLAY onto MAIN
//!   vidlay probe <FILE>                       Show the first video stream
//!   vidlay check                              Check ffmpeg tooling

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vidlay_common::config::{AppConfig, FormatFamily, LoggingConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "vidlay",
    about = "Composite an overlay video onto a main video, frame by frame",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Overlay a video onto the main video and encode the result
    Overlay {
        /// Main (background) video
        main: PathBuf,

        /// Overlay video or image
        overlay: PathBuf,

        /// Output file; the container is picked from its extension
        #[arg(short, long)]
        output: PathBuf,

        /// Horizontal offset expression (main_w, main_h, overlay_w, overlay_h)
        #[arg(short = 'x', long = "x")]
        x: Option<String>,

        /// Vertical offset expression
        #[arg(short = 'y', long = "y")]
        y: Option<String>,

        /// Pixel format family: yuv|rgb
        #[arg(long)]
        format: Option<FormatFamily>,

        /// Start position in the main input (microseconds)
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..))]
        main_seek: i64,

        /// Start position in the overlay input (microseconds)
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(i64).range(0..))]
        overlay_seek: i64,

        /// Force the main input's container format
        #[arg(long)]
        main_container: Option<String>,

        /// Force the overlay input's container format
        #[arg(long)]
        overlay_container: Option<String>,

        /// Stop after this many output frames
        #[arg(long)]
        max_frames: Option<u64>,
    },

    /// Show the first video stream of a file
    Probe {
        /// Media file
        path: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check ffmpeg tooling and list the available filter
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    vidlay_common::logging::init_logging(&LoggingConfig {
        level: log_level,
        json: cli.json_logs || config.logging.json,
        file: config.logging.file.clone(),
    });

    match cli.command {
        Commands::Overlay {
            main,
            overlay,
            output,
            x,
            y,
            format,
            main_seek,
            overlay_seek,
            main_container,
            overlay_container,
            max_frames,
        } => {
            let args = commands::overlay::OverlayArgs {
                main,
                overlay,
                output,
                x,
                y,
                format,
                main_seek,
                overlay_seek,
                main_container,
                overlay_container,
                max_frames,
            };
            commands::overlay::run(args, config).await
        }
        Commands::Probe { path, json } => commands::probe::run(path, json, &config),
        Commands::Check => commands::check::run(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overlay_arguments() {
        let cli = Cli::try_parse_from([
            "vidlay",
            "overlay",
            "main.mp4",
            "logo.mov",
            "-o",
            "out.mp4",
            "-x",
            "main_w-overlay_w-10",
            "--format",
            "rgb",
            "--overlay-seek",
            "1000000",
        ])
        .unwrap();
        match cli.command {
            Commands::Overlay {
                x,
                y,
                format,
                overlay_seek,
                main_seek,
                ..
            } => {
                assert_eq!(x.as_deref(), Some("main_w-overlay_w-10"));
                assert_eq!(y, None);
                assert_eq!(format, Some(FormatFamily::Rgb));
                assert_eq!(overlay_seek, 1_000_000);
                assert_eq!(main_seek, 0);
            }
            _ => panic!("expected overlay command"),
        }
    }

    #[test]
    fn test_negative_seek_is_rejected() {
        let result = Cli::try_parse_from([
            "vidlay",
            "overlay",
            "a.mp4",
            "b.mp4",
            "-o",
            "c.mp4",
            "--main-seek=-5",
        ]);
        assert!(result.is_err());
    }
}
