//! Frame source that decodes a media file through an `ffmpeg` child
//! process.
//!
//! The file is probed with ffprobe first so that the stream geometry is
//! known before any frame is pulled. Decoded frames arrive on the child's
//! stdout as tightly packed rawvideo, one `frame_size` block per frame.

use std::io::{BufReader, ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use vidlay_common::config::FfmpegConfig;
use vidlay_common::error::{VidlayError, VidlayResult};
use vidlay_frame_model::{rescale, Frame, PixelFormat, Rational, SharedFrame, TIME_BASE_US};

use crate::ffmpeg::{probe_video_stream, ProbedStream};
use crate::source::{FrameSource, StreamInfo};

/// Longest accepted container format name.
pub const MAX_FORMAT_NAME_LEN: usize = 15;

/// Where and how to open a media file.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieSourceConfig {
    pub path: PathBuf,
    /// Forced container format; `None` lets ffmpeg detect it.
    pub format_name: Option<String>,
    /// Start position in microseconds.
    pub seek_point_us: i64,
    /// Rate used when the file does not report one.
    pub fallback_frame_rate: Rational,
}

impl MovieSourceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format_name: None,
            seek_point_us: 0,
            fallback_frame_rate: Rational::new(25, 1),
        }
    }

    pub fn with_seek_point(mut self, seek_point_us: i64) -> Self {
        self.seek_point_us = seek_point_us;
        self
    }

    pub fn with_format_name(mut self, format_name: Option<String>) -> Self {
        self.format_name = format_name;
        self
    }

    pub fn with_fallback_frame_rate(mut self, rate: Rational) -> Self {
        self.fallback_frame_rate = rate;
        self
    }

    /// Parse `SEEK:FORMAT:FILE`, e.g. `0::logo.mov` or `2000000:mp4:in.mp4`.
    ///
    /// The file name is everything after the second colon, so it may itself
    /// contain colons.
    pub fn from_args(args: &str) -> VidlayResult<Self> {
        let mut fields = args.splitn(3, ':');
        let (seek, format, file) = match (fields.next(), fields.next(), fields.next()) {
            (Some(seek), Some(format), Some(file)) => (seek, format, file),
            _ => {
                return Err(VidlayError::config(format!(
                    "Invalid movie arguments '{args}', expected SEEK:FORMAT:FILE"
                )))
            }
        };

        let seek_point_us = if seek.trim().is_empty() {
            0
        } else {
            seek.trim()
                .parse::<i64>()
                .map_err(|_| VidlayError::config(format!("Invalid seek point '{seek}'")))?
        };
        if seek_point_us < 0 {
            return Err(VidlayError::config(format!(
                "Seek point must be non-negative, got {seek_point_us}"
            )));
        }

        if format.len() > MAX_FORMAT_NAME_LEN {
            return Err(VidlayError::config(format!(
                "Format name '{format}' is longer than {MAX_FORMAT_NAME_LEN} characters"
            )));
        }
        if file.is_empty() {
            return Err(VidlayError::config("No file name specified"));
        }

        Ok(Self::new(file)
            .with_seek_point(seek_point_us)
            .with_format_name((!format.is_empty()).then(|| format.to_string())))
    }
}

/// Decodes the first video stream of a file into frames of one pixel format.
pub struct MovieSource {
    label: String,
    info: StreamInfo,
    frame_rate: Rational,
    seek_point_us: i64,
    frame_size: usize,
    frames_read: i64,
    child: Child,
    stdout: Option<BufReader<ChildStdout>>,
    stderr_task: Option<JoinHandle<String>>,
}

impl MovieSource {
    /// Probe `config.path` and start decoding it as `output_format`.
    pub fn open(
        config: &MovieSourceConfig,
        output_format: PixelFormat,
        ffmpeg: &FfmpegConfig,
    ) -> VidlayResult<Self> {
        let probed = probe_video_stream(
            &ffmpeg.ffprobe_bin,
            &config.path,
            config.format_name.as_deref(),
        )?;
        let frame_rate = probed
            .frame_rate
            .filter(|rate| rate.is_valid() && rate.num > 0)
            .unwrap_or(config.fallback_frame_rate);

        let args = decode_args(config, output_format, frame_rate);
        tracing::debug!(bin = %ffmpeg.ffmpeg_bin, ?args, "Starting decoder");

        let mut child = Command::new(&ffmpeg.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                VidlayError::source(format!("Failed to start {}: {e}", ffmpeg.ffmpeg_bin))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VidlayError::source("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VidlayError::source("Failed to capture ffmpeg stderr"))?;

        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let info = stream_info(&probed, output_format, frame_rate);
        let label = config
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.path.display().to_string());

        tracing::info!(
            source = %label,
            pid = child.id(),
            width = info.width,
            height = info.height,
            format = %output_format,
            frame_rate = %frame_rate,
            seek_us = config.seek_point_us,
            "Movie source opened"
        );

        Ok(Self {
            label,
            info,
            frame_rate,
            seek_point_us: config.seek_point_us,
            frame_size: output_format.frame_size(info.width, info.height),
            frames_read: 0,
            child,
            stdout: Some(BufReader::new(stdout)),
            stderr_task: Some(stderr_task),
        })
    }

    fn frame_pts(&self, index: i64) -> VidlayResult<i64> {
        let offset = rescale(index, self.frame_rate.invert(), TIME_BASE_US)
            .ok_or_else(|| VidlayError::source(format!("Timestamp overflow at frame {index}")))?;
        self.seek_point_us
            .checked_add(offset)
            .ok_or_else(|| VidlayError::source(format!("Timestamp overflow at frame {index}")))
    }

    /// Reap the decoder once its output is drained.
    fn finish_decoder(&mut self) {
        self.stdout = None;
        let status = self.child.wait();
        let stderr_output = self
            .stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default();

        match status {
            Ok(status) if status.success() => {
                tracing::debug!(source = %self.label, frames = self.frames_read, "Decoder finished");
            }
            Ok(status) => tracing::warn!(
                source = %self.label,
                %status,
                stderr = stderr_output.trim(),
                "Decoder exited with failure"
            ),
            Err(err) => tracing::warn!(source = %self.label, error = %err, "Failed to wait on decoder"),
        }
    }
}

impl FrameSource for MovieSource {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn pull(&mut self) -> VidlayResult<Option<SharedFrame>> {
        let Some(reader) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buffer = vec![0u8; self.frame_size];
        match reader.read_exact(&mut buffer) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                self.finish_decoder();
                return Ok(None);
            }
            Err(err) => {
                return Err(VidlayError::source(format!(
                    "Failed reading frame {} from {}: {err}",
                    self.frames_read, self.label
                )))
            }
        }

        let pts = self.frame_pts(self.frames_read)?;
        self.frames_read += 1;
        let frame = Frame::from_packed_bytes(
            self.info.format,
            self.info.width,
            self.info.height,
            pts,
            &buffer,
        )?
        .with_sample_aspect_ratio(self.info.sample_aspect_ratio);

        tracing::trace!(source = %self.label, pts, "Decoded frame");
        Ok(Some(frame.into_shared()))
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for MovieSource {
    fn drop(&mut self) {
        if self.stdout.is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

impl std::fmt::Debug for MovieSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MovieSource")
            .field("label", &self.label)
            .field("info", &self.info)
            .field("frames_read", &self.frames_read)
            .finish_non_exhaustive()
    }
}

fn stream_info(probed: &ProbedStream, format: PixelFormat, frame_rate: Rational) -> StreamInfo {
    StreamInfo {
        sample_aspect_ratio: probed.sample_aspect_ratio,
        frame_rate: Some(frame_rate),
        ..StreamInfo::new(probed.width, probed.height, format)
    }
}

/// Arguments for decoding `config.path` to rawvideo on stdout.
fn decode_args(config: &MovieSourceConfig, format: PixelFormat, rate: Rational) -> Vec<String> {
    let mut args: Vec<String> = vec!["-nostdin".into(), "-v".into(), "error".into()];
    if let Some(name) = &config.format_name {
        args.extend(["-f".into(), name.clone()]);
    }
    if config.seek_point_us > 0 {
        args.extend([
            "-ss".into(),
            format!("{:.6}", config.seek_point_us as f64 / 1_000_000.0),
        ]);
    }
    args.extend([
        "-i".into(),
        config.path.display().to_string(),
        "-map".into(),
        "0:v:0".into(),
        "-an".into(),
        "-sn".into(),
        "-r".into(),
        format!("{}/{}", rate.num, rate.den),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        format.name().into(),
        "pipe:1".into(),
    ]);
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args_full() {
        let config = MovieSourceConfig::from_args("2500000:mp4:clips/intro.mp4").unwrap();
        assert_eq!(config.seek_point_us, 2_500_000);
        assert_eq!(config.format_name.as_deref(), Some("mp4"));
        assert_eq!(config.path, PathBuf::from("clips/intro.mp4"));
    }

    #[test]
    fn test_from_args_empty_format_means_auto() {
        let config = MovieSourceConfig::from_args("0::logo.mov").unwrap();
        assert_eq!(config.seek_point_us, 0);
        assert_eq!(config.format_name, None);
    }

    #[test]
    fn test_from_args_file_may_contain_colons() {
        let config = MovieSourceConfig::from_args("0::C:/media/a.mkv").unwrap();
        assert_eq!(config.path, PathBuf::from("C:/media/a.mkv"));
    }

    #[test]
    fn test_from_args_rejects_bad_input() {
        assert!(MovieSourceConfig::from_args("logo.mov").is_err());
        assert!(MovieSourceConfig::from_args("0:mp4").is_err());
        assert!(MovieSourceConfig::from_args("-5::a.mp4").is_err());
        assert!(MovieSourceConfig::from_args("abc::a.mp4").is_err());
        assert!(MovieSourceConfig::from_args("0:mp4:").is_err());
        assert!(MovieSourceConfig::from_args("0:averyveryverylongformat:a.mp4").is_err());
    }

    #[test]
    fn test_decode_args() {
        let config = MovieSourceConfig::from_args("1500000:matroska:in.mkv").unwrap();
        let args = decode_args(&config, PixelFormat::Yuva420p, Rational::new(30000, 1001));
        let joined = args.join(" ");
        assert!(joined.starts_with("-nostdin -v error -f matroska -ss 1.500000 -i in.mkv"));
        assert!(joined.contains("-r 30000/1001"));
        assert!(joined.ends_with("-f rawvideo -pix_fmt yuva420p pipe:1"));
    }

    #[test]
    fn test_decode_args_without_seek() {
        let config = MovieSourceConfig::new("a.mp4");
        let args = decode_args(&config, PixelFormat::Rgb24, Rational::new(25, 1));
        assert!(!args.iter().any(|a| a == "-ss"));
        assert!(!args.iter().any(|a| a == "matroska"));
    }

    #[test]
    fn test_open_missing_file() {
        let config = MovieSourceConfig::new("/no/such/file.mov");
        let err = MovieSource::open(&config, PixelFormat::Yuv420p, &FfmpegConfig::default())
            .unwrap_err();
        assert!(matches!(err, VidlayError::FileNotFound { .. }));
    }
}
