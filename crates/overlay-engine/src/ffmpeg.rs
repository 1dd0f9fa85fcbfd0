//! Helpers for the external `ffmpeg` / `ffprobe` binaries.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use vidlay_common::error::{VidlayError, VidlayResult};
use vidlay_frame_model::Rational;

/// Whether `binary` can be found on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// First line of `<binary> -version`.
pub fn tool_version(binary: &str) -> Option<String> {
    let output = Command::new(binary).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let raw = String::from_utf8(output.stdout).ok()?;
    raw.lines().next().map(|line| line.trim().to_string())
}

/// Facts about the first video stream of a media file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbedStream {
    pub width: u32,
    pub height: u32,
    /// Native pixel format name, as reported by ffprobe.
    pub pix_fmt: Option<String>,
    pub frame_rate: Option<Rational>,
    pub sample_aspect_ratio: Rational,
    pub container: Option<String>,
    pub start_time_secs: Option<f64>,
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_aspect_ratio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    start_time: Option<String>,
    duration: Option<String>,
}

/// Run ffprobe on `path` and describe its first video stream.
pub fn probe_video_stream(
    ffprobe_bin: &str,
    path: &Path,
    format_name: Option<&str>,
) -> VidlayResult<ProbedStream> {
    if !path.exists() {
        return Err(VidlayError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut cmd = Command::new(ffprobe_bin);
    cmd.args(["-v", "error", "-select_streams", "v:0"])
        .args([
            "-show_entries",
            "stream=codec_type,width,height,pix_fmt,r_frame_rate,avg_frame_rate,sample_aspect_ratio:format=format_name,start_time,duration",
            "-of",
            "json",
        ]);
    if let Some(format) = format_name {
        cmd.args(["-f", format]);
    }
    cmd.arg(path);

    tracing::debug!(path = %path.display(), ?format_name, "Probing media");
    let output = cmd
        .output()
        .map_err(|e| VidlayError::source(format!("Failed to run {ffprobe_bin}: {e}")))?;
    if !output.status.success() {
        return Err(VidlayError::source(format!(
            "{ffprobe_bin} failed on {} (status {}): {}",
            path.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let json = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&json).map_err(|e| match e {
        VidlayError::Source { message } => {
            VidlayError::source(format!("{}: {message}", path.display()))
        }
        other => other,
    })
}

/// Interpret ffprobe's JSON output.
pub fn parse_probe_output(json: &str) -> VidlayResult<ProbedStream> {
    let probe: ProbeOutput = serde_json::from_str(json)?;

    let stream = probe
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref().unwrap_or("video") == "video")
        .ok_or_else(|| VidlayError::source("no video stream found"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(VidlayError::source("video stream has no dimensions")),
    };

    let frame_rate = [&stream.r_frame_rate, &stream.avg_frame_rate]
        .into_iter()
        .flatten()
        .filter_map(|text| Rational::parse(text))
        .find(|rate| rate.num > 0 && rate.den > 0);

    let sample_aspect_ratio = stream
        .sample_aspect_ratio
        .as_deref()
        .and_then(Rational::parse)
        .filter(|sar| sar.num > 0 && sar.den > 0)
        .unwrap_or_default();

    let format = probe.format;
    let parse_secs = |value: &Option<String>| value.as_deref().and_then(|v| v.parse::<f64>().ok());

    Ok(ProbedStream {
        width,
        height,
        pix_fmt: stream.pix_fmt,
        frame_rate,
        sample_aspect_ratio,
        container: format.as_ref().and_then(|f| f.format_name.clone()),
        start_time_secs: format.as_ref().and_then(|f| parse_secs(&f.start_time)),
        duration_secs: format.as_ref().and_then(|f| parse_secs(&f.duration)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "programs": [],
            "streams": [{
                "codec_type": "video",
                "width": 1280,
                "height": 720,
                "pix_fmt": "yuv420p",
                "r_frame_rate": "30000/1001",
                "avg_frame_rate": "0/0",
                "sample_aspect_ratio": "1:1"
            }],
            "format": {
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "start_time": "0.000000",
                "duration": "12.345000"
            }
        }"#;
        let probed = parse_probe_output(json).unwrap();
        assert_eq!((probed.width, probed.height), (1280, 720));
        assert_eq!(probed.frame_rate, Some(Rational::new(30000, 1001)));
        assert_eq!(probed.sample_aspect_ratio, Rational::new(1, 1));
        assert_eq!(probed.pix_fmt.as_deref(), Some("yuv420p"));
        assert_eq!(probed.duration_secs, Some(12.345));
    }

    #[test]
    fn test_unknown_rates_and_aspect_fall_back() {
        let json = r#"{"streams":[{"width":64,"height":64,"r_frame_rate":"0/0","sample_aspect_ratio":"0:1"}]}"#;
        let probed = parse_probe_output(json).unwrap();
        assert_eq!(probed.frame_rate, None);
        assert_eq!(probed.sample_aspect_ratio, Rational::one());
        assert_eq!(probed.container, None);
    }

    #[test]
    fn test_missing_video_stream() {
        let err = parse_probe_output(r#"{"streams":[]}"#).unwrap_err();
        assert!(err.to_string().contains("no video stream"));

        let err = parse_probe_output(r#"{"streams":[{"codec_type":"audio"}]}"#).unwrap_err();
        assert!(err.to_string().contains("no video stream"));
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = probe_video_stream("ffprobe", Path::new("/definitely/not/here.mkv"), None)
            .unwrap_err();
        assert!(matches!(err, VidlayError::FileNotFound { .. }));
    }
}
