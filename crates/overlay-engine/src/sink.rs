//! Downstream consumers of composited frames.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use vidlay_common::config::FfmpegConfig;
use vidlay_common::error::{VidlayError, VidlayResult};
use vidlay_frame_model::{rescale, Frame, Rational, TIME_BASE_US};

use crate::source::StreamInfo;

/// Writes frames as tightly packed rawvideo to any [`Write`].
///
/// Every frame must match the geometry the writer was created with.
#[derive(Debug)]
pub struct RawFrameWriter<W: Write> {
    writer: W,
    info: StreamInfo,
    frames_written: u64,
}

impl<W: Write> RawFrameWriter<W> {
    pub fn new(writer: W, info: StreamInfo) -> Self {
        Self {
            writer,
            info,
            frames_written: 0,
        }
    }

    pub fn write_frame(&mut self, frame: &Frame) -> VidlayResult<()> {
        if frame.format != self.info.format
            || frame.width != self.info.width
            || frame.height != self.info.height
        {
            return Err(VidlayError::sink(format!(
                "Frame is {}x{} {}, sink expects {}x{} {}",
                frame.width,
                frame.height,
                frame.format,
                self.info.width,
                self.info.height,
                self.info.format
            )));
        }

        for (i, plane) in frame.planes.iter().enumerate() {
            let row_bytes = frame.format.row_bytes(i, frame.width);
            let (_, rows) = frame.plane_dimensions(i);
            for y in 0..rows as usize {
                self.writer.write_all(&plane.row(y)[..row_bytes])?;
            }
        }
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn flush(&mut self) -> VidlayResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Places timestamped frames on a constant-rate grid before writing them.
///
/// Output slot `n` starts at `n / frame_rate` seconds and a frame lands in
/// the slot nearest its pts. A frame whose slot was already written is
/// dropped; skipped slots repeat the latest frame received before them.
#[derive(Debug)]
pub struct ConstantRateWriter<W: Write> {
    inner: RawFrameWriter<W>,
    frame_rate: Rational,
    next_slot: Option<i64>,
    latest: Option<Frame>,
    dropped: u64,
    duplicated: u64,
}

impl<W: Write> ConstantRateWriter<W> {
    pub fn new(inner: RawFrameWriter<W>, frame_rate: Rational) -> Self {
        Self {
            inner,
            frame_rate,
            next_slot: None,
            latest: None,
            dropped: 0,
            duplicated: 0,
        }
    }

    pub fn write_frame(&mut self, frame: Frame) -> VidlayResult<()> {
        let slot = rescale(frame.pts, TIME_BASE_US, self.frame_rate.invert()).ok_or_else(|| {
            VidlayError::sink(format!(
                "pts {} cannot be placed at {} fps",
                frame.pts, self.frame_rate
            ))
        })?;
        let next = self.next_slot.unwrap_or(slot);

        if slot < next {
            tracing::trace!(pts = frame.pts, slot, "Dropping frame for an already written slot");
            self.dropped += 1;
        } else {
            if let Some(latest) = &self.latest {
                for _ in next..slot {
                    self.inner.write_frame(latest)?;
                    self.duplicated += 1;
                }
            }
            self.inner.write_frame(&frame)?;
            self.next_slot = Some(slot + 1);
        }

        self.latest = Some(frame);
        Ok(())
    }

    /// Frames emitted, repeats included.
    pub fn frames_written(&self) -> u64 {
        self.inner.frames_written()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn duplicated(&self) -> u64 {
        self.duplicated
    }

    pub fn flush(&mut self) -> VidlayResult<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> RawFrameWriter<W> {
        self.inner
    }
}

/// Encodes frames to a file by piping rawvideo into an `ffmpeg` child.
pub struct EncoderSink {
    output: PathBuf,
    writer: Option<ConstantRateWriter<BufWriter<ChildStdin>>>,
    child: Child,
    stderr_task: Option<JoinHandle<String>>,
}

impl EncoderSink {
    /// Start an encoder writing to `path`.
    ///
    /// The container and codec are picked by ffmpeg from the file extension.
    pub fn create(
        path: &Path,
        info: &StreamInfo,
        frame_rate: Rational,
        ffmpeg: &FfmpegConfig,
    ) -> VidlayResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let args = encode_args(path, info, frame_rate);
        tracing::debug!(bin = %ffmpeg.ffmpeg_bin, ?args, "Starting encoder");

        let mut child = Command::new(&ffmpeg.ffmpeg_bin)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VidlayError::sink(format!("Failed to start {}: {e}", ffmpeg.ffmpeg_bin)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| VidlayError::sink("Failed to capture ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VidlayError::sink("Failed to capture ffmpeg stderr"))?;

        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(
            output = %path.display(),
            pid = child.id(),
            width = info.width,
            height = info.height,
            format = %info.format,
            frame_rate = %frame_rate,
            "Encoder started"
        );

        Ok(Self {
            output: path.to_path_buf(),
            writer: Some(ConstantRateWriter::new(
                RawFrameWriter::new(BufWriter::new(stdin), *info),
                frame_rate,
            )),
            child,
            stderr_task: Some(stderr_task),
        })
    }

    /// Queue `frame` for encoding at the slot given by its pts.
    pub fn write_frame(&mut self, frame: Frame) -> VidlayResult<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| VidlayError::sink("Encoder already finished"))?;
        writer.write_frame(frame).map_err(|e| match e {
            VidlayError::Io(io) => VidlayError::sink(format!(
                "Failed writing frame to encoder for {}: {io}",
                self.output.display()
            )),
            other => other,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.writer.as_ref().map_or(0, ConstantRateWriter::frames_written)
    }

    /// Close the encoder's input and wait for it to exit.
    ///
    /// Returns the number of frames written.
    pub fn finish(mut self) -> VidlayResult<u64> {
        let frames = self.frames_written();
        let (mut dropped, mut duplicated) = (0, 0);
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            dropped = writer.dropped();
            duplicated = writer.duplicated();
            // Dropping stdin signals end of input.
            drop(writer.into_inner().into_inner());
        }

        let status = self
            .child
            .wait()
            .map_err(|e| VidlayError::sink(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = self
            .stderr_task
            .take()
            .map(|task| {
                task.join()
                    .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
            })
            .unwrap_or_default();

        if !status.success() {
            return Err(VidlayError::sink(format!(
                "ffmpeg exited with {status} while writing {}: {}",
                self.output.display(),
                stderr_output.trim()
            )));
        }

        tracing::info!(
            output = %self.output.display(),
            frames,
            dropped,
            duplicated,
            "Encoder finished"
        );
        Ok(frames)
    }
}

impl Drop for EncoderSink {
    fn drop(&mut self) {
        if self.stderr_task.is_some() {
            self.writer = None;
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

impl std::fmt::Debug for EncoderSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderSink")
            .field("output", &self.output)
            .field("frames_written", &self.frames_written())
            .finish_non_exhaustive()
    }
}

fn encode_args(path: &Path, info: &StreamInfo, frame_rate: Rational) -> Vec<String> {
    vec![
        "-y".into(),
        "-v".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        info.format.name().into(),
        "-s".into(),
        format!("{}x{}", info.width, info.height),
        "-framerate".into(),
        format!("{}/{}", frame_rate.num, frame_rate.den),
        "-i".into(),
        "pipe:0".into(),
        path.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidlay_frame_model::PixelFormat;

    #[test]
    fn test_raw_writer_emits_tight_rows() {
        let info = StreamInfo::new(3, 2, PixelFormat::Yuv420p);
        let mut frame = Frame::alloc(PixelFormat::Yuv420p, 3, 2);
        frame.fill_plane(0, 10);
        frame.fill_plane(1, 20);
        frame.fill_plane(2, 30);

        let mut writer = RawFrameWriter::new(Vec::new(), info);
        writer.write_frame(&frame).unwrap();
        writer.write_frame(&frame).unwrap();
        assert_eq!(writer.frames_written(), 2);

        let bytes = writer.into_inner();
        // 3x2 luma plus two 2x1 chroma planes.
        assert_eq!(bytes.len(), 2 * (6 + 2 + 2));
        assert_eq!(&bytes[..10], &[10, 10, 10, 10, 10, 10, 20, 20, 30, 30]);
        assert_eq!(bytes, [frame.to_packed_bytes(), frame.to_packed_bytes()].concat());
    }

    #[test]
    fn test_raw_writer_rejects_mismatched_frame() {
        let info = StreamInfo::new(4, 4, PixelFormat::Rgb24);
        let mut writer = RawFrameWriter::new(Vec::new(), info);

        let wrong_size = Frame::alloc(PixelFormat::Rgb24, 2, 2);
        assert!(matches!(
            writer.write_frame(&wrong_size),
            Err(VidlayError::Sink { .. })
        ));
        let wrong_format = Frame::alloc(PixelFormat::Rgba, 4, 4);
        assert!(writer.write_frame(&wrong_format).is_err());
        assert_eq!(writer.frames_written(), 0);
    }

    fn luma_frame(pts: i64, luma: u8) -> Frame {
        let mut frame = Frame::alloc(PixelFormat::Yuv420p, 2, 2).with_pts(pts);
        frame.fill_plane(0, luma);
        frame
    }

    fn lumas(bytes: &[u8]) -> Vec<u8> {
        // 2x2 luma, then two 1x1 chroma samples per frame.
        bytes.chunks(6).map(|frame| frame[0]).collect()
    }

    #[test]
    fn test_constant_rate_fills_gaps_and_drops_extras() {
        let info = StreamInfo::new(2, 2, PixelFormat::Yuv420p);
        let mut writer =
            ConstantRateWriter::new(RawFrameWriter::new(Vec::new(), info), Rational::new(25, 1));

        // Slots at 25 fps are 40ms apart.
        writer.write_frame(luma_frame(0, 1)).unwrap();
        writer.write_frame(luma_frame(10_000, 2)).unwrap();
        writer.write_frame(luma_frame(120_000, 3)).unwrap();
        writer.write_frame(luma_frame(160_000, 4)).unwrap();

        assert_eq!(writer.frames_written(), 5);
        assert_eq!(writer.dropped(), 1);
        assert_eq!(writer.duplicated(), 2);
        let bytes = writer.into_inner().into_inner();
        assert_eq!(lumas(&bytes), vec![1, 2, 2, 3, 4]);
    }

    #[test]
    fn test_constant_rate_merges_mixed_input_rates() {
        let info = StreamInfo::new(2, 2, PixelFormat::Yuv420p);
        let mut writer =
            ConstantRateWriter::new(RawFrameWriter::new(Vec::new(), info), Rational::new(25, 1));

        // Every distinct timestamp of a 25 fps and a 30 fps stream, one second each.
        let mut pts: Vec<i64> = (0..25)
            .map(|n| n * 40_000)
            .chain((0..30).map(|n| n * 1_000_000 / 30))
            .collect();
        pts.sort_unstable();
        pts.dedup();
        assert_eq!(pts.len(), 50);

        for &p in &pts {
            writer.write_frame(luma_frame(p, 0)).unwrap();
        }

        // 966_666us lands in slot 24, so slots 0..=24 are written once each.
        assert_eq!(writer.frames_written(), 25);
        assert_eq!(writer.dropped(), 25);
        assert_eq!(writer.duplicated(), 0);
    }

    #[test]
    fn test_encode_args() {
        let info = StreamInfo::new(640, 360, PixelFormat::Yuv420p);
        let args = encode_args(Path::new("out/result.mp4"), &info, Rational::new(30, 1));
        assert_eq!(
            args.join(" "),
            "-y -v error -f rawvideo -pix_fmt yuv420p -s 640x360 -framerate 30/1 -i pipe:0 out/result.mp4"
        );
    }
}
