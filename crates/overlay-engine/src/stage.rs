//! The overlay stage: synchronizer plus compositor behind a single
//! pull-driven call.

use vidlay_common::error::{VidlayError, VidlayResult};
use vidlay_compositing_core::{resolve_position, Compositor, PixelFormatStrategy};
use vidlay_frame_model::Frame;

use crate::source::{BoxedSource, StreamInfo};
use crate::synchronizer::{FrameSynchronizer, SyncOutcome};

/// Longest accepted position expression, in bytes.
pub const MAX_EXPR_LEN: usize = 255;

/// Static description of a filter, for registrars that list or wire
/// filters by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    /// Input pad names, in input-index order.
    pub inputs: &'static [&'static str],
    pub outputs: &'static [&'static str],
}

impl FilterDescriptor {
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }
}

/// A configured filter that produces frames on demand.
pub trait VideoFilter {
    fn descriptor(&self) -> &'static FilterDescriptor;

    /// Geometry and format of the produced frames.
    fn output_info(&self) -> StreamInfo;

    /// Produce the next output frame, or `None` at end of stream.
    fn produce_next(&mut self) -> Option<Frame>;
}

/// Overlay placement expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Horizontal offset over `main_w`, `main_h`, `overlay_w`, `overlay_h`.
    pub x_expr: String,
    /// Vertical offset, same variables.
    pub y_expr: String,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            x_expr: "0".to_string(),
            y_expr: "0".to_string(),
        }
    }
}

impl OverlayConfig {
    pub fn new(x_expr: impl Into<String>, y_expr: impl Into<String>) -> VidlayResult<Self> {
        let config = Self {
            x_expr: x_expr.into(),
            y_expr: y_expr.into(),
        };
        for expr in [&config.x_expr, &config.y_expr] {
            if expr.len() > MAX_EXPR_LEN {
                return Err(VidlayError::config(format!(
                    "position expression longer than {MAX_EXPR_LEN} bytes"
                )));
            }
        }
        Ok(config)
    }

    /// Parse the `X[:Y]` argument form. Missing or empty fields keep their
    /// `"0"` default.
    pub fn from_args(args: &str) -> VidlayResult<Self> {
        let mut fields = args.split(':');
        let mut pick = || {
            fields
                .next()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .unwrap_or("0")
                .to_string()
        };
        let (x, y) = (pick(), pick());
        if fields.next().is_some() {
            return Err(VidlayError::config(format!(
                "expected at most two ':'-separated fields in '{args}'"
            )));
        }
        Self::new(x, y)
    }
}

/// Counters kept while the stage runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    /// Output frames produced.
    pub frames_produced: u64,

    /// Outputs that reused the previous base frame.
    pub base_reused: u64,

    /// Outputs that reused the previous overlay frame.
    pub overlay_reused: u64,
}

/// Two-input overlay: composites the overlay stream onto the main stream
/// at a position fixed during construction.
pub struct OverlayStage {
    synchronizer: FrameSynchronizer,
    compositor: Compositor,
    output_info: StreamInfo,
    stats: StageStats,
    last_pts: Option<(i64, i64)>,
}

impl OverlayStage {
    pub const DESCRIPTOR: FilterDescriptor = FilterDescriptor {
        name: "overlay",
        description: "Overlay a video source on top of the input.",
        inputs: &["main", "overlay"],
        outputs: &["default"],
    };

    /// Configure the stage from both inputs' stream info.
    ///
    /// Fails on an unsupported format pair or a position expression that
    /// does not evaluate.
    pub fn new(
        config: &OverlayConfig,
        main: BoxedSource,
        overlay: BoxedSource,
    ) -> VidlayResult<Self> {
        let main_info = main.info();
        let overlay_info = overlay.info();

        let strategy = PixelFormatStrategy::negotiate(main_info.format, overlay_info.format)?;
        let position = resolve_position(
            &config.x_expr,
            &config.y_expr,
            main_info.width,
            main_info.height,
            overlay_info.width,
            overlay_info.height,
        )?;

        tracing::info!(
            main = main.label(),
            overlay = overlay.label(),
            width = main_info.width,
            height = main_info.height,
            main_format = %main_info.format,
            overlay_format = %overlay_info.format,
            "Configured overlay stage"
        );

        Ok(Self {
            synchronizer: FrameSynchronizer::new(main, overlay),
            compositor: Compositor::new(strategy, position),
            output_info: StreamInfo {
                format: strategy.output_format(),
                ..main_info
            },
            stats: StageStats::default(),
            last_pts: None,
        })
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn synchronizer(&self) -> &FrameSynchronizer {
        &self.synchronizer
    }

    pub fn stats(&self) -> StageStats {
        self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.synchronizer.is_finished()
    }

    /// Produce the next composited frame, or `None` once both inputs are
    /// drained. After the first `None` every call returns `None`.
    pub fn produce_next(&mut self) -> Option<Frame> {
        let pair = match self.synchronizer.advance() {
            SyncOutcome::Pair(pair) => pair,
            SyncOutcome::EndOfStream => return None,
        };

        let mut output = Frame::alloc(
            self.output_info.format,
            self.output_info.width,
            self.output_info.height,
        );
        self.compositor.compose_into(&mut output, &pair.base, &pair.overlay);

        if let Some((base_pts, overlay_pts)) = self.last_pts {
            if base_pts == pair.base.pts {
                self.stats.base_reused += 1;
            }
            if overlay_pts == pair.overlay.pts {
                self.stats.overlay_reused += 1;
            }
        }
        self.last_pts = Some((pair.base.pts, pair.overlay.pts));
        self.stats.frames_produced += 1;

        Some(output)
    }
}

impl VideoFilter for OverlayStage {
    fn descriptor(&self) -> &'static FilterDescriptor {
        &Self::DESCRIPTOR
    }

    fn output_info(&self) -> StreamInfo {
        self.output_info
    }

    fn produce_next(&mut self) -> Option<Frame> {
        OverlayStage::produce_next(self)
    }
}

impl Iterator for OverlayStage {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.produce_next()
    }
}

impl std::fmt::Debug for OverlayStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayStage")
            .field("compositor", &self.compositor)
            .field("output_info", &self.output_info)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use vidlay_compositing_core::OverlayPosition;
    use vidlay_frame_model::PixelFormat;

    fn memory(label: &str, format: PixelFormat, w: u32, h: u32) -> BoxedSource {
        Box::new(MemorySource::new(label, vec![Frame::alloc(format, w, h)]).unwrap())
    }

    #[test]
    fn test_args_parsing() {
        let config = OverlayConfig::from_args("main_w-overlay_w:10").unwrap();
        assert_eq!(config.x_expr, "main_w-overlay_w");
        assert_eq!(config.y_expr, "10");

        let config = OverlayConfig::from_args("5").unwrap();
        assert_eq!(config.y_expr, "0");

        assert_eq!(OverlayConfig::from_args("").unwrap(), OverlayConfig::default());
        assert!(OverlayConfig::from_args("1:2:3").is_err());
        assert!(OverlayConfig::from_args(&"9".repeat(MAX_EXPR_LEN + 1)).is_err());
    }

    #[test]
    fn test_position_is_resolved_at_construction() {
        let stage = OverlayStage::new(
            &OverlayConfig::new("main_w-overlay_w", "main_h/2").unwrap(),
            memory("main", PixelFormat::Yuv420p, 64, 48),
            memory("logo", PixelFormat::Yuva420p, 16, 8),
        )
        .unwrap();
        assert_eq!(stage.compositor().position(), OverlayPosition::new(48, 24));
        assert_eq!(stage.output_info().format, PixelFormat::Yuv420p);
        assert_eq!(stage.descriptor().name, "overlay");
        assert_eq!(stage.descriptor().input_count(), 2);
        assert_eq!(stage.descriptor().output_count(), 1);
    }

    #[test]
    fn test_bad_expression_fails_construction() {
        let err = OverlayStage::new(
            &OverlayConfig::new("main_w-logo_w", "0").unwrap(),
            memory("main", PixelFormat::Yuv420p, 64, 48),
            memory("logo", PixelFormat::Yuva420p, 16, 8),
        )
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("main_w-logo_w"));
    }

    #[test]
    fn test_unsupported_pair_fails_construction() {
        let err = OverlayStage::new(
            &OverlayConfig::default(),
            memory("main", PixelFormat::Yuv420p, 64, 48),
            memory("logo", PixelFormat::Bgra, 16, 8),
        )
        .unwrap_err();
        assert!(matches!(err, VidlayError::UnsupportedFormat { .. }));
    }
}
