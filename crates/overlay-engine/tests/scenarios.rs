use proptest::prelude::*;

use vidlay_frame_model::{Frame, PixelFormat, Rational};
use vidlay_overlay_engine::{
    BoxedSource, ConstantRateWriter, MemorySource, OverlayConfig, OverlayStage, RawFrameWriter,
    StageStats, VideoFilter,
};

const SIZE: u32 = 4;

fn base_frames(pts: &[i64]) -> Vec<Frame> {
    pts.iter()
        .map(|&p| {
            let mut frame = Frame::alloc(PixelFormat::Yuv420p, SIZE, SIZE).with_pts(p);
            frame.fill_plane(0, 200);
            frame.fill_plane(1, 60);
            frame.fill_plane(2, 70);
            frame
        })
        .collect()
}

/// Opaque overlay frames whose luma encodes their position in the stream.
fn overlay_frames(pts: &[i64]) -> Vec<Frame> {
    pts.iter()
        .enumerate()
        .map(|(k, &p)| {
            let mut frame = Frame::alloc(PixelFormat::Yuva420p, SIZE, SIZE).with_pts(p);
            frame.fill_plane(0, 40u8.wrapping_add(20u8.wrapping_mul(k as u8)));
            frame.fill_plane(1, 100);
            frame.fill_plane(2, 120);
            frame.fill_plane(3, 255);
            frame
        })
        .collect()
}

fn boxed(label: &str, frames: Vec<Frame>) -> BoxedSource {
    Box::new(MemorySource::new(label, frames).expect("non-empty source"))
}

fn stage(base_pts: &[i64], overlay_pts: &[i64]) -> OverlayStage {
    OverlayStage::new(
        &OverlayConfig::default(),
        boxed("main", base_frames(base_pts)),
        boxed("overlay", overlay_frames(overlay_pts)),
    )
    .expect("stage should configure")
}

fn luma(frame: &Frame) -> u8 {
    frame.plane(0).row(0)[0]
}

#[test]
fn opaque_overlay_replaces_base() {
    let overlay = overlay_frames(&[0, 10, 20]);
    let outputs: Vec<Frame> = stage(&[0, 10, 20], &[0, 10, 20]).collect();

    assert_eq!(outputs.len(), 3);
    for (k, out) in outputs.iter().enumerate() {
        assert_eq!(out.pts, k as i64 * 10);
        for i in 0..3 {
            assert_eq!(out.plane(i).data, overlay[k].plane(i).data, "plane {i} of frame {k}");
        }
    }
}

#[test]
fn overlay_frame_is_reused_until_replaced() {
    let mut stage = stage(&[0, 10, 20, 30], &[0, 30]);
    let outputs: Vec<Frame> = stage.by_ref().collect();

    let pts: Vec<i64> = outputs.iter().map(|f| f.pts).collect();
    assert_eq!(pts, vec![0, 10, 20, 30]);

    // Overlay frame 0 has luma 40, overlay frame 1 has luma 60.
    let lumas: Vec<u8> = outputs.iter().map(luma).collect();
    assert_eq!(lumas, vec![40, 40, 40, 60]);

    assert_eq!(
        stage.stats(),
        StageStats {
            frames_produced: 4,
            base_reused: 0,
            overlay_reused: 2,
        }
    );
}

#[test]
fn equal_timestamps_advance_both_inputs() {
    let outputs: Vec<Frame> = stage(&[0, 5, 10], &[0, 5, 10]).collect();
    let lumas: Vec<u8> = outputs.iter().map(luma).collect();
    assert_eq!(lumas, vec![40, 60, 80]);
}

#[test]
fn longer_overlay_keeps_last_base() {
    let mut stage = stage(&[0], &[0, 10, 20]);
    let outputs: Vec<Frame> = stage.by_ref().collect();

    let pts: Vec<i64> = outputs.iter().map(|f| f.pts).collect();
    assert_eq!(pts, vec![0, 10, 20]);
    assert_eq!(stage.stats().base_reused, 2);
}

#[test]
fn shorter_overlay_sticks_to_its_last_frame() {
    let outputs: Vec<Frame> = stage(&[0, 10, 20], &[0]).collect();
    assert_eq!(outputs.len(), 3);
    assert!(outputs.iter().all(|f| luma(f) == 40));
}

#[test]
fn end_of_stream_is_terminal() {
    let mut stage = stage(&[0, 10], &[0]);
    assert!(stage.produce_next().is_some());
    assert!(stage.produce_next().is_some());
    assert!(stage.produce_next().is_none());
    assert!(stage.is_finished());
    for _ in 0..5 {
        assert!(stage.produce_next().is_none());
    }
    assert_eq!(stage.stats().frames_produced, 2);
}

#[test]
fn failing_input_ends_like_a_drained_one() {
    let main = MemorySource::new("main", base_frames(&[0, 10])).unwrap().failing_after();
    let overlay = MemorySource::new("overlay", overlay_frames(&[0])).unwrap().failing_after();
    let mut stage =
        OverlayStage::new(&OverlayConfig::default(), Box::new(main), Box::new(overlay)).unwrap();

    assert_eq!(stage.by_ref().count(), 2);
    assert!(stage.produce_next().is_none());
}

#[test]
fn input_without_frames_produces_nothing() {
    let info = vidlay_overlay_engine::StreamInfo::new(SIZE, SIZE, PixelFormat::Yuva420p);
    let overlay = MemorySource::with_info("overlay", info, Vec::new());
    let mut stage = OverlayStage::new(
        &OverlayConfig::default(),
        boxed("main", base_frames(&[0, 10])),
        Box::new(overlay),
    )
    .unwrap();

    assert!(stage.produce_next().is_none());
    assert!(stage.produce_next().is_none());
}

#[test]
fn output_keeps_base_geometry_and_aspect() {
    let main: Vec<Frame> = base_frames(&[0])
        .into_iter()
        .map(|f| f.with_sample_aspect_ratio(Rational::new(4, 3)))
        .collect();
    let mut stage = OverlayStage::new(
        &OverlayConfig::new("main_w-overlay_w", "main_h-overlay_h").unwrap(),
        boxed("main", main),
        boxed("overlay", overlay_frames(&[0])),
    )
    .unwrap();

    let info = stage.output_info();
    let out = stage.produce_next().unwrap();
    assert_eq!((out.width, out.height, out.format), (info.width, info.height, info.format));
    assert_eq!(out.sample_aspect_ratio, Rational::new(4, 3));
}

#[test]
fn mixed_rate_inputs_encode_at_the_main_rate() {
    let main_pts: Vec<i64> = (0..25).map(|n| n * 40_000).collect();
    let overlay_pts: Vec<i64> = (0..30).map(|n| n * 1_000_000 / 30).collect();
    let mut stage = stage(&main_pts, &overlay_pts);

    let info = stage.output_info();
    let mut writer =
        ConstantRateWriter::new(RawFrameWriter::new(Vec::new(), info), Rational::new(25, 1));
    let mut produced = 0;
    while let Some(frame) = stage.produce_next() {
        writer.write_frame(frame).unwrap();
        produced += 1;
    }

    // One output per distinct timestamp, but one second of video at 25 fps.
    assert_eq!(produced, 50);
    assert_eq!(writer.frames_written(), 25);
    let bytes = writer.into_inner().into_inner();
    assert_eq!(bytes.len(), 25 * info.format.frame_size(info.width, info.height));
}

proptest! {
    #[test]
    fn outputs_carry_max_of_paired_timestamps(
        base_steps in prop::collection::vec(1i64..50, 1..12),
        overlay_steps in prop::collection::vec(1i64..50, 1..12),
    ) {
        let running = |steps: &[i64]| -> Vec<i64> {
            steps.iter().scan(0i64, |acc, s| { let pts = *acc; *acc += s; Some(pts) }).collect()
        };
        let base_pts = running(&base_steps);
        let overlay_pts = running(&overlay_steps);

        let mut stage = stage(&base_pts, &overlay_pts);
        let outputs: Vec<i64> = stage.by_ref().map(|f| f.pts).collect();

        prop_assert!(!outputs.is_empty());
        prop_assert!(outputs.windows(2).all(|w| w[0] <= w[1]));
        let last_base = *base_pts.last().unwrap();
        let last_overlay = *overlay_pts.last().unwrap();
        prop_assert_eq!(*outputs.last().unwrap(), last_base.max(last_overlay));
        prop_assert!(outputs.len() <= base_pts.len() + overlay_pts.len() - 1);
        prop_assert!(stage.produce_next().is_none());
    }
}
