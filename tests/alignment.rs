//! Frame sampling and alignment integration tests.

mod common;

use common::{MemorySink, MockTelemetry, MockVideo, assert_reading_eq, gps_payload};
use gpsframes::{
    ExtractOptions, ExtractorError, FrameSampler, SkippedFramePolicy, TelemetrySeries, align,
    telemetry,
};

#[test]
fn two_hertz_over_one_second() {
    // Two readings a second apart in one payload.
    let mut source = MockTelemetry::new().with_payload(
        gps_payload(&[[10.0, 20.0, 0.0, 0.0, 0.0], [12.0, 20.0, 0.0, 0.0, 0.0]]),
        0.0,
        2.0,
    );
    let series = telemetry::extract(&mut source).expect("extraction succeeds");

    let options = ExtractOptions::new().with_frame_rate(2.0);
    let mut sampler = FrameSampler::new(MockVideo::new(30, 30.0), &options).expect("sampler");
    let mut sink = MemorySink::default();

    let aligned =
        align::align(&series, &mut sampler, &mut sink, 0, &options).expect("alignment succeeds");

    assert_eq!(aligned.frame_count, 2);
    assert_eq!(sink.names(), vec!["000000.jpg", "000001.jpg"]);

    let [first, second] = aligned.records.as_slice() else {
        panic!("expected two records, got {:?}", aligned.records);
    };
    assert!((first.timestamp - 0.0).abs() < 1e-9);
    assert!((second.timestamp - 0.5).abs() < 1e-9);
    assert_reading_eq(first.gps, [10.0, 20.0, 0.0, 0.0, 0.0]);
    assert_reading_eq(second.gps, [11.0, 20.0, 0.0, 0.0, 0.0]);
}

#[test]
fn past_the_end_is_out_of_bounds() {
    let options = ExtractOptions::new();
    let mut sampler = FrameSampler::new(MockVideo::new(30, 30.0), &options).expect("sampler");
    assert!((sampler.duration() - 1.0).abs() < 1e-12);

    for timestamp in [1.0, 1.5, 60.0] {
        match sampler.get_frame(timestamp, 7) {
            Err(ExtractorError::OutOfBounds { duration, .. }) => {
                assert!((duration - 1.0).abs() < 1e-12)
            }
            other => panic!("expected OutOfBounds at {timestamp}s, got {other:?}"),
        }
    }
}

#[test]
fn sampler_reports_real_capture_time() {
    // 25 fps: a request at 0.33s lands on frame 8, captured at 0.32s.
    let options = ExtractOptions::new().with_image_extension(".PNG");
    let mut sampler = FrameSampler::new(MockVideo::new(50, 25.0), &options).expect("sampler");

    let frame = sampler.get_frame(0.33, 41).expect("frame decodes");
    assert!((frame.timestamp - 0.32).abs() < 1e-9);
    assert_eq!(frame.name, "000041.png");
    assert_eq!((frame.image.width(), frame.image.height()), (2, 2));
}

#[test]
fn retries_are_exhausted_before_skipping() {
    let options = ExtractOptions::new().with_max_decode_retries(3);
    let video = MockVideo::new(10, 10.0).with_unreadable(0);
    let mut sampler = FrameSampler::new(video, &options).expect("sampler");

    match sampler.get_frame(0.0, 0) {
        Err(ExtractorError::SkippedFrame { attempts, .. }) => assert_eq!(attempts, 4),
        other => panic!("expected SkippedFrame, got {other:?}"),
    }
    assert_eq!(sampler.into_inner().reads, 4);
}

#[test]
fn unreadable_frame_aborts_by_default() {
    let options = ExtractOptions::new().with_frame_rate(10.0);
    let video = MockVideo::new(10, 10.0).with_unreadable(3);
    let mut sampler = FrameSampler::new(video, &options).expect("sampler");
    let mut sink = MemorySink::default();

    let result = align::align(
        &TelemetrySeries::new(),
        &mut sampler,
        &mut sink,
        0,
        &options,
    );
    assert!(matches!(result, Err(ExtractorError::SkippedFrame { .. })));
}

#[test]
fn skip_policy_keeps_names_contiguous() {
    let options = ExtractOptions::new()
        .with_frame_rate(10.0)
        .with_max_decode_retries(2)
        .with_skipped_frame_policy(SkippedFramePolicy::Skip);
    let video = MockVideo::new(10, 10.0).with_unreadable(3);
    let mut sampler = FrameSampler::new(video, &options).expect("sampler");
    let mut sink = MemorySink::default();

    let aligned = align::align(
        &TelemetrySeries::new(),
        &mut sampler,
        &mut sink,
        100,
        &options,
    )
    .expect("skip policy continues");

    assert_eq!(aligned.frame_count, 9);
    let expected: Vec<String> = (100..109).map(|index| format!("{index:06}.jpg")).collect();
    let names: Vec<&str> = aligned.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, expected);
    // The frame captured at 0.3s is missing.
    assert!(
        aligned
            .records
            .iter()
            .all(|record| (record.timestamp - 0.3).abs() > 1e-9)
    );
}

#[test]
fn no_telemetry_gives_zero_readings() {
    let options = ExtractOptions::new();
    let mut sampler = FrameSampler::new(MockVideo::new(60, 30.0), &options).expect("sampler");
    let mut sink = MemorySink::default();

    let aligned = align::align(
        &TelemetrySeries::new(),
        &mut sampler,
        &mut sink,
        0,
        &options,
    )
    .expect("alignment succeeds");

    assert_eq!(aligned.frame_count, 2);
    assert!(aligned.records.iter().all(|record| record.gps == [0.0; 5]));
}

#[test]
fn invalid_frame_rate_is_rejected_before_sampling() {
    let options = ExtractOptions::new().with_frame_rate(0.0);
    let video = MockVideo::new(30, 30.0);
    let mut sampler = FrameSampler::new(video, &options).expect("sampler");
    let mut sink = MemorySink::default();

    let result = align::align(
        &TelemetrySeries::new(),
        &mut sampler,
        &mut sink,
        0,
        &options,
    );
    assert!(
        matches!(result, Err(ExtractorError::InvalidFrameRate(_))),
        "expected InvalidFrameRate, got {result:?}"
    );
    assert!(sink.names().is_empty());
    assert_eq!(sampler.into_inner().reads, 0);
}

#[test]
fn non_positive_fps_is_invalid_structure() {
    let options = ExtractOptions::new();
    let result = FrameSampler::new(MockVideo::new(10, 0.0), &options);
    assert!(matches!(result, Err(ExtractorError::InvalidStructure(_))));
}
