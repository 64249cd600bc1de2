//! Sample collection: pairing, sample counts, watchdog, and failure paths.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as xch;
use dim_core::collector::{CalculationPlan, CollectorOutcome, Devices, SampleCollector};
use dim_core::engine::EngineBinding;
use dim_core::mocks::{
    EngineCalls, FailingRangeMeter, FixedRangeMeter, ManualFrameSource, RecordingImageStore,
    ScriptedEngine, test_color, test_depth,
};
use dim_core::CalculationStatus;
use dim_traits::{
    AlgorithmChoice, AlgorithmError, AlgorithmFlags, AlgorithmSelection, DepthFrame,
    DimensionEstimate, FrameEvent, RangeMeter,
};
use rstest::rstest;

struct Harness {
    frames: Arc<ManualFrameSource>,
    rx: xch::Receiver<FrameEvent>,
    devices: Devices,
    calls: EngineCalls,
    images: RecordingImageStore,
    collector: SampleCollector,
}

fn plan(n: usize, timeout: Duration) -> CalculationPlan {
    CalculationPlan {
        required_samples: n,
        barcode: "PKG".into(),
        calculation_index: 7,
        flags: AlgorithmFlags {
            depth_only: true,
            depth_perspective: true,
            color_aided: false,
        },
        floor_depth_mm: 1805,
        cutoff_depth_mm: 1790,
        range_meter_correction_mm: -100,
        sample_timeout: timeout,
    }
}

impl Harness {
    fn with(engine: ScriptedEngine, meter: Option<Box<dyn RangeMeter>>, plan: CalculationPlan) -> Self {
        let frames = Arc::new(ManualFrameSource::new());
        let calls = engine.calls();
        let images = RecordingImageStore::default();
        let devices = Devices {
            engine: EngineBinding::new(Box::new(engine)),
            range_meter: meter,
            images: Box::new(images.clone()),
        };
        let (tx, rx) = xch::unbounded();
        let collector = SampleCollector::start(
            plan,
            frames.clone(),
            Arc::new(move |ev: &FrameEvent| {
                let _ = tx.send(ev.clone());
            }),
        );
        Self {
            frames,
            rx,
            devices,
            calls,
            images,
            collector,
        }
    }

    fn new(engine: ScriptedEngine, n: usize) -> Self {
        Self::with(engine, None, plan(n, Duration::from_secs(5)))
    }

    fn drain(&mut self) -> Option<CollectorOutcome> {
        let mut out = None;
        for ev in self.rx.try_iter() {
            if let Some(o) = self.collector.on_frame(&ev, &mut self.devices) {
                assert!(out.is_none(), "collector finished twice");
                out = Some(o);
            }
        }
        out
    }

    fn pair(&mut self) -> Option<CollectorOutcome> {
        self.frames.push_pair();
        self.drain()
    }
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(5)]
fn completes_after_exactly_n_pairs(#[case] n: usize) {
    let mut h = Harness::new(ScriptedEngine::new(), n);
    for i in 1..n {
        assert!(h.pair().is_none(), "finished early at pair {i}");
    }
    let out = h.pair().expect("finished at pair n");
    assert_eq!(out.status, CalculationStatus::Successful);
    assert_eq!(out.accepted_samples, n);
    assert_eq!(out.dimensions, DimensionEstimate::new(400, 300, 200));
    assert_eq!(h.calls.volume_count(), n);

    // unsubscribed: more frames never reach the engine
    assert_eq!(h.frames.subscriber_count(), 0);
    assert!(h.pair().is_none());
    assert_eq!(h.calls.volume_count(), n);
}

#[test]
fn algorithm_is_fixed_by_first_sample() {
    let engine = ScriptedEngine::new().with_selection(Ok(AlgorithmSelection {
        choice: AlgorithmChoice::DepthPerspective,
        laser_used: true,
    }));
    let mut h = Harness::new(engine, 4);
    let mut out = None;
    for _ in 0..4 {
        // later frames differ; selection must not be repeated
        h.frames.push_color(test_color());
        h.frames.push_depth(DepthFrame::filled(4, 4, 900));
        out = h.drain().or(out);
    }
    let out = out.unwrap();
    assert_eq!(h.calls.select_count(), 1);
    assert_eq!(
        h.calls.volume_algorithms(),
        vec![AlgorithmChoice::DepthPerspective; 4]
    );
    let sel = out.selection.unwrap();
    assert_eq!(sel.choice, AlgorithmChoice::DepthPerspective);
    assert!(sel.laser_used);
}

#[test]
fn aggregates_with_mode() {
    let engine = ScriptedEngine::new().with_estimates([
        Some(DimensionEstimate::new(10, 5, 7)),
        Some(DimensionEstimate::new(10, 5, 8)),
        Some(DimensionEstimate::new(12, 5, 7)),
    ]);
    let mut h = Harness::new(engine, 3);
    h.pair();
    h.pair();
    let out = h.pair().unwrap();
    assert_eq!(out.dimensions, DimensionEstimate::new(10, 5, 7));
}

#[test]
fn only_the_latest_frame_of_each_kind_is_paired() {
    let mut h = Harness::new(ScriptedEngine::new(), 2);
    h.frames.push_color(test_color());
    h.frames.push_color(test_color());
    h.frames.push_color(test_color());
    assert!(h.drain().is_none());
    assert_eq!(h.calls.volume_count(), 0);
    h.frames.push_depth(test_depth());
    assert!(h.drain().is_none());
    assert_eq!(h.collector.accepted_samples(), 1);
    // a lone depth frame after the pair does not form a sample
    h.frames.push_depth(test_depth());
    assert!(h.drain().is_none());
    assert_eq!(h.collector.accepted_samples(), 1);
}

#[test]
fn watchdog_times_out_with_zero_dimensions() {
    let mut h = Harness::with(
        ScriptedEngine::new(),
        None,
        plan(3, Duration::from_millis(30)),
    );
    assert!(h.pair().is_none());
    let calls_before = h.calls.total();

    h.collector
        .watchdog()
        .recv_timeout(Duration::from_secs(2))
        .expect("watchdog fires");
    let out = h.collector.on_watchdog().unwrap();
    assert_eq!(out.status, CalculationStatus::TimedOut);
    assert_eq!(out.dimensions, DimensionEstimate::ZERO);
    assert_eq!(out.accepted_samples, 1);

    assert!(h.pair().is_none());
    assert_eq!(h.calls.total(), calls_before);
    assert!(h.collector.on_watchdog().is_none());
}

#[test]
fn watchdog_is_disarmed_after_finish() {
    let mut h = Harness::with(
        ScriptedEngine::new(),
        None,
        plan(1, Duration::from_millis(20)),
    );
    assert!(h.pair().is_some());
    assert!(
        h.collector
            .watchdog()
            .recv_timeout(Duration::from_millis(60))
            .is_err()
    );
}

#[rstest]
#[case(AlgorithmError::NoObjectFound, CalculationStatus::ObjectNotFound)]
#[case(AlgorithmError::DataInvalid, CalculationStatus::FailedToSelectAlgorithm)]
#[case(
    AlgorithmError::NoAlgorithmsAllowed,
    CalculationStatus::FailedToSelectAlgorithm
)]
fn selection_failure_aborts_immediately(
    #[case] reason: AlgorithmError,
    #[case] want: CalculationStatus,
) {
    let mut h = Harness::new(ScriptedEngine::new().with_selection(Err(reason)), 5);
    let out = h.pair().unwrap();
    assert_eq!(out.status, want);
    assert_eq!(out.dimensions, DimensionEstimate::ZERO);
    assert_eq!(out.selection, None);
    assert_eq!(h.calls.volume_count(), 0);
    assert_eq!(h.frames.subscriber_count(), 0);
}

#[test]
fn invalid_first_frame_fails_selection_without_engine() {
    let mut h = Harness::new(ScriptedEngine::new(), 2);
    h.frames.push_color(test_color());
    h.frames.push_depth(DepthFrame::new(4, 4, vec![1; 5]));
    let out = h.drain().unwrap();
    assert_eq!(out.status, CalculationStatus::FailedToSelectAlgorithm);
    assert_eq!(h.calls.select_count(), 0);
}

#[test]
fn debug_images_are_saved_once() {
    let mut h = Harness::new(ScriptedEngine::new(), 3);
    h.pair();
    h.pair();
    h.pair().unwrap();
    assert_eq!(h.images.saved(), vec!["PKG_7".to_string()]);
}

#[test]
fn debug_images_saved_even_when_no_object() {
    let engine = ScriptedEngine::new().with_selection(Err(AlgorithmError::NoObjectFound));
    let mut h = Harness::new(engine, 3);
    h.pair().unwrap();
    assert_eq!(h.images.saved().len(), 1);
}

#[rstest]
#[case(1000, Some(900))]
#[case(50, None)]
#[case(5000, None)]
fn laser_reading_is_corrected_and_bounded(#[case] raw: i32, #[case] want: Option<i16>) {
    let mut h = Harness::with(
        ScriptedEngine::new(),
        Some(Box::new(FixedRangeMeter(raw))),
        plan(2, Duration::from_secs(5)),
    );
    h.pair();
    h.pair().unwrap();
    assert_eq!(h.calls.laser_args(), vec![want, want]);
}

#[test]
fn failing_range_meter_falls_back_to_depth() {
    let mut h = Harness::with(
        ScriptedEngine::new(),
        Some(Box::new(FailingRangeMeter)),
        plan(1, Duration::from_secs(5)),
    );
    let out = h.pair().unwrap();
    assert_eq!(out.status, CalculationStatus::Successful);
    assert_eq!(h.calls.laser_args(), vec![None]);
}

#[test]
fn missing_estimates_still_count_as_samples() {
    let engine = ScriptedEngine::new().with_estimates([
        Some(DimensionEstimate::new(5, 5, 5)),
        None,
        Some(DimensionEstimate::new(5, 5, 5)),
    ]);
    let mut h = Harness::new(engine, 3);
    h.pair();
    h.pair();
    let out = h.pair().unwrap();
    assert_eq!(out.status, CalculationStatus::Successful);
    assert_eq!(out.dimensions, DimensionEstimate::new(5, 5, 5));
}

#[test]
fn no_estimates_at_all_is_error() {
    let engine = ScriptedEngine::new().with_estimates([None]);
    let mut h = Harness::new(engine, 2);
    h.pair();
    let out = h.pair().unwrap();
    assert_eq!(out.status, CalculationStatus::Error);
    assert_eq!(out.dimensions, DimensionEstimate::ZERO);
}

#[test]
fn engine_failure_aborts_with_error() {
    let mut h = Harness::new(ScriptedEngine::new().fail_volume_with("native fault"), 3);
    let out = h.pair().unwrap();
    assert_eq!(out.status, CalculationStatus::Error);
    assert_eq!(h.frames.subscriber_count(), 0);
}

#[test]
fn abort_is_reported_once() {
    let mut h = Harness::new(ScriptedEngine::new(), 3);
    h.pair();
    let out = h.collector.abort(CalculationStatus::AbortedByUser).unwrap();
    assert_eq!(out.status, CalculationStatus::AbortedByUser);
    assert_eq!(out.dimensions, DimensionEstimate::ZERO);
    assert!(h.collector.abort(CalculationStatus::AbortedByUser).is_none());
    assert!(h.collector.is_finished());
}

#[test]
fn drop_unsubscribes() {
    let h = Harness::new(ScriptedEngine::new(), 3);
    let frames = h.frames.clone();
    assert_eq!(frames.subscriber_count(), 1);
    drop(h);
    assert_eq!(frames.subscriber_count(), 0);
}

#[rstest]
#[case("PKG", "PKG_7")]
#[case("../../etc/passwd", "______etc_passwd_7")]
#[case("a\\b/c", "a_b_c_7")]
fn photo_stem_stays_inside_photos_dir(#[case] barcode: &str, #[case] want: &str) {
    let mut p = plan(1, Duration::from_secs(1));
    p.barcode = barcode.into();
    let stem = p.photo_stem();
    assert_eq!(stem, want);
    assert!(!stem.contains('/') && !stem.contains('\\') && !stem.contains(".."));
}
