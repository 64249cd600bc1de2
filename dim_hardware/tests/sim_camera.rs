use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dim_hardware::{SimCameraOptions, SimScene, SimulatedFrameSource};
use dim_traits::{FrameEvent, FrameSource, MonotonicClock};

fn wait_for(mut cond: impl FnMut() -> bool, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

fn counting_source(emit_depth: bool) -> (SimulatedFrameSource, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let source = SimulatedFrameSource::spawn(
        SimScene::default(),
        SimCameraOptions {
            frame_rate_hz: 200,
            emit_depth,
            ..Default::default()
        },
        MonotonicClock::new(),
    );
    let colors = Arc::new(AtomicUsize::new(0));
    let depths = Arc::new(AtomicUsize::new(0));
    let (c, d) = (Arc::clone(&colors), Arc::clone(&depths));
    source.subscribe(Arc::new(move |ev: &FrameEvent| match ev {
        FrameEvent::Color(_) => {
            c.fetch_add(1, Ordering::SeqCst);
        }
        FrameEvent::Depth(_) => {
            d.fetch_add(1, Ordering::SeqCst);
        }
    }));
    (source, colors, depths)
}

#[test]
fn subscribers_receive_both_frame_kinds() {
    let (_source, colors, depths) = counting_source(true);
    assert!(wait_for(
        || colors.load(Ordering::SeqCst) >= 3 && depths.load(Ordering::SeqCst) >= 3,
        Duration::from_secs(2)
    ));
}

#[test]
fn depth_can_be_suppressed() {
    let (_source, colors, depths) = counting_source(false);
    assert!(wait_for(|| colors.load(Ordering::SeqCst) >= 3, Duration::from_secs(2)));
    assert_eq!(depths.load(Ordering::SeqCst), 0);
}

#[test]
fn no_callbacks_after_unsubscribe() {
    let source = SimulatedFrameSource::spawn(
        SimScene::default(),
        SimCameraOptions {
            frame_rate_hz: 500,
            ..Default::default()
        },
        MonotonicClock::new(),
    );
    let seen = Arc::new(AtomicUsize::new(0));
    let s = Arc::clone(&seen);
    let id = source.subscribe(Arc::new(move |_: &FrameEvent| {
        s.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(wait_for(|| seen.load(Ordering::SeqCst) > 0, Duration::from_secs(2)));
    assert!(source.unsubscribe(id));
    assert!(!source.unsubscribe(id));
    let after = seen.load(Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(seen.load(Ordering::SeqCst), after);
    assert_eq!(source.subscriber_count(), 0);
}

#[test]
fn drop_joins_camera_thread() {
    let (source, _, _) = counting_source(true);
    let start = Instant::now();
    drop(source);
    assert!(start.elapsed() < Duration::from_secs(1));
}
