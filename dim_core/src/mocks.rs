//! Deterministic collaborators for tests and bench harnesses.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dim_traits::{
    AlgorithmChoice, AlgorithmFlags, AlgorithmOutcome, AlgorithmSelection, ColorFrame,
    DepthCameraParams, DepthFrame, DeviceError, DimensionEstimate, EngineSettings, FrameCallback,
    FrameEvent, FrameSource, RangeMeter, SubscriptionId, VolumeEngine,
};

use crate::debug_images::{DebugImageStore, DepthRender};
use crate::persist::ResultFileGuard;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frame source driven by the test: frames are delivered synchronously on
/// the calling thread to every current subscriber.
#[derive(Default)]
pub struct ManualFrameSource {
    subscribers: Mutex<Vec<(SubscriptionId, FrameCallback)>>,
    next_id: AtomicU64,
    params: DepthCameraParams,
}

impl ManualFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: FrameEvent) {
        let callbacks: Vec<FrameCallback> =
            lock(&self.subscribers).iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for cb in callbacks {
            cb(&event);
        }
    }

    pub fn push_color(&self, frame: ColorFrame) {
        self.push(FrameEvent::Color(Arc::new(frame)));
    }

    pub fn push_depth(&self, frame: DepthFrame) {
        self.push(FrameEvent::Depth(Arc::new(frame)));
    }

    /// One colour frame followed by one depth frame of a small valid scene.
    pub fn push_pair(&self) {
        self.push_color(test_color());
        self.push_depth(test_depth());
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

impl FrameSource for ManualFrameSource {
    fn subscribe(&self, callback: FrameCallback) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers).push((id, callback));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = lock(&self.subscribers);
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    fn depth_camera_params(&self) -> DepthCameraParams {
        self.params
    }
}

pub fn test_color() -> ColorFrame {
    ColorFrame::new(4, 4, 3, vec![90; 48])
}

pub fn test_depth() -> DepthFrame {
    DepthFrame::filled(4, 4, 1500)
}

/// Observed engine calls, shared between a `ScriptedEngine` and the test.
#[derive(Debug, Default)]
pub struct EngineLog {
    pub work_areas: Vec<EngineSettings>,
    pub selections: Vec<(Option<i16>, AlgorithmFlags)>,
    pub volumes: Vec<(Option<i16>, AlgorithmChoice)>,
    pub floor_depths: usize,
}

#[derive(Debug, Clone, Default)]
pub struct EngineCalls(Arc<Mutex<EngineLog>>);

impl EngineCalls {
    pub fn select_count(&self) -> usize {
        lock(&self.0).selections.len()
    }

    pub fn volume_count(&self) -> usize {
        lock(&self.0).volumes.len()
    }

    pub fn total(&self) -> usize {
        let log = lock(&self.0);
        log.selections.len() + log.volumes.len() + log.floor_depths
    }

    pub fn volume_algorithms(&self) -> Vec<AlgorithmChoice> {
        lock(&self.0).volumes.iter().map(|(_, a)| *a).collect()
    }

    pub fn laser_args(&self) -> Vec<Option<i16>> {
        lock(&self.0).volumes.iter().map(|(l, _)| *l).collect()
    }

    pub fn selection_flags(&self) -> Vec<AlgorithmFlags> {
        lock(&self.0).selections.iter().map(|(_, f)| *f).collect()
    }

    pub fn work_areas(&self) -> Vec<EngineSettings> {
        lock(&self.0).work_areas.clone()
    }
}

/// Engine returning scripted answers and recording every call.
///
/// Estimates are consumed in order; once exhausted the last one repeats.
pub struct ScriptedEngine {
    selection: AlgorithmOutcome,
    estimates: VecDeque<Option<DimensionEstimate>>,
    last: Option<DimensionEstimate>,
    floor_depth: i16,
    volume_error: Option<String>,
    calls: EngineCalls,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            selection: Ok(AlgorithmSelection {
                choice: AlgorithmChoice::DepthOnly,
                laser_used: false,
            }),
            estimates: VecDeque::new(),
            last: Some(DimensionEstimate::new(400, 300, 200)),
            floor_depth: 1805,
            volume_error: None,
            calls: EngineCalls::default(),
        }
    }

    pub fn with_selection(mut self, outcome: AlgorithmOutcome) -> Self {
        self.selection = outcome;
        self
    }

    pub fn with_estimates(mut self, estimates: impl IntoIterator<Item = Option<DimensionEstimate>>) -> Self {
        self.estimates = estimates.into_iter().collect();
        self
    }

    pub fn with_floor_depth(mut self, mm: i16) -> Self {
        self.floor_depth = mm;
        self
    }

    pub fn fail_volume_with(mut self, msg: &str) -> Self {
        self.volume_error = Some(msg.to_string());
        self
    }

    /// Handle for inspecting calls after the engine has been boxed.
    pub fn calls(&self) -> EngineCalls {
        self.calls.clone()
    }
}

impl VolumeEngine for ScriptedEngine {
    fn set_work_area(&mut self, settings: &EngineSettings) -> Result<(), DeviceError> {
        lock(&self.calls.0).work_areas.push(*settings);
        Ok(())
    }

    fn calculate_floor_depth(&mut self, _depth: &DepthFrame) -> Result<i16, DeviceError> {
        lock(&self.calls.0).floor_depths += 1;
        Ok(self.floor_depth)
    }

    fn select_algorithm(
        &mut self,
        _depth: &DepthFrame,
        _color: &ColorFrame,
        laser_mm: Option<i16>,
        flags: AlgorithmFlags,
    ) -> Result<AlgorithmOutcome, DeviceError> {
        lock(&self.calls.0).selections.push((laser_mm, flags));
        Ok(self.selection)
    }

    fn calculate_volume(
        &mut self,
        _depth: &DepthFrame,
        _color: &ColorFrame,
        laser_mm: Option<i16>,
        algorithm: AlgorithmChoice,
    ) -> Result<Option<DimensionEstimate>, DeviceError> {
        lock(&self.calls.0).volumes.push((laser_mm, algorithm));
        if let Some(msg) = &self.volume_error {
            return Err(msg.clone().into());
        }
        match self.estimates.pop_front() {
            Some(next) => {
                self.last = next;
                Ok(next)
            }
            None => Ok(self.last),
        }
    }
}

/// Engine whose every call panics.
pub struct PanickingEngine;

impl VolumeEngine for PanickingEngine {
    fn set_work_area(&mut self, _: &EngineSettings) -> Result<(), DeviceError> {
        Ok(())
    }

    fn calculate_floor_depth(&mut self, _: &DepthFrame) -> Result<i16, DeviceError> {
        panic!("native floor depth crashed")
    }

    fn select_algorithm(
        &mut self,
        _: &DepthFrame,
        _: &ColorFrame,
        _: Option<i16>,
        _: AlgorithmFlags,
    ) -> Result<AlgorithmOutcome, DeviceError> {
        panic!("native selection crashed")
    }

    fn calculate_volume(
        &mut self,
        _: &DepthFrame,
        _: &ColorFrame,
        _: Option<i16>,
        _: AlgorithmChoice,
    ) -> Result<Option<DimensionEstimate>, DeviceError> {
        panic!("native volume crashed")
    }
}

/// Range meter that always reports the same distance.
#[derive(Debug, Clone, Copy)]
pub struct FixedRangeMeter(pub i32);

impl RangeMeter for FixedRangeMeter {
    fn get_reading(&mut self) -> Result<i32, DeviceError> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FailingRangeMeter;

impl RangeMeter for FailingRangeMeter {
    fn get_reading(&mut self) -> Result<i32, DeviceError> {
        Err(Box::new(std::io::Error::other("range meter timeout")))
    }
}

/// Image store that only records the stems it was asked to save.
#[derive(Debug, Clone, Default)]
pub struct RecordingImageStore {
    saved: Arc<Mutex<Vec<String>>>,
}

impl RecordingImageStore {
    pub fn saved(&self) -> Vec<String> {
        lock(&self.saved).clone()
    }
}

impl DebugImageStore for RecordingImageStore {
    fn save(&mut self, stem: &str, _: &ColorFrame, _: &DepthFrame, _: DepthRender) -> eyre::Result<()> {
        lock(&self.saved).push(stem.to_string());
        Ok(())
    }
}

/// Result-file guard toggled by the test.
#[derive(Debug, Clone)]
pub struct FlagGuard(pub Arc<AtomicBool>);

impl FlagGuard {
    pub fn closed() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn set_closed(&self, closed: bool) {
        self.0.store(closed, Ordering::SeqCst);
    }
}

impl ResultFileGuard for FlagGuard {
    fn ensure_closed(&mut self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
