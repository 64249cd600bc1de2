//! Lock-guarded access to the native volume engine.
//!
//! Every call takes the one engine lock, so at most one native call runs at a
//! time even when several handles exist. Frames are only borrowed for the
//! duration of the call. Panics raised inside the engine are caught here and
//! surface as `CoreError::Engine`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use dim_traits::{
    AlgorithmChoice, AlgorithmFlags, AlgorithmOutcome, ColorFrame, DepthFrame, DeviceError,
    DimensionEstimate, EngineSettings, VolumeEngine,
};

use crate::error::CoreError;
use crate::hw_error::map_engine_error;

#[derive(Clone)]
pub struct EngineBinding {
    inner: Arc<Mutex<Box<dyn VolumeEngine>>>,
}

impl std::fmt::Debug for EngineBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBinding").finish_non_exhaustive()
    }
}

impl EngineBinding {
    pub fn new(engine: Box<dyn VolumeEngine>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Share an engine that other components also call into.
    pub fn from_shared(inner: Arc<Mutex<Box<dyn VolumeEngine>>>) -> Self {
        Self { inner }
    }

    fn call<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Box<dyn VolumeEngine>) -> Result<T, DeviceError>,
    ) -> Result<T, CoreError> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let engine = &mut *guard;
        match catch_unwind(AssertUnwindSafe(|| f(engine))) {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => {
                let err = map_engine_error(e.as_ref());
                tracing::warn!(op, error = %err, "volume engine call failed");
                Err(err)
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                tracing::error!(op, panic = %msg, "volume engine panicked");
                Err(CoreError::Engine(format!("{op} panicked: {msg}")))
            }
        }
    }

    pub fn set_work_area(&self, settings: &EngineSettings) -> Result<(), CoreError> {
        self.call("set_work_area", |e| e.set_work_area(settings))
    }

    pub fn calculate_floor_depth(&self, depth: &DepthFrame) -> Result<i16, CoreError> {
        self.call("calculate_floor_depth", |e| e.calculate_floor_depth(depth))
    }

    pub fn select_algorithm(
        &self,
        depth: &DepthFrame,
        color: &ColorFrame,
        laser_mm: Option<i16>,
        flags: AlgorithmFlags,
    ) -> Result<AlgorithmOutcome, CoreError> {
        self.call("select_algorithm", |e| {
            e.select_algorithm(depth, color, laser_mm, flags)
        })
    }

    pub fn calculate_volume(
        &self,
        depth: &DepthFrame,
        color: &ColorFrame,
        laser_mm: Option<i16>,
        algorithm: AlgorithmChoice,
    ) -> Result<Option<DimensionEstimate>, CoreError> {
        self.call("calculate_volume", |e| {
            e.calculate_volume(depth, color, laser_mm, algorithm)
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
