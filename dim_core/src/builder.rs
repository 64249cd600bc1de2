//! Type-state builder for the `Orchestrator`.
//!
//! The builder enforces at compile time that a volume engine and a frame
//! source are provided before `spawn()` is available. `try_spawn()` is always
//! available for dynamic checks.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use dim_traits::clock::{Clock, MonotonicClock};
use dim_traits::{FrameSource, RangeMeter, VolumeEngine};

use crate::collector::Devices;
use crate::config::{AlgorithmSettings, Settings, Timeouts, WorkArea};
use crate::debug_images::{DebugImageStore, NoopDebugImageStore};
use crate::engine::EngineBinding;
use crate::error::{BuildError, Result};
use crate::orchestrator::{Orchestrator, Parts};
use crate::persist::{CalculationCounter, MemoryCounter, NoFileGuard, ResultFileGuard};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Orchestrator`. Settings are validated on spawn.
pub struct OrchestratorBuilder<E = Missing, F = Missing> {
    engine: Option<EngineBinding>,
    frames: Option<Arc<dyn FrameSource>>,
    range_meter: Option<Box<dyn RangeMeter>>,
    counter: Option<Box<dyn CalculationCounter>>,
    guard: Option<Box<dyn ResultFileGuard>>,
    images: Option<Box<dyn DebugImageStore>>,
    settings: Settings,
    clock: Option<Box<dyn Clock + Send>>,
    _e: PhantomData<E>,
    _f: PhantomData<F>,
}

impl Default for OrchestratorBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            engine: None,
            frames: None,
            range_meter: None,
            counter: None,
            guard: None,
            images: None,
            settings: Settings::default(),
            clock: None,
            _e: PhantomData,
            _f: PhantomData,
        }
    }
}

impl<E, F> OrchestratorBuilder<E, F> {
    /// Fallible spawn available in any type-state; returns a detailed error
    /// for missing pieces.
    pub fn try_spawn(self) -> Result<Orchestrator> {
        let engine = self
            .engine
            .ok_or_else(|| eyre::Report::new(BuildError::MissingEngine))?;
        let frames = self
            .frames
            .ok_or_else(|| eyre::Report::new(BuildError::MissingFrameSource))?;
        self.settings.check().map_err(eyre::Report::new)?;

        tracing::debug!(
            samples = self.settings.algorithm.sample_count,
            auto_start = self.settings.algorithm.enable_auto_timer,
            range_meter = self.range_meter.is_some(),
            "spawning orchestrator"
        );
        Orchestrator::spawn(Parts {
            settings: self.settings,
            devices: Devices {
                engine,
                range_meter: self.range_meter,
                images: self
                    .images
                    .unwrap_or_else(|| Box::new(NoopDebugImageStore)),
            },
            frames,
            counter: self
                .counter
                .unwrap_or_else(|| Box::new(MemoryCounter::default())),
            guard: self.guard.unwrap_or_else(|| Box::new(NoFileGuard)),
            clock: self.clock.unwrap_or_else(|| Box::new(MonotonicClock::new())),
        })
    }

    fn retype<E2, F2>(self) -> OrchestratorBuilder<E2, F2> {
        OrchestratorBuilder {
            engine: self.engine,
            frames: self.frames,
            range_meter: self.range_meter,
            counter: self.counter,
            guard: self.guard,
            images: self.images,
            settings: self.settings,
            clock: self.clock,
            _e: PhantomData,
            _f: PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<E, F> OrchestratorBuilder<E, F> {
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }
    pub fn with_work_area(mut self, work_area: WorkArea) -> Self {
        self.settings.work_area = work_area;
        self
    }
    pub fn with_algorithm(mut self, algorithm: AlgorithmSettings) -> Self {
        self.settings.algorithm = algorithm;
        self
    }
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.settings.timeouts = timeouts;
        self
    }
    pub fn with_range_meter(mut self, meter: impl RangeMeter + 'static) -> Self {
        self.range_meter = Some(Box::new(meter));
        self
    }
    pub fn with_counter(mut self, counter: impl CalculationCounter + 'static) -> Self {
        self.counter = Some(Box::new(counter));
        self
    }
    pub fn with_result_guard(mut self, guard: impl ResultFileGuard + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }
    pub fn with_debug_images(mut self, store: impl DebugImageStore + 'static) -> Self {
        self.images = Some(Box::new(store));
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: impl Clock + Send + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }
}

// Setters that advance type-state
impl<F> OrchestratorBuilder<Missing, F> {
    pub fn with_engine(mut self, engine: impl VolumeEngine + 'static) -> OrchestratorBuilder<Set, F> {
        self.engine = Some(EngineBinding::new(Box::new(engine)));
        self.retype()
    }

    /// Use an engine that is also called from elsewhere (e.g. floor depth
    /// calibration); calls stay serialized through the shared lock.
    pub fn with_shared_engine(
        mut self,
        engine: Arc<Mutex<Box<dyn VolumeEngine>>>,
    ) -> OrchestratorBuilder<Set, F> {
        self.engine = Some(EngineBinding::from_shared(engine));
        self.retype()
    }
}

impl<E> OrchestratorBuilder<E, Missing> {
    pub fn with_frame_source(mut self, frames: Arc<dyn FrameSource>) -> OrchestratorBuilder<E, Set> {
        self.frames = Some(frames);
        self.retype()
    }
}

impl OrchestratorBuilder<Set, Set> {
    /// Validate and spawn. Only available once engine and frame source are set.
    pub fn spawn(self) -> Result<Orchestrator> {
        self.try_spawn()
    }
}
