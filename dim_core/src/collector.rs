//! Pairs colour and depth frames into samples and drives the engine.
//!
//! One `SampleCollector` lives for one calculation. It subscribes to the frame
//! source on start and unsubscribes before handing back its terminal outcome,
//! so no frame can reach the engine after the result is known. The per-sample
//! watchdog is a fresh `crossbeam_channel::after` receiver per accepted
//! sample; the owner selects on [`SampleCollector::watchdog`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use dim_traits::{
    AlgorithmFlags, AlgorithmSelection, ColorFrame, DepthFrame, DimensionEstimate, FrameCallback,
    FrameEvent, FrameSource, RangeMeter, SubscriptionId,
};

use crate::aggregate::aggregate;
use crate::debug_images::{DebugImageStore, DepthRender};
use crate::engine::EngineBinding;
use crate::selector::{failure_status, select_algorithm, usable_laser_distance};
use crate::status::CalculationStatus;

/// Parameters of one calculation.
#[derive(Debug, Clone)]
pub struct CalculationPlan {
    pub required_samples: usize,
    pub barcode: String,
    pub calculation_index: u64,
    pub flags: AlgorithmFlags,
    pub floor_depth_mm: i16,
    pub cutoff_depth_mm: i16,
    pub range_meter_correction_mm: i32,
    pub sample_timeout: Duration,
}

impl CalculationPlan {
    /// File stem for the debug images of this calculation.
    /// Path separators and `..` in the barcode are replaced.
    pub fn photo_stem(&self) -> String {
        let code: String = self
            .barcode
            .chars()
            .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
            .collect();
        let code = code.replace("..", "__");
        format!("{code}_{}", self.calculation_index)
    }
}

/// Collaborators the collector calls into while sampling.
pub struct Devices {
    pub engine: EngineBinding,
    pub range_meter: Option<Box<dyn RangeMeter>>,
    pub images: Box<dyn DebugImageStore>,
}

/// Terminal outcome of one collection run.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorOutcome {
    pub status: CalculationStatus,
    pub dimensions: DimensionEstimate,
    pub selection: Option<AlgorithmSelection>,
    pub accepted_samples: usize,
}

pub struct SampleCollector {
    plan: CalculationPlan,
    frames: Arc<dyn FrameSource>,
    subscription: Option<SubscriptionId>,
    render: DepthRender,
    latest_color: Option<Arc<ColorFrame>>,
    latest_depth: Option<Arc<DepthFrame>>,
    selection: Option<AlgorithmSelection>,
    laser_mm: Option<i16>,
    samples: Vec<DimensionEstimate>,
    accepted: usize,
    watchdog: xch::Receiver<Instant>,
    finished: bool,
}

impl SampleCollector {
    /// Subscribe to `frames` and arm the first watchdog.
    ///
    /// `forward` is installed as the frame callback; it should route events
    /// back to whoever owns this collector.
    pub fn start(
        plan: CalculationPlan,
        frames: Arc<dyn FrameSource>,
        forward: FrameCallback,
    ) -> Self {
        let camera = frames.depth_camera_params();
        let render = DepthRender {
            min_depth_mm: camera.min_depth_mm,
            max_depth_mm: camera.max_depth_mm,
            cutoff_depth_mm: plan.cutoff_depth_mm,
        };
        let subscription = frames.subscribe(forward);
        tracing::debug!(
            barcode = %plan.barcode,
            index = plan.calculation_index,
            samples = plan.required_samples,
            subscription,
            "sample collection started"
        );
        let watchdog = xch::after(plan.sample_timeout);
        Self {
            plan,
            frames,
            subscription: Some(subscription),
            render,
            latest_color: None,
            latest_depth: None,
            selection: None,
            laser_mm: None,
            samples: Vec::new(),
            accepted: 0,
            watchdog,
            finished: false,
        }
    }

    /// Fires once when the current sample is overdue; `never` after cleanup.
    pub fn watchdog(&self) -> &xch::Receiver<Instant> {
        &self.watchdog
    }

    pub fn accepted_samples(&self) -> usize {
        self.accepted
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one frame. Returns the terminal outcome when this frame ended the
    /// calculation.
    pub fn on_frame(&mut self, event: &FrameEvent, devices: &mut Devices) -> Option<CollectorOutcome> {
        if self.finished {
            return None;
        }
        match event {
            FrameEvent::Color(c) => self.latest_color = Some(Arc::clone(c)),
            FrameEvent::Depth(d) => self.latest_depth = Some(Arc::clone(d)),
        }
        if self.latest_color.is_none() || self.latest_depth.is_none() {
            return None;
        }
        let (Some(color), Some(depth)) = (self.latest_color.take(), self.latest_depth.take()) else {
            return None;
        };
        self.accept_pair(&color, &depth, devices)
    }

    fn accept_pair(
        &mut self,
        color: &ColorFrame,
        depth: &DepthFrame,
        devices: &mut Devices,
    ) -> Option<CollectorOutcome> {
        let selection = match self.selection {
            Some(sel) => sel,
            None => match self.first_pair(color, depth, devices) {
                Ok(sel) => sel,
                Err(status) => return Some(self.finish(status, DimensionEstimate::ZERO)),
            },
        };

        match devices
            .engine
            .calculate_volume(depth, color, self.laser_mm, selection.choice)
        {
            Ok(Some(estimate)) => self.samples.push(estimate),
            Ok(None) => tracing::warn!(
                index = self.plan.calculation_index,
                sample = self.accepted + 1,
                "engine returned no estimate for sample"
            ),
            Err(e) => {
                tracing::error!(error = %e, "volume calculation failed");
                return Some(self.finish(CalculationStatus::Error, DimensionEstimate::ZERO));
            }
        }
        self.accepted += 1;

        let samples_left = self.plan.required_samples.saturating_sub(self.accepted);
        tracing::debug!(
            index = self.plan.calculation_index,
            algorithm = %selection.choice,
            samples_left,
            "sample accepted"
        );
        if samples_left > 0 {
            self.watchdog = xch::after(self.plan.sample_timeout);
            return None;
        }

        match aggregate(&self.samples) {
            Some(dims) => Some(self.finish(CalculationStatus::Successful, dims)),
            None => {
                tracing::error!(
                    samples = ?self.samples,
                    accepted = self.accepted,
                    "aggregation produced no result"
                );
                Some(self.finish(CalculationStatus::Error, DimensionEstimate::ZERO))
            }
        }
    }

    /// Range reading, algorithm selection, and debug images for sample one.
    fn first_pair(
        &mut self,
        color: &ColorFrame,
        depth: &DepthFrame,
        devices: &mut Devices,
    ) -> Result<AlgorithmSelection, CalculationStatus> {
        self.laser_mm = devices.range_meter.as_mut().and_then(|m| match m.get_reading() {
            Ok(raw) => {
                let mm = usable_laser_distance(
                    raw,
                    self.plan.range_meter_correction_mm,
                    self.plan.floor_depth_mm,
                );
                if mm.is_none() {
                    tracing::info!(raw, "range meter reading out of bounds; using depth only");
                }
                mm
            }
            Err(e) => {
                tracing::warn!(error = %e, "range meter read failed; using depth only");
                None
            }
        });

        let outcome = select_algorithm(&devices.engine, depth, color, self.laser_mm, self.plan.flags);

        let stem = self.plan.photo_stem();
        if let Err(e) = devices.images.save(&stem, color, depth, self.render) {
            tracing::warn!(error = %e, stem, "failed to save debug images");
        }

        match outcome {
            Ok(Ok(sel)) => {
                self.selection = Some(sel);
                Ok(sel)
            }
            Ok(Err(reason)) => Err(failure_status(reason)),
            Err(e) => {
                tracing::error!(error = %e, "algorithm selection failed in engine");
                Err(CalculationStatus::Error)
            }
        }
    }

    /// Stop with `status` and zero dimensions.
    pub fn abort(&mut self, status: CalculationStatus) -> Option<CollectorOutcome> {
        if self.finished {
            return None;
        }
        tracing::info!(
            index = self.plan.calculation_index,
            status = %status,
            accepted = self.accepted,
            "sample collection aborted"
        );
        Some(self.finish(status, DimensionEstimate::ZERO))
    }

    pub fn on_watchdog(&mut self) -> Option<CollectorOutcome> {
        self.abort(CalculationStatus::TimedOut)
    }

    fn finish(&mut self, status: CalculationStatus, dimensions: DimensionEstimate) -> CollectorOutcome {
        self.cleanup();
        CollectorOutcome {
            status,
            dimensions,
            selection: self.selection,
            accepted_samples: self.accepted,
        }
    }

    fn cleanup(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.frames.unsubscribe(id);
        }
        self.watchdog = xch::never();
        self.latest_color = None;
        self.latest_depth = None;
        self.finished = true;
    }
}

impl Drop for SampleCollector {
    fn drop(&mut self) {
        if self.subscription.is_some() {
            self.cleanup();
        }
    }
}
