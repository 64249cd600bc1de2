//! Request orchestrator: the single owner of the calculation session.
//!
//! All inputs (operator commands, scale and barcode updates, frames, timers)
//! are funnelled into one worker thread through channels, so the session
//! state is only ever touched by that thread. The public [`Orchestrator`]
//! handle just sends commands; results are broadcast to subscribers as
//! [`CoreEvent`]s.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use chrono::Local;
use crossbeam_channel as xch;
use dim_traits::{AlgorithmChoice, Clock, FrameEvent, FrameSource, ScaleMeasurement};

use crate::collector::{CalculationPlan, CollectorOutcome, Devices, SampleCollector};
use crate::config::{AlgorithmSettings, Settings, WorkArea, check_algorithm, check_work_area};
use crate::context::CalculationContext;
use crate::error::{CoreError, Result};
use crate::persist::{CalculationCounter, ResultFileGuard};
use crate::result::{
    CalculationRequest, CalculationResult, CalculationResultData, CalculationSnapshot,
    compose_result,
};
use crate::status::CalculationStatus;

/// Notification published to every subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    CalculationFinished(CalculationResultData),
    StatusChanged(CalculationStatus),
    LastAlgorithmUsedChanged {
        algorithm: Option<AlgorithmChoice>,
        laser_used: bool,
    },
}

/// Point-in-time view of the session, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub context: CalculationContext,
    pub status: CalculationStatus,
    pub pending: bool,
    pub settings: Settings,
}

enum Command {
    Start(Option<CalculationRequest>),
    UpdateBarcode(String),
    UpdateWeight(ScaleMeasurement),
    CancelPending,
    UpdateLocking(bool),
    UpdateSettings(WorkArea, AlgorithmSettings),
    Abort,
    Subscribe(xch::Sender<CoreEvent>),
    Snapshot(xch::Sender<StateSnapshot>),
    Shutdown,
}

/// Handle to the orchestrator worker. Dropping it stops the worker.
pub struct Orchestrator {
    tx: xch::Sender<Command>,
    join: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("running", &self.join.is_some())
            .finish()
    }
}

pub(crate) struct Parts {
    pub settings: Settings,
    pub devices: Devices,
    pub frames: Arc<dyn FrameSource>,
    pub counter: Box<dyn CalculationCounter>,
    pub guard: Box<dyn ResultFileGuard>,
    pub clock: Box<dyn Clock + Send>,
}

impl Orchestrator {
    pub fn builder() -> crate::builder::OrchestratorBuilder {
        crate::builder::OrchestratorBuilder::default()
    }

    pub(crate) fn spawn(parts: Parts) -> Result<Self> {
        let (tx, rx) = xch::unbounded();
        let (frame_tx, frame_rx) = xch::unbounded();
        let actor = Actor {
            ctx: CalculationContext::default(),
            status: CalculationStatus::Undefined,
            settings: parts.settings,
            devices: parts.devices,
            frames: parts.frames,
            counter: parts.counter,
            guard: parts.guard,
            clock: parts.clock,
            observers: Vec::new(),
            collector: None,
            active: None,
            generation: 0,
            frame_tx,
            pending: None,
        };
        let join = std::thread::Builder::new()
            .name("dim-orchestrator".into())
            .spawn(move || actor.run(&rx, &frame_rx))
            .map_err(|e| CoreError::State(format!("failed to spawn orchestrator: {e}")))?;
        Ok(Self {
            tx,
            join: Some(join),
        })
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.tx
            .send(cmd)
            .map_err(|_| CoreError::State("orchestrator stopped".into()).into())
    }

    /// Start a calculation; `None` reuses the last scanned barcode.
    ///
    /// A no-op while another calculation is running.
    pub fn start_calculation(&self, request: Option<CalculationRequest>) -> Result<()> {
        self.send(Command::Start(request))
    }

    pub fn update_barcode(&self, code: impl Into<String>) -> Result<()> {
        self.send(Command::UpdateBarcode(code.into()))
    }

    pub fn update_weight(&self, measurement: ScaleMeasurement) -> Result<()> {
        self.send(Command::UpdateWeight(measurement))
    }

    pub fn cancel_pending_calculation(&self) -> Result<()> {
        self.send(Command::CancelPending)
    }

    pub fn update_locking_status(&self, locked: bool) -> Result<()> {
        self.send(Command::UpdateLocking(locked))
    }

    /// Replace the work area and algorithm settings. Rejected while running.
    pub fn update_settings(&self, work_area: WorkArea, algorithm: AlgorithmSettings) -> Result<()> {
        self.send(Command::UpdateSettings(work_area, algorithm))
    }

    /// Operator abort of the running calculation.
    pub fn abort_calculation(&self) -> Result<()> {
        self.send(Command::Abort)
    }

    /// New event stream; events emitted before subscribing are not replayed.
    pub fn subscribe(&self) -> Result<xch::Receiver<CoreEvent>> {
        let (tx, rx) = xch::unbounded();
        self.send(Command::Subscribe(tx))?;
        Ok(rx)
    }

    pub fn snapshot(&self) -> Result<StateSnapshot> {
        let (tx, rx) = xch::bounded(1);
        self.send(Command::Snapshot(tx))?;
        rx.recv()
            .map_err(|_| CoreError::State("orchestrator stopped".into()).into())
    }

    /// Stop the worker and wait for it; a running calculation is aborted.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.join.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "orchestrator thread panicked during shutdown");
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Actor {
    ctx: CalculationContext,
    status: CalculationStatus,
    settings: Settings,
    devices: Devices,
    frames: Arc<dyn FrameSource>,
    counter: Box<dyn CalculationCounter>,
    guard: Box<dyn ResultFileGuard>,
    clock: Box<dyn Clock + Send>,
    observers: Vec<xch::Sender<CoreEvent>>,
    collector: Option<SampleCollector>,
    active: Option<(CalculationSnapshot, Instant)>,
    /// Bumped per calculation; frames tagged with an older value are stale.
    generation: u64,
    frame_tx: xch::Sender<(u64, FrameEvent)>,
    pending: Option<xch::Receiver<Instant>>,
}

impl Actor {
    fn run(mut self, rx: &xch::Receiver<Command>, frames: &xch::Receiver<(u64, FrameEvent)>) {
        let tick = xch::tick(self.settings.timeouts.supervisor_tick);
        tracing::debug!("orchestrator started");
        loop {
            let watchdog = self
                .collector
                .as_ref()
                .map_or_else(xch::never, |c| c.watchdog().clone());
            let pending = self.pending.clone().unwrap_or_else(xch::never);
            xch::select! {
                recv(rx) -> msg => match msg {
                    Ok(Command::Shutdown) | Err(_) => break,
                    Ok(cmd) => self.handle(cmd),
                },
                recv(frames) -> msg => {
                    if let Ok((generation, event)) = msg {
                        self.on_frame(generation, &event);
                    }
                },
                recv(watchdog) -> _ => self.on_watchdog(),
                recv(pending) -> _ => self.on_pending_elapsed(),
                recv(tick) -> _ => self.supervisor_tick(),
            }
        }
        if let Some(outcome) = self
            .collector
            .as_mut()
            .and_then(|c| c.abort(CalculationStatus::AbortedByUser))
        {
            self.on_collector_finished(outcome);
        }
        tracing::debug!("orchestrator stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Start(request) => self.start_calculation(request),
            Command::UpdateBarcode(code) => {
                if !self.ctx.apply_barcode(code) {
                    tracing::debug!("barcode ignored while calculating");
                }
            }
            Command::UpdateWeight(m) => {
                if !self.ctx.apply_weight(m, &self.settings.algorithm) {
                    tracing::trace!("weight update ignored");
                }
            }
            Command::CancelPending => {
                self.pending = None;
                self.ctx.auto_start_cancelled = true;
                self.set_status(CalculationStatus::Undefined);
            }
            Command::UpdateLocking(locked) => self.ctx.is_locked = locked,
            Command::UpdateSettings(work_area, algorithm) => {
                self.update_settings(work_area, algorithm);
            }
            Command::Abort => match self
                .collector
                .as_mut()
                .and_then(|c| c.abort(CalculationStatus::AbortedByUser))
            {
                Some(outcome) => self.on_collector_finished(outcome),
                None => tracing::debug!("abort requested with no calculation running"),
            },
            Command::Subscribe(tx) => self.observers.push(tx),
            Command::Snapshot(reply) => {
                let _ = reply.send(StateSnapshot {
                    context: self.ctx.clone(),
                    status: self.status,
                    pending: self.pending.is_some(),
                    settings: self.settings.clone(),
                });
            }
            Command::Shutdown => {}
        }
    }

    fn emit(&mut self, event: &CoreEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_status(&mut self, status: CalculationStatus) {
        self.status = status;
        self.emit(&CoreEvent::StatusChanged(status));
    }

    fn update_settings(&mut self, work_area: WorkArea, algorithm: AlgorithmSettings) {
        if self.ctx.calculation_running {
            tracing::warn!("settings update rejected: calculation in progress");
            return;
        }
        if let Err(e) = check_work_area(&work_area).and_then(|()| check_algorithm(&algorithm)) {
            tracing::warn!(error = %e, "settings update rejected");
            return;
        }
        let previous = &self.settings.algorithm;
        let timer_changed = previous.enable_auto_timer != algorithm.enable_auto_timer
            || previous.time_to_start != algorithm.time_to_start;
        self.settings.work_area = work_area;
        self.settings.algorithm = algorithm;
        tracing::info!("settings updated");
        // A running countdown belongs to the old timer settings; the next
        // tick re-arms it if auto-start is still enabled.
        if timer_changed && self.pending.take().is_some() {
            tracing::debug!("auto-start countdown dropped after settings change");
            self.set_status(CalculationStatus::Undefined);
        }
    }

    fn start_calculation(&mut self, request: Option<CalculationRequest>) {
        if self.ctx.calculation_running {
            tracing::info!("calculation already running; start ignored");
            return;
        }
        self.ctx.calculation_running = true;
        self.pending = None;

        if let Err(e) = self.try_start(request) {
            tracing::error!(error = %e, "failed to start calculation");
            self.collector = None;
            self.active = None;
            self.publish_terminal(CalculationResultData::empty(CalculationStatus::Error));
        }
    }

    fn try_start(&mut self, request: Option<CalculationRequest>) -> Result<()> {
        let started = self.clock.now();
        let timestamp = Local::now();
        let (unit_count, comment) = match request {
            Some(req) => {
                if !req.barcode.is_empty() {
                    self.ctx.barcode = req.barcode;
                }
                (req.unit_count, req.comment)
            }
            // Auto-starts always measure a single unit with no comment; the
            // previous request's values are not carried over.
            None => (1, String::new()),
        };

        let failed = if !self.ctx.code_ready(&self.settings.algorithm) {
            Some(CalculationStatus::BarcodeNotEntered)
        } else if self.ctx.weight.status != dim_traits::MeasurementStatus::Measured {
            Some(CalculationStatus::WeightNotStable)
        } else if !self.guard.ensure_closed() {
            Some(CalculationStatus::FailedToCloseFiles)
        } else {
            None
        };
        if let Some(status) = failed {
            tracing::info!(status = %status, barcode = %self.ctx.barcode, "calculation precondition failed");
            self.publish_terminal(CalculationResultData::empty(status));
            return Ok(());
        }

        self.set_status(CalculationStatus::InProgress);

        let index = self.counter.next_index()?;
        let work_area = &self.settings.work_area;
        self.devices.engine.set_work_area(&work_area.engine_settings())?;

        let plan = CalculationPlan {
            required_samples: usize::from(self.settings.algorithm.sample_count),
            barcode: self.ctx.barcode.clone(),
            calculation_index: index,
            flags: work_area.algorithm_flags(),
            floor_depth_mm: work_area.floor_depth_mm,
            cutoff_depth_mm: work_area.cutoff_depth_mm(),
            range_meter_correction_mm: work_area.range_meter_correction_mm,
            sample_timeout: self.settings.timeouts.sample,
        };
        tracing::info!(
            barcode = %plan.barcode,
            index,
            samples = plan.required_samples,
            "calculation started"
        );

        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        let tx = self.frame_tx.clone();
        let forward: dim_traits::FrameCallback = Arc::new(move |event: &FrameEvent| {
            let _ = tx.send((generation, event.clone()));
        });

        self.active = Some((
            CalculationSnapshot {
                timestamp,
                barcode: plan.barcode.clone(),
                unit_count,
                comment,
                weight_gr: self.ctx.weight.weight_gr,
                calculation_index: Some(index),
            },
            started,
        ));
        self.collector = Some(SampleCollector::start(plan, Arc::clone(&self.frames), forward));
        Ok(())
    }

    fn on_frame(&mut self, generation: u64, event: &FrameEvent) {
        if generation != self.generation {
            tracing::trace!(generation, "stale frame dropped");
            return;
        }
        let Some(collector) = self.collector.as_mut() else {
            return;
        };
        if let Some(outcome) = collector.on_frame(event, &mut self.devices) {
            self.on_collector_finished(outcome);
        }
    }

    fn on_watchdog(&mut self) {
        if let Some(outcome) = self.collector.as_mut().and_then(SampleCollector::on_watchdog) {
            tracing::warn!(accepted = outcome.accepted_samples, "sample watchdog elapsed");
            self.on_collector_finished(outcome);
        }
    }

    fn on_collector_finished(&mut self, outcome: CollectorOutcome) {
        self.collector = None;
        let Some((snapshot, started)) = self.active.take() else {
            tracing::error!("collector finished without an active calculation");
            self.publish_terminal(CalculationResultData::empty(CalculationStatus::Error));
            return;
        };
        let result = compose_result(
            &snapshot,
            outcome.status,
            outcome.dimensions,
            &self.settings.algorithm,
        );
        let data = CalculationResultData {
            status: outcome.status,
            calculation_index: snapshot.calculation_index,
            algorithm: outcome.selection.map(|s| s.choice),
            laser_used: outcome.selection.is_some_and(|s| s.laser_used),
            elapsed_ms: self.clock.ms_since(started),
            result,
        };
        log_result(&data.result, &data);
        self.publish_terminal(data);
    }

    /// Common completion path for every terminal status.
    fn publish_terminal(&mut self, data: CalculationResultData) {
        let status = data.status;
        let algorithm = data.algorithm;
        let laser_used = data.laser_used;
        self.ctx.calculation_running = false;
        self.ctx.waiting_for_scale_reset = true;
        self.ctx.auto_start_cancelled = true;
        self.emit(&CoreEvent::CalculationFinished(data));
        self.set_status(status);
        self.emit(&CoreEvent::LastAlgorithmUsedChanged {
            algorithm,
            laser_used,
        });
    }

    fn supervisor_tick(&mut self) {
        if self.ctx.waiting_for_scale_reset
            && self.ctx.weight.status == dim_traits::MeasurementStatus::Ready
        {
            self.ctx.waiting_for_scale_reset = false;
            self.set_status(CalculationStatus::Undefined);
        }
        if !self.settings.algorithm.enable_auto_timer {
            return;
        }
        if self.ctx.calculation_running {
            self.pending = None;
            return;
        }
        let eligible = self.ctx.auto_start_eligible(&self.settings.algorithm);
        match (self.pending.is_some(), eligible) {
            (true, true) => self.set_status(CalculationStatus::Pending),
            (true, false) => {
                tracing::debug!("auto-start no longer eligible");
                self.pending = None;
                self.set_status(CalculationStatus::Undefined);
            }
            (false, true) => {
                tracing::debug!(delay = ?self.settings.algorithm.time_to_start, "auto-start pending");
                self.pending = Some(xch::after(self.settings.algorithm.time_to_start));
                self.set_status(CalculationStatus::Pending);
            }
            (false, false) => {}
        }
    }

    fn on_pending_elapsed(&mut self) {
        self.pending = None;
        tracing::info!("auto-start timer elapsed");
        self.start_calculation(None);
    }
}

fn log_result(r: &CalculationResult, data: &CalculationResultData) {
    tracing::info!(
        status = %data.status,
        barcode = %r.barcode,
        index = ?data.calculation_index,
        algorithm = ?data.algorithm.map(AlgorithmChoice::as_str),
        length_mm = r.length_mm,
        width_mm = r.width_mm,
        height_mm = r.height_mm,
        volume_mm3 = r.volume_mm3,
        weight = r.weight,
        elapsed_ms = data.elapsed_ms,
        "calculation finished"
    );
}
