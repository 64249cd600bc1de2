//! Station assembly from config and the one-shot commands built on it.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use dim_core::debug_images::PngDebugImageStore;
use dim_core::floor::measure_floor_depth;
use dim_core::persist::{FileCounter, LockFileGuard};
use dim_core::{
    CalculationRequest, CalculationResultData, CoreError, CoreEvent, EngineBinding, Orchestrator,
    Settings,
};
use dim_hardware::{SimCameraOptions, SimScene, SimulatedEngine, SimulatedFrameSource, SimulatedRangeMeter};
use dim_traits::{
    DimensionEstimate, FrameSource, MeasurementStatus, MonotonicClock, ScaleMeasurement,
};

use crate::cli::SIM_TIMEOUT_ENV;

const POLL: Duration = Duration::from_millis(50);
/// Slack on top of the per-sample watchdogs before the CLI gives up waiting.
const RESULT_GRACE: Duration = Duration::from_secs(2);

/// What the operator typed for one `measure` run.
#[derive(Debug, Clone)]
pub struct MeasureArgs {
    pub barcode: String,
    pub units: u32,
    pub comment: String,
    pub weight_gr: Option<f64>,
}

pub fn sim_scene(cfg: &dim_config::Config) -> SimScene {
    let (l, w, h) = cfg.hardware.object_mm;
    SimScene {
        floor_depth_mm: cfg.work_area.floor_depth_mm,
        object: DimensionEstimate::new(l, w, h),
        ..SimScene::default()
    }
}

fn depth_suppressed() -> bool {
    std::env::var(SIM_TIMEOUT_ENV).is_ok_and(|v| !v.is_empty() && v != "0")
}

pub fn spawn_camera(cfg: &dim_config::Config, scene: SimScene) -> Arc<dyn FrameSource> {
    let emit_depth = !depth_suppressed();
    if !emit_depth {
        tracing::warn!("{SIM_TIMEOUT_ENV} set: simulated camera will not produce depth frames");
    }
    Arc::new(SimulatedFrameSource::spawn(
        scene,
        SimCameraOptions {
            frame_rate_hz: cfg.hardware.frame_rate_hz,
            emit_depth,
            ..SimCameraOptions::default()
        },
        MonotonicClock::new(),
    ))
}

pub fn build_engine(scene: &SimScene, samples: Option<&Path>) -> eyre::Result<SimulatedEngine> {
    let engine = SimulatedEngine::new(scene.mm_per_px);
    let Some(path) = samples else {
        return Ok(engine);
    };
    let rows = dim_config::load_sample_script_csv(path)?;
    tracing::info!(rows = rows.len(), path = %path.display(), "replaying sample script");
    Ok(engine.with_script(
        rows.iter()
            .map(|r| DimensionEstimate::new(r.length_mm, r.width_mm, r.height_mm))
            .collect(),
    ))
}

/// Run one calculation against the simulated station and wait for its result.
///
/// `shutdown` is polled while waiting; once set the calculation is aborted and
/// the aborted result is returned like any other.
pub fn run_measure(
    cfg: &dim_config::Config,
    samples: Option<&Path>,
    args: &MeasureArgs,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<CalculationResultData> {
    let scene = sim_scene(cfg);
    let engine = build_engine(&scene, samples)?;
    let frames = spawn_camera(cfg, scene);

    let mut builder = Orchestrator::builder()
        .with_settings(Settings::from(cfg))
        .with_counter(FileCounter::new(&cfg.general.counter_file));
    if let Some(mm) = cfg.hardware.range_meter_mm {
        builder = builder.with_range_meter(SimulatedRangeMeter::new(mm));
    }
    if let Some(lock) = &cfg.general.result_lock_file {
        builder = builder.with_result_guard(LockFileGuard::new(lock));
    }
    if cfg.general.save_debug_images {
        builder = builder.with_debug_images(PngDebugImageStore::new(&cfg.general.photos_dir));
    }
    let orch = builder.with_engine(engine).with_frame_source(frames).spawn()?;

    let events = orch.subscribe()?;
    let weight = args.weight_gr.unwrap_or(cfg.hardware.weight_gr);
    orch.update_weight(ScaleMeasurement::new(MeasurementStatus::Measured, weight))?;
    orch.start_calculation(Some(
        CalculationRequest::new(args.barcode.clone())
            .with_unit_count(args.units)
            .with_comment(args.comment.clone()),
    ))?;

    let samples_due = u32::from(cfg.algorithm.sample_count) + 1;
    let deadline = Instant::now()
        + Duration::from_millis(cfg.timeouts.sample_ms).saturating_mul(samples_due)
        + RESULT_GRACE;
    let mut abort_sent = false;
    let outcome = loop {
        if !abort_sent && shutdown.load(Ordering::Relaxed) {
            tracing::warn!("interrupt received; aborting calculation");
            orch.abort_calculation()?;
            abort_sent = true;
        }
        match events.recv_timeout(POLL) {
            Ok(CoreEvent::CalculationFinished(data)) => break Ok(data),
            Ok(CoreEvent::StatusChanged(status)) => tracing::debug!(%status, "status changed"),
            Ok(CoreEvent::LastAlgorithmUsedChanged { algorithm, laser_used }) => {
                tracing::debug!(?algorithm, laser_used, "algorithm used");
            }
            Err(RecvTimeoutError::Timeout) if Instant::now() >= deadline => {
                break Err(eyre::Report::new(CoreError::Timeout));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                break Err(eyre::Report::new(CoreError::State(
                    "orchestrator stopped before publishing a result".into(),
                )));
            }
        }
    };
    orch.shutdown();
    outcome
}

/// Measure the empty work area and return the floor distance.
pub fn run_floor_depth(cfg: &dim_config::Config) -> eyre::Result<i16> {
    let scene = sim_scene(cfg).empty();
    let engine = EngineBinding::new(Box::new(SimulatedEngine::new(scene.mm_per_px)));
    let frames = spawn_camera(cfg, scene);
    measure_floor_depth(
        &engine,
        frames.as_ref(),
        Duration::from_millis(cfg.timeouts.sample_ms),
    )
}

/// Camera and engine answer, and the measured floor roughly matches config.
pub fn run_self_check(cfg: &dim_config::Config, samples: Option<&Path>) -> eyre::Result<i16> {
    if let Some(path) = samples {
        dim_config::load_sample_script_csv(path)?;
    }
    let floor = run_floor_depth(cfg)?;
    let configured = cfg.work_area.floor_depth_mm;
    let drift = (i32::from(floor) - i32::from(configured)).abs();
    if drift > i32::from(cfg.work_area.min_object_height_mm) {
        tracing::warn!(
            measured = floor,
            configured,
            "floor depth differs from config by more than the minimum object height"
        );
    }
    Ok(floor)
}
