//! One-shot floor depth calibration.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as xch;
use dim_traits::{DepthFrame, FrameEvent, FrameSource};

use crate::engine::EngineBinding;
use crate::error::{CoreError, Result};

/// Wait for one depth frame and ask the engine for the floor distance.
pub fn measure_floor_depth(
    engine: &EngineBinding,
    frames: &dyn FrameSource,
    timeout: Duration,
) -> Result<i16> {
    let (tx, rx) = xch::bounded::<Arc<DepthFrame>>(1);
    let id = frames.subscribe(Arc::new(move |event: &FrameEvent| {
        if let FrameEvent::Depth(d) = event {
            let _ = tx.try_send(Arc::clone(d));
        }
    }));
    let frame = rx.recv_timeout(timeout);
    frames.unsubscribe(id);
    let frame = frame.map_err(|_| CoreError::Timeout)?;

    let depth = engine.calculate_floor_depth(&frame)?;
    if depth <= 0 {
        return Err(CoreError::Engine(format!("engine reported floor depth {depth} mm")).into());
    }
    tracing::info!(floor_depth_mm = depth, "floor depth measured");
    Ok(depth)
}
