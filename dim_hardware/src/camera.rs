//! Simulated camera pipeline.
//!
//! One background thread renders the scene once and then delivers the same
//! colour and depth frames to every subscriber at the configured rate. The
//! thread is shut down and joined when the source is dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use dim_traits::clock::Clock;
use dim_traits::{
    DepthCameraParams, FrameCallback, FrameEvent, FrameSource, SubscriptionId,
};

use crate::scene::SimScene;

type Subscribers = Arc<Mutex<Vec<(SubscriptionId, FrameCallback)>>>;

fn lock(subs: &Subscribers) -> MutexGuard<'_, Vec<(SubscriptionId, FrameCallback)>> {
    subs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Options for [`SimulatedFrameSource::spawn`].
#[derive(Debug, Clone, Copy)]
pub struct SimCameraOptions {
    pub frame_rate_hz: u32,
    /// When false only colour frames are produced, so no sample ever pairs.
    pub emit_depth: bool,
    pub params: DepthCameraParams,
}

impl Default for SimCameraOptions {
    fn default() -> Self {
        Self {
            frame_rate_hz: 15,
            emit_depth: true,
            params: DepthCameraParams::default(),
        }
    }
}

pub struct SimulatedFrameSource {
    subscribers: Subscribers,
    next_id: AtomicU64,
    params: DepthCameraParams,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl SimulatedFrameSource {
    pub fn spawn<C: Clock + Send + 'static>(
        scene: SimScene,
        options: SimCameraOptions,
        clock: C,
    ) -> Self {
        let subscribers: Subscribers = Arc::default();
        let shutdown = Arc::new(AtomicBool::new(false));
        let period = Duration::from_micros(crate::util::period_us(options.frame_rate_hz));

        let color = FrameEvent::Color(Arc::new(scene.render_color()));
        let depth = options
            .emit_depth
            .then(|| FrameEvent::Depth(Arc::new(scene.render_depth())));

        let subs = Arc::clone(&subscribers);
        let stop = Arc::clone(&shutdown);
        let join_handle = std::thread::Builder::new()
            .name("dim-sim-camera".into())
            .spawn(move || {
                let mut frames: u64 = 0;
                while !stop.load(Ordering::Relaxed) {
                    {
                        // Dispatch under the lock: once unsubscribe returns the
                        // callback cannot be running or be called again.
                        let subs = lock(&subs);
                        for (_, cb) in subs.iter() {
                            cb(&color);
                            if let Some(d) = &depth {
                                cb(d);
                            }
                        }
                    }
                    frames += 1;
                    clock.sleep(period);
                }
                tracing::trace!(frames, "simulated camera thread exiting");
            })
            .ok();
        if join_handle.is_none() {
            tracing::error!("failed to spawn simulated camera thread");
        }

        Self {
            subscribers,
            next_id: AtomicU64::new(1),
            params: options.params,
            shutdown,
            join_handle,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

impl FrameSource for SimulatedFrameSource {
    fn subscribe(&self, callback: FrameCallback) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers).push((id, callback));
        tracing::debug!(id, "camera subscriber added");
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

impl Drop for SimulatedFrameSource {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(?e, "simulated camera thread panicked");
        }
    }
}
