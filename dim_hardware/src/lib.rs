//! Simulated devices for running the dimensioning core without a camera rig.
//!
//! - [`SimulatedFrameSource`] streams a rendered scene on its own thread.
//! - [`SimulatedEngine`] measures the box in that scene, or replays a script.
//! - [`SimulatedRangeMeter`] answers with a fixed distance.

pub mod camera;
pub mod engine;
pub mod error;
pub mod range_meter;
pub mod scene;
pub mod util;

pub use camera::{SimCameraOptions, SimulatedFrameSource};
pub use engine::SimulatedEngine;
pub use range_meter::SimulatedRangeMeter;
pub use scene::SimScene;
