#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Calculation core of the dimensioning station (hardware-agnostic).
//!
//! All device interaction goes through the `dim_traits` contracts:
//! `VolumeEngine`, `FrameSource`, `RangeMeter`.
//!
//! ## Architecture
//!
//! - **Engine binding**: one lock around the native engine, panics caught (`engine`)
//! - **Algorithm selection**: once per calculation, from the first frame pair (`selector`)
//! - **Sample collection**: frame pairing, per-sample watchdog (`collector`)
//! - **Aggregation**: per-axis mode over the sample set (`aggregate`)
//! - **Orchestration**: preconditions, auto-start timer, pallet correction,
//!   status broadcast, all on one worker thread (`orchestrator`)
//!
//! ```no_run
//! use std::sync::Arc;
//! use dim_core::mocks::{ManualFrameSource, ScriptedEngine};
//! use dim_core::{CalculationRequest, Orchestrator};
//!
//! # fn main() -> eyre::Result<()> {
//! let frames = Arc::new(ManualFrameSource::new());
//! let orch = Orchestrator::builder()
//!     .with_engine(ScriptedEngine::new())
//!     .with_frame_source(frames.clone())
//!     .spawn()?;
//! let events = orch.subscribe()?;
//! orch.start_calculation(Some(CalculationRequest::new("PKG-1")))?;
//! # drop(events);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod builder;
pub mod collector;
pub mod config;
pub mod context;
pub mod conversions;
pub mod debug_images;
pub mod engine;
pub mod error;
pub mod floor;
pub mod hw_error;
pub mod mocks;
pub mod orchestrator;
pub mod persist;
pub mod result;
pub mod selector;
pub mod status;

pub use aggregate::aggregate;
pub use builder::OrchestratorBuilder;
pub use config::{AlgorithmSettings, Settings, Timeouts, WeightUnits, WorkArea};
pub use context::CalculationContext;
pub use engine::EngineBinding;
pub use error::{BuildError, CoreError, Result};
pub use orchestrator::{CoreEvent, Orchestrator, StateSnapshot};
pub use result::{CalculationRequest, CalculationResult, CalculationResultData, pallet_correction};
pub use status::{CalculationStatus, DashboardStatus};
