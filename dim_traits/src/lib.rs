pub mod clock;
pub mod frame;

pub use clock::{Clock, MonotonicClock};
pub use frame::{
    ColorFrame, DepthCameraParams, DepthFrame, FrameCallback, FrameEvent, FrameSource, RelPoint,
    RelRect, SubscriptionId,
};

use thiserror::Error;

/// Error type crossing device boundaries.
pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// Measurement mode offered by the volume engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmChoice {
    /// Depth map only (DM1).
    DepthOnly,
    /// Perspective-corrected depth map (DM2).
    DepthPerspective,
    /// Colour-aided contour detection (RGB).
    ColorAided,
}

impl AlgorithmChoice {
    pub fn as_str(self) -> &'static str {
        match self {
            AlgorithmChoice::DepthOnly => "dm1",
            AlgorithmChoice::DepthPerspective => "dm2",
            AlgorithmChoice::ColorAided => "rgb",
        }
    }
}

impl std::fmt::Display for AlgorithmChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why no algorithm could be chosen for a calculation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmError {
    #[error("input frames were invalid")]
    DataInvalid,
    #[error("no measurement modes are enabled")]
    NoAlgorithmsAllowed,
    #[error("no object found in the work area")]
    NoObjectFound,
}

/// Chosen mode and whether the range meter distance was used to pick it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmSelection {
    pub choice: AlgorithmChoice,
    pub laser_used: bool,
}

pub type AlgorithmOutcome = Result<AlgorithmSelection, AlgorithmError>;

/// Per-mode enable flags for one calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlgorithmFlags {
    pub depth_only: bool,
    pub depth_perspective: bool,
    pub color_aided: bool,
}

impl AlgorithmFlags {
    pub fn any(self) -> bool {
        self.depth_only || self.depth_perspective || self.color_aided
    }
}

/// Length, width and height of the measured object in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct DimensionEstimate {
    pub length_mm: i32,
    pub width_mm: i32,
    pub height_mm: i32,
}

impl DimensionEstimate {
    pub const ZERO: DimensionEstimate = DimensionEstimate {
        length_mm: 0,
        width_mm: 0,
        height_mm: 0,
    };

    pub const fn new(length_mm: i32, width_mm: i32, height_mm: i32) -> Self {
        Self {
            length_mm,
            width_mm,
            height_mm,
        }
    }

    /// Saturates at the `i64` bounds for nonsensical engine output.
    pub fn volume_mm3(&self) -> i64 {
        i64::from(self.length_mm)
            .saturating_mul(i64::from(self.width_mm))
            .saturating_mul(i64::from(self.height_mm))
    }
}

/// Work-area parameters pushed to the engine before a calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub floor_depth_mm: i16,
    pub cutoff_depth_mm: i16,
    pub color_roi: RelRect,
}

/// Native point-cloud/volume library.
///
/// Frames are borrowed for the duration of one call only; implementations
/// must not keep references to the buffers after returning. Calls are
/// serialized by the caller.
pub trait VolumeEngine: Send {
    fn set_work_area(&mut self, settings: &EngineSettings) -> Result<(), DeviceError>;

    fn calculate_floor_depth(&mut self, depth: &DepthFrame) -> Result<i16, DeviceError>;

    fn select_algorithm(
        &mut self,
        depth: &DepthFrame,
        color: &ColorFrame,
        laser_mm: Option<i16>,
        flags: AlgorithmFlags,
    ) -> Result<AlgorithmOutcome, DeviceError>;

    /// `Ok(None)` is the engine's "no result" sentinel for this sample.
    fn calculate_volume(
        &mut self,
        depth: &DepthFrame,
        color: &ColorFrame,
        laser_mm: Option<i16>,
        algorithm: AlgorithmChoice,
    ) -> Result<Option<DimensionEstimate>, DeviceError>;
}

/// Laser rangefinder returning one distance reading in millimetres.
pub trait RangeMeter: Send {
    fn get_reading(&mut self) -> Result<i32, DeviceError>;
}

/// Scale state reported alongside each weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasurementStatus {
    /// Platform empty and zeroed.
    #[default]
    Ready,
    Measuring,
    /// Weight settled.
    Measured,
    Overload,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScaleMeasurement {
    pub status: MeasurementStatus,
    pub weight_gr: f64,
}

impl ScaleMeasurement {
    pub const fn new(status: MeasurementStatus, weight_gr: f64) -> Self {
        Self { status, weight_gr }
    }
}
