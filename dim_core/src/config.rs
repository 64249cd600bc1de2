//! Runtime configuration for the calculation core.
//!
//! These are the structs the orchestrator works with. They are separate from
//! the TOML-deserialized config in `dim_config`; see `conversions`.

use std::time::Duration;

use dim_traits::{AlgorithmFlags, EngineSettings, RelPoint, RelRect};

use crate::error::BuildError;

/// Measurement zone and per-mode switches.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkArea {
    /// Camera-to-floor distance.
    pub floor_depth_mm: i16,
    /// Anything closer to the floor than this is background.
    pub min_object_height_mm: i16,
    pub use_color_mask: bool,
    pub color_mask: Vec<RelPoint>,
    pub use_depth_mask: bool,
    pub depth_mask: Vec<RelPoint>,
    pub enable_dm: bool,
    pub enable_perspective_dm: bool,
    pub enable_rgb: bool,
    /// Added to every range meter reading.
    pub range_meter_correction_mm: i32,
}

impl Default for WorkArea {
    fn default() -> Self {
        let contour = vec![
            RelPoint::new(0.2, 0.2),
            RelPoint::new(0.2, 0.8),
            RelPoint::new(0.8, 0.8),
            RelPoint::new(0.8, 0.2),
        ];
        Self {
            floor_depth_mm: 1805,
            min_object_height_mm: 15,
            use_color_mask: false,
            color_mask: contour.clone(),
            use_depth_mask: true,
            depth_mask: contour,
            enable_dm: true,
            enable_perspective_dm: true,
            enable_rgb: true,
            range_meter_correction_mm: 0,
        }
    }
}

impl WorkArea {
    /// Floor depth minus the minimum object height.
    pub fn cutoff_depth_mm(&self) -> i16 {
        self.floor_depth_mm.saturating_sub(self.min_object_height_mm)
    }

    /// Depth modes need the depth mask, the colour mode needs the colour mask.
    pub fn algorithm_flags(&self) -> AlgorithmFlags {
        AlgorithmFlags {
            depth_only: self.enable_dm && self.use_depth_mask,
            depth_perspective: self.enable_perspective_dm && self.use_depth_mask,
            color_aided: self.enable_rgb && self.use_color_mask,
        }
    }

    /// Colour region of interest spanned by the mask's first and third corner.
    pub fn color_roi(&self) -> RelRect {
        if !self.use_color_mask {
            return RelRect::FULL;
        }
        match (self.color_mask.first(), self.color_mask.get(2)) {
            (Some(a), Some(c)) => RelRect {
                x: a.x.min(c.x) as f32,
                y: a.y.min(c.y) as f32,
                width: (c.x - a.x).abs() as f32,
                height: (c.y - a.y).abs() as f32,
            },
            _ => RelRect::FULL,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            floor_depth_mm: self.floor_depth_mm,
            cutoff_depth_mm: self.cutoff_depth_mm(),
            color_roi: self.color_roi(),
        }
    }
}

/// Unit in which the result weight is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightUnits {
    #[default]
    Gr,
    Kg,
}

impl WeightUnits {
    pub fn as_str(self) -> &'static str {
        match self {
            WeightUnits::Gr => "gr",
            WeightUnits::Kg => "kg",
        }
    }

    pub fn from_grams(self, grams: f64) -> f64 {
        match self {
            WeightUnits::Gr => grams,
            WeightUnits::Kg => grams / 1000.0,
        }
    }
}

/// Sampling and result-correction options.
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmSettings {
    pub sample_count: u8,
    pub require_barcode: bool,
    pub weight_units: WeightUnits,
    pub enable_auto_timer: bool,
    /// Length of the auto-start countdown.
    pub time_to_start: Duration,
    pub enable_pallet_subtraction: bool,
    pub pallet_weight_gr: f64,
    pub pallet_height_mm: i32,
}

impl Default for AlgorithmSettings {
    fn default() -> Self {
        Self {
            sample_count: 5,
            require_barcode: true,
            weight_units: WeightUnits::Gr,
            enable_auto_timer: true,
            time_to_start: Duration::from_millis(1000),
            enable_pallet_subtraction: false,
            pallet_weight_gr: 0.0,
            pallet_height_mm: 0,
        }
    }
}

/// Timers driving the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Per-sample watchdog, restarted after every accepted sample.
    pub sample: Duration,
    pub supervisor_tick: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            sample: Duration::from_millis(5000),
            supervisor_tick: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub work_area: WorkArea,
    pub algorithm: AlgorithmSettings,
    pub timeouts: Timeouts,
}

impl Settings {
    /// Cheap invariant checks repeated at the core boundary.
    pub fn check(&self) -> Result<(), BuildError> {
        check_work_area(&self.work_area)?;
        check_algorithm(&self.algorithm)?;
        if self.timeouts.sample.is_zero() {
            return Err(BuildError::InvalidConfig("sample timeout must be > 0"));
        }
        if self.timeouts.supervisor_tick.is_zero() {
            return Err(BuildError::InvalidConfig("supervisor tick must be > 0"));
        }
        Ok(())
    }
}

pub(crate) fn check_work_area(w: &WorkArea) -> Result<(), BuildError> {
    if w.floor_depth_mm <= 0 {
        return Err(BuildError::InvalidConfig("floor depth must be > 0"));
    }
    if w.min_object_height_mm < 0 || w.min_object_height_mm >= w.floor_depth_mm {
        return Err(BuildError::InvalidConfig(
            "min object height must be in [0, floor depth)",
        ));
    }
    Ok(())
}

pub(crate) fn check_algorithm(a: &AlgorithmSettings) -> Result<(), BuildError> {
    if a.sample_count == 0 {
        return Err(BuildError::InvalidConfig("sample_count must be >= 1"));
    }
    if a.enable_auto_timer && a.time_to_start.is_zero() {
        return Err(BuildError::InvalidConfig("auto-start delay must be > 0"));
    }
    if !a.pallet_weight_gr.is_finite() || a.pallet_weight_gr < 0.0 {
        return Err(BuildError::InvalidConfig("pallet weight must be >= 0"));
    }
    if a.pallet_height_mm < 0 {
        return Err(BuildError::InvalidConfig("pallet height must be >= 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_is_floor_minus_min_height() {
        let w = WorkArea {
            floor_depth_mm: 1800,
            min_object_height_mm: 20,
            ..Default::default()
        };
        assert_eq!(w.cutoff_depth_mm(), 1780);
    }

    #[test]
    fn flags_follow_masks() {
        let mut w = WorkArea::default();
        let f = w.algorithm_flags();
        assert!(f.depth_only && f.depth_perspective && !f.color_aided);

        w.use_depth_mask = false;
        w.use_color_mask = true;
        let f = w.algorithm_flags();
        assert!(!f.depth_only && !f.depth_perspective && f.color_aided);
    }

    #[test]
    fn roi_uses_opposite_corners_only_with_color_mask() {
        let mut w = WorkArea::default();
        assert_eq!(w.color_roi(), RelRect::FULL);
        w.use_color_mask = true;
        w.color_mask = vec![
            RelPoint::new(0.75, 0.5),
            RelPoint::new(0.75, 0.25),
            RelPoint::new(0.25, 0.25),
            RelPoint::new(0.25, 0.5),
        ];
        let r = w.color_roi();
        assert_eq!((r.x, r.y, r.width, r.height), (0.25, 0.25, 0.5, 0.25));
    }

    #[test]
    fn check_rejects_zero_samples() {
        let mut s = Settings::default();
        assert!(s.check().is_ok());
        s.algorithm.sample_count = 0;
        assert!(matches!(s.check(), Err(BuildError::InvalidConfig(_))));
    }

    #[test]
    fn kg_conversion() {
        assert_eq!(WeightUnits::Kg.from_grams(1250.0), 1.25);
        assert_eq!(WeightUnits::Gr.from_grams(1250.0), 1250.0);
    }
}
