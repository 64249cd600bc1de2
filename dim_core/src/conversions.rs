//! `From` implementations bridging `dim_config` types to `dim_core` types.

use std::time::Duration;

use dim_traits::RelPoint;

use crate::config::{AlgorithmSettings, Settings, Timeouts, WeightUnits, WorkArea};

fn points(contour: &[(f64, f64)]) -> Vec<RelPoint> {
    contour.iter().map(|&(x, y)| RelPoint::new(x, y)).collect()
}

// ── WorkArea ─────────────────────────────────────────────────────────────────

impl From<&dim_config::WorkAreaCfg> for WorkArea {
    fn from(c: &dim_config::WorkAreaCfg) -> Self {
        Self {
            floor_depth_mm: c.floor_depth_mm,
            min_object_height_mm: c.min_object_height_mm,
            use_color_mask: c.use_color_mask,
            color_mask: points(&c.color_mask),
            use_depth_mask: c.use_depth_mask,
            depth_mask: points(&c.depth_mask),
            enable_dm: c.enable_dm,
            enable_perspective_dm: c.enable_perspective_dm,
            enable_rgb: c.enable_rgb,
            range_meter_correction_mm: c.range_meter_correction_mm,
        }
    }
}

// ── AlgorithmSettings ────────────────────────────────────────────────────────

impl From<dim_config::WeightUnits> for WeightUnits {
    fn from(u: dim_config::WeightUnits) -> Self {
        match u {
            dim_config::WeightUnits::Gr => WeightUnits::Gr,
            dim_config::WeightUnits::Kg => WeightUnits::Kg,
        }
    }
}

impl From<&dim_config::AlgorithmCfg> for AlgorithmSettings {
    fn from(c: &dim_config::AlgorithmCfg) -> Self {
        Self {
            sample_count: c.sample_count,
            require_barcode: c.require_barcode,
            weight_units: c.weight_units.into(),
            enable_auto_timer: c.enable_auto_timer,
            time_to_start: Duration::from_millis(c.time_to_start_ms),
            enable_pallet_subtraction: c.enable_pallet_subtraction,
            pallet_weight_gr: c.pallet_weight_gr,
            pallet_height_mm: c.pallet_height_mm,
        }
    }
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

impl From<&dim_config::Timeouts> for Timeouts {
    fn from(c: &dim_config::Timeouts) -> Self {
        Self {
            sample: Duration::from_millis(c.sample_ms),
            supervisor_tick: Duration::from_millis(c.supervisor_tick_ms),
        }
    }
}

impl From<&dim_config::Config> for Settings {
    fn from(c: &dim_config::Config) -> Self {
        Self {
            work_area: (&c.work_area).into(),
            algorithm: (&c.algorithm).into(),
            timeouts: (&c.timeouts).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_maps_to_runtime_settings() {
        let cfg = dim_config::load_toml(
            r#"
            [work_area]
            floor_depth_mm = 1500
            min_object_height_mm = 10
            use_color_mask = true
            color_mask = [[0.1, 0.1], [0.1, 0.9], [0.9, 0.9], [0.9, 0.1]]

            [algorithm]
            sample_count = 3
            weight_units = "kg"
            time_to_start_ms = 750

            [timeouts]
            sample_ms = 2500
            "#,
        )
        .expect("parse");
        let s = Settings::from(&cfg);
        assert_eq!(s.work_area.cutoff_depth_mm(), 1490);
        assert!(s.work_area.algorithm_flags().color_aided);
        assert_eq!(s.work_area.color_mask[2], RelPoint::new(0.9, 0.9));
        assert_eq!(s.algorithm.sample_count, 3);
        assert_eq!(s.algorithm.weight_units, WeightUnits::Kg);
        assert_eq!(s.algorithm.time_to_start, Duration::from_millis(750));
        assert_eq!(s.timeouts.sample, Duration::from_millis(2500));
        assert_eq!(s.timeouts.supervisor_tick, Duration::from_millis(200));
    }
}
