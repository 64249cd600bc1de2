//! Session state owned by the orchestrator.

use dim_traits::{MeasurementStatus, ScaleMeasurement};

use crate::config::AlgorithmSettings;

/// Weight changes at or below this are scale noise.
pub const WEIGHT_EPSILON_GR: f64 = 1.0;

/// Smallest weight that counts as "something is on the scale".
pub const MIN_READY_WEIGHT_GR: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalculationContext {
    pub barcode: String,
    pub weight: ScaleMeasurement,
    /// External UI lock; suppresses auto-start.
    pub is_locked: bool,
    pub auto_start_cancelled: bool,
    pub calculation_running: bool,
    /// Set by every terminal result; cleared once the scale reads Ready.
    pub waiting_for_scale_reset: bool,
}

impl CalculationContext {
    pub fn code_ready(&self, algorithm: &AlgorithmSettings) -> bool {
        !algorithm.require_barcode || !self.barcode.is_empty()
    }

    pub fn weight_ready(&self) -> bool {
        self.weight.status == MeasurementStatus::Measured
            && self.weight.weight_gr > MIN_READY_WEIGHT_GR
    }

    pub fn auto_start_eligible(&self, algorithm: &AlgorithmSettings) -> bool {
        self.code_ready(algorithm)
            && self.weight_ready()
            && !self.is_locked
            && !self.auto_start_cancelled
            && !self.calculation_running
    }

    /// Store a scanned code. Returns `false` when ignored.
    pub fn apply_barcode(&mut self, code: String) -> bool {
        if self.calculation_running {
            return false;
        }
        self.barcode = code;
        self.auto_start_cancelled = false;
        true
    }

    /// Store a scale reading, minus the pallet weight when subtraction is on.
    ///
    /// Re-arms auto-start when the weight moved by more than
    /// [`WEIGHT_EPSILON_GR`] or the scale status changed. Returns `false` when
    /// the reading was ignored.
    pub fn apply_weight(&mut self, m: ScaleMeasurement, algorithm: &AlgorithmSettings) -> bool {
        if self.calculation_running || !m.weight_gr.is_finite() {
            return false;
        }
        let weight_gr = if algorithm.enable_pallet_subtraction {
            m.weight_gr - algorithm.pallet_weight_gr
        } else {
            m.weight_gr
        };
        let changed = (weight_gr - self.weight.weight_gr).abs() > WEIGHT_EPSILON_GR
            || m.status != self.weight.status;
        self.weight = ScaleMeasurement::new(m.status, weight_gr);
        if changed {
            self.auto_start_cancelled = false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured(g: f64) -> ScaleMeasurement {
        ScaleMeasurement::new(MeasurementStatus::Measured, g)
    }

    #[test]
    fn eligibility_requires_every_condition() {
        let algo = AlgorithmSettings::default();
        let mut ctx = CalculationContext {
            barcode: "A1".into(),
            weight: measured(500.0),
            ..Default::default()
        };
        assert!(ctx.auto_start_eligible(&algo));

        ctx.is_locked = true;
        assert!(!ctx.auto_start_eligible(&algo));
        ctx.is_locked = false;

        ctx.auto_start_cancelled = true;
        assert!(!ctx.auto_start_eligible(&algo));
        ctx.auto_start_cancelled = false;

        ctx.barcode.clear();
        assert!(!ctx.auto_start_eligible(&algo));
        let no_code = AlgorithmSettings {
            require_barcode: false,
            ..Default::default()
        };
        assert!(ctx.auto_start_eligible(&no_code));

        ctx.weight = measured(0.0);
        assert!(!ctx.auto_start_eligible(&no_code));
    }

    #[test]
    fn small_weight_jitter_does_not_rearm() {
        let algo = AlgorithmSettings::default();
        let mut ctx = CalculationContext::default();
        ctx.apply_weight(measured(500.0), &algo);
        ctx.auto_start_cancelled = true;

        ctx.apply_weight(measured(500.6), &algo);
        assert!(ctx.auto_start_cancelled);

        ctx.apply_weight(measured(502.0), &algo);
        assert!(!ctx.auto_start_cancelled);
    }

    #[test]
    fn status_change_rearms() {
        let algo = AlgorithmSettings::default();
        let mut ctx = CalculationContext::default();
        ctx.apply_weight(measured(500.0), &algo);
        ctx.auto_start_cancelled = true;
        ctx.apply_weight(ScaleMeasurement::new(MeasurementStatus::Measuring, 500.0), &algo);
        assert!(!ctx.auto_start_cancelled);
    }

    #[test]
    fn pallet_weight_is_subtracted() {
        let algo = AlgorithmSettings {
            enable_pallet_subtraction: true,
            pallet_weight_gr: 20_000.0,
            ..Default::default()
        };
        let mut ctx = CalculationContext::default();
        ctx.apply_weight(measured(25_000.0), &algo);
        assert_eq!(ctx.weight.weight_gr, 5_000.0);
    }

    #[test]
    fn updates_ignored_while_running() {
        let algo = AlgorithmSettings::default();
        let mut ctx = CalculationContext {
            calculation_running: true,
            ..Default::default()
        };
        assert!(!ctx.apply_barcode("X".into()));
        assert!(!ctx.apply_weight(measured(10.0), &algo));
        assert!(ctx.barcode.is_empty());
    }
}
