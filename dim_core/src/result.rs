//! Final result composition and pallet correction.

use chrono::{DateTime, Local};
use dim_traits::{AlgorithmChoice, DimensionEstimate};

use crate::config::{AlgorithmSettings, WeightUnits};
use crate::status::CalculationStatus;

/// Operator input accompanying a manual start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculationRequest {
    pub barcode: String,
    pub unit_count: u32,
    pub comment: String,
}

impl CalculationRequest {
    pub fn new(barcode: impl Into<String>) -> Self {
        Self {
            barcode: barcode.into(),
            unit_count: 1,
            comment: String::new(),
        }
    }

    pub fn with_unit_count(mut self, unit_count: u32) -> Self {
        self.unit_count = unit_count;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalculationResult {
    pub timestamp: DateTime<Local>,
    pub barcode: String,
    pub weight: f64,
    pub weight_units: WeightUnits,
    pub unit_count: u32,
    pub length_mm: i32,
    pub width_mm: i32,
    pub height_mm: i32,
    pub volume_mm3: i64,
    pub comment: String,
    pub pallet_subtracted: bool,
}

impl CalculationResult {
    pub fn empty(timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            barcode: String::new(),
            weight: 0.0,
            weight_units: WeightUnits::Gr,
            unit_count: 0,
            length_mm: 0,
            width_mm: 0,
            height_mm: 0,
            volume_mm3: 0,
            comment: String::new(),
            pallet_subtracted: false,
        }
    }
}

/// Everything published for one finished `start_calculation`.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationResultData {
    pub status: CalculationStatus,
    pub result: CalculationResult,
    pub calculation_index: Option<u64>,
    pub algorithm: Option<AlgorithmChoice>,
    pub laser_used: bool,
    pub elapsed_ms: u64,
}

impl CalculationResultData {
    /// Result for a calculation that never sampled.
    pub fn empty(status: CalculationStatus) -> Self {
        Self {
            status,
            result: CalculationResult::empty(Local::now()),
            calculation_index: None,
            algorithm: None,
            laser_used: false,
            elapsed_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PalletCorrected {
    pub unit_count: u32,
    pub length_mm: i32,
    pub width_mm: i32,
    pub height_mm: i32,
    pub volume_mm3: i64,
}

/// Remove the pallet from a stacked multi-unit measurement.
///
/// Footprint is split over half the units (at least one), and the pallet
/// height is taken off the stack height.
pub fn pallet_correction(
    dims: DimensionEstimate,
    unit_count: u32,
    pallet_height_mm: i32,
) -> PalletCorrected {
    let units = (unit_count / 2).max(1);
    let divisor = i32::try_from(units).unwrap_or(i32::MAX);
    let length_mm = dims.length_mm / divisor;
    let width_mm = dims.width_mm / divisor;
    let height_mm = dims.height_mm.saturating_sub(pallet_height_mm);
    PalletCorrected {
        unit_count: units,
        length_mm,
        width_mm,
        height_mm,
        volume_mm3: DimensionEstimate::new(length_mm, width_mm, height_mm).volume_mm3(),
    }
}

/// Inputs captured when a calculation starts.
#[derive(Debug, Clone)]
pub struct CalculationSnapshot {
    pub timestamp: DateTime<Local>,
    pub barcode: String,
    pub unit_count: u32,
    pub comment: String,
    pub weight_gr: f64,
    pub calculation_index: Option<u64>,
}

/// Build the published result from the snapshot and the collector's outcome.
///
/// Dimensions are zero unless the calculation succeeded.
pub fn compose_result(
    snapshot: &CalculationSnapshot,
    status: CalculationStatus,
    dims: DimensionEstimate,
    algorithm: &AlgorithmSettings,
) -> CalculationResult {
    let succeeded = status == CalculationStatus::Successful;
    let pallet = succeeded && algorithm.enable_pallet_subtraction;
    let (length_mm, width_mm, height_mm, volume_mm3) = match (succeeded, pallet) {
        (true, true) => {
            let c = pallet_correction(dims, snapshot.unit_count, algorithm.pallet_height_mm);
            (c.length_mm, c.width_mm, c.height_mm, c.volume_mm3)
        }
        (true, false) => (dims.length_mm, dims.width_mm, dims.height_mm, dims.volume_mm3()),
        _ => (0, 0, 0, 0),
    };
    CalculationResult {
        timestamp: snapshot.timestamp,
        barcode: snapshot.barcode.clone(),
        weight: algorithm.weight_units.from_grams(snapshot.weight_gr),
        weight_units: algorithm.weight_units,
        unit_count: snapshot.unit_count,
        length_mm,
        width_mm,
        height_mm,
        volume_mm3,
        comment: snapshot.comment.clone(),
        pallet_subtracted: pallet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn pallet_example() {
        let c = pallet_correction(DimensionEstimate::new(100, 50, 30), 4, 10);
        assert_eq!(
            c,
            PalletCorrected {
                unit_count: 2,
                length_mm: 50,
                width_mm: 25,
                height_mm: 20,
                volume_mm3: 25_000,
            }
        );
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(2, 1)]
    #[case(3, 1)]
    #[case(5, 2)]
    #[case(9, 4)]
    fn corrected_unit_count_is_at_least_one(#[case] units: u32, #[case] want: u32) {
        let c = pallet_correction(DimensionEstimate::new(100, 100, 100), units, 0);
        assert_eq!(c.unit_count, want);
    }

    fn snapshot() -> CalculationSnapshot {
        CalculationSnapshot {
            timestamp: Local::now(),
            barcode: "PKG-1".into(),
            unit_count: 4,
            comment: "fragile".into(),
            weight_gr: 2500.0,
            calculation_index: Some(3),
        }
    }

    #[test]
    fn failed_result_has_zero_dimensions() {
        let algo = AlgorithmSettings {
            enable_pallet_subtraction: true,
            pallet_height_mm: 10,
            ..Default::default()
        };
        let r = compose_result(
            &snapshot(),
            CalculationStatus::TimedOut,
            DimensionEstimate::new(1, 2, 3),
            &algo,
        );
        assert_eq!((r.length_mm, r.width_mm, r.height_mm, r.volume_mm3), (0, 0, 0, 0));
        assert!(!r.pallet_subtracted);
        assert_eq!(r.barcode, "PKG-1");
    }

    #[test]
    fn weight_is_reported_in_configured_units() {
        let algo = AlgorithmSettings {
            weight_units: WeightUnits::Kg,
            ..Default::default()
        };
        let r = compose_result(
            &snapshot(),
            CalculationStatus::Successful,
            DimensionEstimate::new(100, 50, 30),
            &algo,
        );
        assert_eq!(r.weight, 2.5);
        assert_eq!(r.volume_mm3, 150_000);
        assert_eq!(r.comment, "fragile");
    }
}
