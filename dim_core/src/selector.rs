//! Once-per-calculation choice of measurement mode.

use dim_traits::{AlgorithmError, AlgorithmFlags, AlgorithmOutcome, ColorFrame, DepthFrame};

use crate::engine::EngineBinding;
use crate::error::CoreError;
use crate::status::CalculationStatus;

/// Pick the measurement mode from the first frame pair.
///
/// Invalid frames and an all-disabled flag set are rejected locally; object
/// detection is delegated to the engine.
pub fn select_algorithm(
    engine: &EngineBinding,
    depth: &DepthFrame,
    color: &ColorFrame,
    laser_mm: Option<i16>,
    flags: AlgorithmFlags,
) -> Result<AlgorithmOutcome, CoreError> {
    if !depth.is_valid() || !color.is_valid() {
        tracing::warn!(
            depth_ok = depth.is_valid(),
            color_ok = color.is_valid(),
            "algorithm selection: invalid frames"
        );
        return Ok(Err(AlgorithmError::DataInvalid));
    }
    if !flags.any() {
        tracing::warn!("algorithm selection: every measurement mode is disabled");
        return Ok(Err(AlgorithmError::NoAlgorithmsAllowed));
    }

    let outcome = engine.select_algorithm(depth, color, laser_mm, flags)?;
    match &outcome {
        Ok(sel) => tracing::info!(
            algorithm = %sel.choice,
            laser_used = sel.laser_used,
            "algorithm selected"
        ),
        Err(e) => tracing::info!(reason = %e, "algorithm selection failed"),
    }
    Ok(outcome)
}

/// Terminal status for a failed selection.
pub fn failure_status(e: AlgorithmError) -> CalculationStatus {
    match e {
        AlgorithmError::NoObjectFound => CalculationStatus::ObjectNotFound,
        AlgorithmError::DataInvalid | AlgorithmError::NoAlgorithmsAllowed => {
            CalculationStatus::FailedToSelectAlgorithm
        }
    }
}

/// Corrected range meter distance, if it is usable.
///
/// Readings that do not fit in `i16`, are not positive, or lie beyond the floor
/// are dropped so the engine falls back to depth-only distance estimation.
pub fn usable_laser_distance(raw_mm: i32, correction_mm: i32, floor_depth_mm: i16) -> Option<i16> {
    let corrected = raw_mm.saturating_add(correction_mm);
    let mm = i16::try_from(corrected).ok()?;
    (mm > 0 && mm <= floor_depth_mm).then_some(mm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ScriptedEngine;
    use dim_traits::{AlgorithmChoice, AlgorithmSelection};
    use rstest::rstest;

    fn frames() -> (DepthFrame, ColorFrame) {
        (
            DepthFrame::filled(4, 4, 1500),
            ColorFrame::new(4, 4, 3, vec![0; 48]),
        )
    }

    const ALL: AlgorithmFlags = AlgorithmFlags {
        depth_only: true,
        depth_perspective: true,
        color_aided: true,
    };

    #[test]
    fn invalid_frames_never_reach_engine() {
        let engine = ScriptedEngine::new();
        let calls = engine.calls();
        let binding = EngineBinding::new(Box::new(engine));
        let depth = DepthFrame::new(4, 4, vec![0; 3]);
        let (_, color) = frames();
        let out = select_algorithm(&binding, &depth, &color, None, ALL).unwrap();
        assert_eq!(out, Err(AlgorithmError::DataInvalid));
        assert_eq!(calls.select_count(), 0);
    }

    #[test]
    fn no_flags_is_no_algorithms_allowed() {
        let binding = EngineBinding::new(Box::new(ScriptedEngine::new()));
        let (d, c) = frames();
        let out = select_algorithm(&binding, &d, &c, None, AlgorithmFlags::default()).unwrap();
        assert_eq!(out, Err(AlgorithmError::NoAlgorithmsAllowed));
    }

    #[test]
    fn delegates_to_engine() {
        let engine = ScriptedEngine::new().with_selection(Ok(AlgorithmSelection {
            choice: AlgorithmChoice::DepthPerspective,
            laser_used: true,
        }));
        let binding = EngineBinding::new(Box::new(engine));
        let (d, c) = frames();
        let out = select_algorithm(&binding, &d, &c, Some(900), ALL).unwrap();
        assert_eq!(out.unwrap().choice, AlgorithmChoice::DepthPerspective);
    }

    #[rstest]
    #[case(AlgorithmError::NoObjectFound, CalculationStatus::ObjectNotFound)]
    #[case(AlgorithmError::DataInvalid, CalculationStatus::FailedToSelectAlgorithm)]
    #[case(
        AlgorithmError::NoAlgorithmsAllowed,
        CalculationStatus::FailedToSelectAlgorithm
    )]
    fn failure_mapping(#[case] e: AlgorithmError, #[case] want: CalculationStatus) {
        assert_eq!(failure_status(e), want);
    }

    #[rstest]
    #[case(1000, 0, 1805, Some(1000))]
    #[case(1000, -50, 1805, Some(950))]
    #[case(0, 0, 1805, None)]
    #[case(-3, 0, 1805, None)]
    #[case(1806, 0, 1805, None)]
    #[case(1805, 0, 1805, Some(1805))]
    #[case(70_000, 0, 1805, None)]
    fn laser_distance(
        #[case] raw: i32,
        #[case] corr: i32,
        #[case] floor: i16,
        #[case] want: Option<i16>,
    ) {
        assert_eq!(usable_laser_distance(raw, corr, floor), want);
    }
}
