//! Human-readable error descriptions and structured JSON error formatting.

use dim_core::CalculationStatus;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use dim_core::error::{BuildError, CoreError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingEngine => {
                "What happened: No volume engine was provided to the orchestrator.\nLikely causes: The engine failed to initialize or was not passed to the builder.\nHow to fix: Ensure the engine is created successfully and passed via with_engine(...).".to_string()
            }
            BuildError::MissingFrameSource => {
                "What happened: No camera was provided to the orchestrator.\nLikely causes: The camera pipeline failed to start.\nHow to fix: Check the camera connection, then pass it via with_frame_source(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return match ce {
            CoreError::Timeout => "What happened: Camera frames did not arrive in time.\nLikely causes: Depth stream stalled, camera unplugged, or timeouts.sample_ms too low.\nHow to fix: Check the camera cable and power, and consider increasing timeouts.sample_ms in the config.".to_string(),
            CoreError::Engine(msg) => format!(
                "What happened: The volume engine failed ({msg}).\nLikely causes: Invalid frames or a work area the engine rejects.\nHow to fix: Re-measure the floor depth and check [work_area] in the config."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("sample script csv must have headers") {
        return "Invalid headers in sample script CSV. Expected 'length_mm,width_mm,height_mm'.".to_string();
    }

    if lower.contains("read config") || lower.contains("parse config") {
        return format!(
            "What happened: Could not load the configuration.\nLikely causes: Wrong --config path or malformed TOML.\nHow to fix: Check the file exists and is valid TOML. Original: {msg}"
        );
    }

    if lower.starts_with("work_area.")
        || lower.starts_with("algorithm.")
        || lower.starts_with("timeouts.")
        || lower.starts_with("general.")
        || lower.starts_with("hardware.")
    {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Operator-facing explanation of a failed calculation.
pub fn describe_status(status: CalculationStatus) -> String {
    use CalculationStatus::*;
    match status {
        BarcodeNotEntered => "What happened: No barcode was entered.\nLikely causes: The parcel was not scanned.\nHow to fix: Pass --barcode, or set algorithm.require_barcode = false.".to_string(),
        WeightNotStable => "What happened: The scale has not settled.\nLikely causes: Parcel still moving or scale not zeroed.\nHow to fix: Wait for a stable reading, then retry.".to_string(),
        FailedToCloseFiles => "What happened: The result file is locked.\nLikely causes: The result spreadsheet is open in another program.\nHow to fix: Close it (or remove general.result_lock_file) and retry.".to_string(),
        FailedToSelectAlgorithm => "What happened: No measurement mode could be used.\nLikely causes: All modes disabled, or the frames were invalid.\nHow to fix: Enable at least one of enable_dm, enable_perspective_dm, enable_rgb and check the masks.".to_string(),
        ObjectNotFound => "What happened: No object was found in the work area.\nLikely causes: Empty platform, object outside the mask, or floor depth out of date.\nHow to fix: Centre the parcel and re-run floor-depth if the camera moved.".to_string(),
        TimedOut => "What happened: Camera frames did not arrive in time.\nLikely causes: Depth stream stalled or timeouts.sample_ms too low.\nHow to fix: Check the camera and consider increasing timeouts.sample_ms.".to_string(),
        AbortedByUser => "What happened: Calculation aborted by user.".to_string(),
        Error => "What happened: The calculation failed.\nLikely causes: Volume engine error.\nHow to fix: Re-run with --log-level=debug for details.".to_string(),
        other => format!("What happened: Calculation ended with status {other}."),
    }
}

/// Stable exit codes per terminal status; 0 only on success.
pub fn exit_code_for_status(status: CalculationStatus) -> i32 {
    use CalculationStatus::*;
    match status {
        Successful => 0,
        AbortedByUser => 3,
        TimedOut => 4,
        ObjectNotFound => 5,
        FailedToSelectAlgorithm => 6,
        s if s.is_precondition_failure() => 7,
        _ => 1,
    }
}

/// Exit code for errors that prevented a calculation from finishing.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use dim_core::error::CoreError;
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::Timeout) => exit_code_for_status(CalculationStatus::TimedOut),
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use dim_core::error::CoreError;
    use serde_json::json;

    let reason = match err.downcast_ref::<CoreError>() {
        Some(CoreError::Timeout) => "Timeout",
        Some(CoreError::Engine(_)) => "Engine",
        Some(CoreError::Config(_)) => "Config",
        _ => "Error",
    };
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dim_core::error::CoreError;

    #[test]
    fn timeout_is_humanized() {
        let err = eyre::Report::new(CoreError::Timeout);
        assert!(humanize(&err).starts_with("What happened: Camera frames did not arrive"));
        assert_eq!(exit_code_for_error(&err), 4);
    }

    #[test]
    fn config_messages_are_recognized() {
        let err = eyre::eyre!("algorithm.sample_count must be >= 1");
        assert!(humanize(&err).contains("Configuration is invalid"));
    }

    #[test]
    fn only_success_exits_zero() {
        assert_eq!(exit_code_for_status(CalculationStatus::Successful), 0);
        assert_ne!(exit_code_for_status(CalculationStatus::Error), 0);
        assert_eq!(
            exit_code_for_status(CalculationStatus::WeightNotStable),
            exit_code_for_status(CalculationStatus::BarcodeNotEntered)
        );
        assert_eq!(exit_code_for_status(CalculationStatus::FailedToCloseFiles), 7);
    }
}
