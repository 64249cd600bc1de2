//! Maps `Box<dyn Error>` from trait boundaries to typed `CoreError`.
//!
//! Device traits in `dim_traits` return `Box<dyn Error + Send + Sync>`; this
//! module converts those to the core error enum, with an optional
//! feature-gated path for `dim_hardware::HwError` downcasting.

use crate::error::CoreError;

/// Map a trait-boundary error to a typed `CoreError`.
///
/// Known hardware error types are downcast first, then a string heuristic
/// decides between `Timeout` and `Device`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CoreError {
    #[cfg(feature = "hardware-errors")]
    {
        use dim_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => CoreError::Timeout,
                HwError::Engine(msg) => CoreError::Engine(msg.clone()),
                other => CoreError::Device(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CoreError::Timeout
    } else {
        CoreError::Device(s)
    }
}

/// Same as [`map_hw_error`] but for errors raised inside the volume engine,
/// where anything that is not a timeout is an engine failure.
pub fn map_engine_error(e: &(dyn std::error::Error + 'static)) -> CoreError {
    match map_hw_error(e) {
        CoreError::Device(msg) => CoreError::Engine(msg),
        other => other,
    }
}
