//! Calculation status published to subscribers.

/// Lifecycle of one calculation as seen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CalculationStatus {
    #[default]
    Undefined,
    /// Auto-start countdown is running.
    Pending,
    InProgress,
    Successful,
    BarcodeNotEntered,
    WeightNotStable,
    FailedToCloseFiles,
    FailedToSelectAlgorithm,
    ObjectNotFound,
    TimedOut,
    AbortedByUser,
    Error,
}

impl CalculationStatus {
    /// Statuses that end a `start_calculation` invocation.
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            CalculationStatus::Undefined | CalculationStatus::Pending | CalculationStatus::InProgress
        )
    }

    /// Failures reported before any sampling began.
    pub fn is_precondition_failure(self) -> bool {
        matches!(
            self,
            CalculationStatus::BarcodeNotEntered
                | CalculationStatus::WeightNotStable
                | CalculationStatus::FailedToCloseFiles
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CalculationStatus::Undefined => "undefined",
            CalculationStatus::Pending => "pending",
            CalculationStatus::InProgress => "in_progress",
            CalculationStatus::Successful => "successful",
            CalculationStatus::BarcodeNotEntered => "barcode_not_entered",
            CalculationStatus::WeightNotStable => "weight_not_stable",
            CalculationStatus::FailedToCloseFiles => "failed_to_close_files",
            CalculationStatus::FailedToSelectAlgorithm => "failed_to_select_algorithm",
            CalculationStatus::ObjectNotFound => "object_not_found",
            CalculationStatus::TimedOut => "timed_out",
            CalculationStatus::AbortedByUser => "aborted_by_user",
            CalculationStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for CalculationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse status shown on a station dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardStatus {
    Ready,
    Pending,
    InProgress,
    Finished,
    Error,
}

impl From<CalculationStatus> for DashboardStatus {
    fn from(s: CalculationStatus) -> Self {
        match s {
            CalculationStatus::Successful => DashboardStatus::Finished,
            CalculationStatus::InProgress => DashboardStatus::InProgress,
            CalculationStatus::Pending => DashboardStatus::Pending,
            CalculationStatus::Undefined => DashboardStatus::Ready,
            _ => DashboardStatus::Error,
        }
    }
}
