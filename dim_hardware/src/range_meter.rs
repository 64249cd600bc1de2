use dim_traits::{DeviceError, RangeMeter};

use crate::error::HwError;

/// Laser rangefinder stand-in pointed at the top of the simulated box.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedRangeMeter {
    reading_mm: i32,
    online: bool,
}

impl SimulatedRangeMeter {
    pub fn new(reading_mm: i32) -> Self {
        Self {
            reading_mm,
            online: true,
        }
    }

    /// A meter that never answers.
    pub fn offline() -> Self {
        Self {
            reading_mm: 0,
            online: false,
        }
    }
}

impl RangeMeter for SimulatedRangeMeter {
    fn get_reading(&mut self) -> Result<i32, DeviceError> {
        if !self.online {
            return Err(Box::new(HwError::Timeout));
        }
        tracing::trace!(mm = self.reading_mm, "range meter reading (simulated)");
        Ok(self.reading_mm)
    }
}
