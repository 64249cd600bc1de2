//! Software stand-in for the native volume library.
//!
//! Object pixels are those closer than the cutoff depth. Dimensions come from
//! their bounding box unless a sample script is loaded, in which case the
//! scripted estimates are returned in order and the script wraps around.

use dim_traits::{
    AlgorithmChoice, AlgorithmError, AlgorithmFlags, AlgorithmOutcome, AlgorithmSelection,
    ColorFrame, DepthFrame, DeviceError, DimensionEstimate, EngineSettings, VolumeEngine,
};

use crate::error::HwError;
use crate::util::positive_median;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Footprint {
    cols: i32,
    rows: i32,
    top_mm: i16,
}

pub struct SimulatedEngine {
    mm_per_px: i32,
    settings: Option<EngineSettings>,
    script: Vec<DimensionEstimate>,
    cursor: usize,
}

impl SimulatedEngine {
    pub fn new(mm_per_px: i32) -> Self {
        Self {
            mm_per_px: mm_per_px.max(1),
            settings: None,
            script: Vec::new(),
            cursor: 0,
        }
    }

    pub fn with_script(mut self, script: Vec<DimensionEstimate>) -> Self {
        self.script = script;
        self.cursor = 0;
        self
    }

    fn settings(&self) -> Result<EngineSettings, HwError> {
        self.settings
            .ok_or_else(|| HwError::Engine("work area not set".into()))
    }

    fn footprint(depth: &DepthFrame, cutoff_mm: i16) -> Option<Footprint> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        let mut top = i16::MAX;
        for y in 0..depth.height {
            for x in 0..depth.width {
                let Some(d) = depth.at(x, y) else { continue };
                if d <= 0 || d >= cutoff_mm {
                    continue;
                }
                top = top.min(d);
                bounds = Some(match bounds {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        let (x0, y0, x1, y1) = bounds?;
        Some(Footprint {
            cols: i32::try_from(x1 - x0 + 1).unwrap_or(i32::MAX),
            rows: i32::try_from(y1 - y0 + 1).unwrap_or(i32::MAX),
            top_mm: top,
        })
    }

    fn check_frames(depth: &DepthFrame, color: &ColorFrame) -> Result<(), HwError> {
        if !depth.is_valid() {
            return Err(HwError::Frame("depth buffer does not match its size".into()));
        }
        if !color.is_valid() {
            return Err(HwError::Frame("colour buffer does not match its size".into()));
        }
        Ok(())
    }
}

impl VolumeEngine for SimulatedEngine {
    fn set_work_area(&mut self, settings: &EngineSettings) -> Result<(), DeviceError> {
        if settings.cutoff_depth_mm <= 0 || settings.cutoff_depth_mm > settings.floor_depth_mm {
            return Err(Box::new(HwError::Engine(format!(
                "cutoff {} outside floor depth {}",
                settings.cutoff_depth_mm, settings.floor_depth_mm
            ))));
        }
        tracing::debug!(
            floor = settings.floor_depth_mm,
            cutoff = settings.cutoff_depth_mm,
            "simulated engine work area set"
        );
        self.settings = Some(*settings);
        Ok(())
    }

    fn calculate_floor_depth(&mut self, depth: &DepthFrame) -> Result<i16, DeviceError> {
        if !depth.is_valid() {
            return Err(Box::new(HwError::Frame("depth buffer does not match its size".into())));
        }
        positive_median(&depth.data)
            .ok_or_else(|| Box::new(HwError::Engine("depth frame has no readings".into())) as DeviceError)
    }

    fn select_algorithm(
        &mut self,
        depth: &DepthFrame,
        color: &ColorFrame,
        laser_mm: Option<i16>,
        flags: AlgorithmFlags,
    ) -> Result<AlgorithmOutcome, DeviceError> {
        if Self::check_frames(depth, color).is_err() {
            return Ok(Err(AlgorithmError::DataInvalid));
        }
        if !flags.any() {
            return Ok(Err(AlgorithmError::NoAlgorithmsAllowed));
        }
        let settings = self.settings()?;
        if Self::footprint(depth, settings.cutoff_depth_mm).is_none() {
            return Ok(Err(AlgorithmError::NoObjectFound));
        }
        let selection = if laser_mm.is_some() && flags.depth_perspective {
            AlgorithmSelection {
                choice: AlgorithmChoice::DepthPerspective,
                laser_used: true,
            }
        } else {
            let choice = if flags.depth_only {
                AlgorithmChoice::DepthOnly
            } else if flags.depth_perspective {
                AlgorithmChoice::DepthPerspective
            } else {
                AlgorithmChoice::ColorAided
            };
            AlgorithmSelection {
                choice,
                laser_used: false,
            }
        };
        Ok(Ok(selection))
    }

    fn calculate_volume(
        &mut self,
        depth: &DepthFrame,
        color: &ColorFrame,
        laser_mm: Option<i16>,
        algorithm: AlgorithmChoice,
    ) -> Result<Option<DimensionEstimate>, DeviceError> {
        Self::check_frames(depth, color)?;
        if !self.script.is_empty() {
            let next = self.script[self.cursor % self.script.len()];
            self.cursor += 1;
            return Ok(Some(next));
        }
        let settings = self.settings()?;
        let Some(fp) = Self::footprint(depth, settings.cutoff_depth_mm) else {
            return Ok(None);
        };
        let top = match (algorithm, laser_mm) {
            (AlgorithmChoice::DepthPerspective, Some(laser)) => laser,
            _ => fp.top_mm,
        };
        let a = fp.cols * self.mm_per_px;
        let b = fp.rows * self.mm_per_px;
        Ok(Some(DimensionEstimate::new(
            a.max(b),
            a.min(b),
            i32::from(settings.floor_depth_mm) - i32::from(top),
        )))
    }
}
