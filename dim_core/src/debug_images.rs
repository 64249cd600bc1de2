//! Debug snapshots of the first frame pair of each calculation.

use std::path::PathBuf;

use dim_traits::{ColorFrame, DepthFrame};
use eyre::{WrapErr, eyre};
use image::{GrayImage, ImageBuffer, Luma, Rgb, Rgba};

/// Range used to turn depth values into grey levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthRender {
    pub min_depth_mm: i16,
    pub max_depth_mm: i16,
    /// Values beyond this are background and rendered black.
    pub cutoff_depth_mm: i16,
}

pub trait DebugImageStore: Send {
    /// Persist one colour/depth pair under `stem` (`{barcode}_{index}`).
    fn save(
        &mut self,
        stem: &str,
        color: &ColorFrame,
        depth: &DepthFrame,
        render: DepthRender,
    ) -> eyre::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDebugImageStore;

impl DebugImageStore for NoopDebugImageStore {
    fn save(&mut self, _: &str, _: &ColorFrame, _: &DepthFrame, _: DepthRender) -> eyre::Result<()> {
        Ok(())
    }
}

/// Writes `{stem}_color.png` and `{stem}_depth.png` into a directory.
#[derive(Debug, Clone)]
pub struct PngDebugImageStore {
    dir: PathBuf,
}

impl PngDebugImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DebugImageStore for PngDebugImageStore {
    fn save(
        &mut self,
        stem: &str,
        color: &ColorFrame,
        depth: &DepthFrame,
        render: DepthRender,
    ) -> eyre::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .wrap_err_with(|| format!("creating {}", self.dir.display()))?;

        let color_path = self.dir.join(format!("{stem}_color.png"));
        let (w, h, data) = (color.width, color.height, color.data.clone());
        let saved = match color.bytes_per_pixel {
            1 => ImageBuffer::<Luma<u8>, _>::from_raw(w, h, data).map(|i| i.save(&color_path)),
            3 => ImageBuffer::<Rgb<u8>, _>::from_raw(w, h, data).map(|i| i.save(&color_path)),
            4 => ImageBuffer::<Rgba<u8>, _>::from_raw(w, h, data).map(|i| i.save(&color_path)),
            bpp => return Err(eyre!("unsupported colour format: {bpp} bytes per pixel")),
        };
        saved
            .ok_or_else(|| eyre!("colour buffer does not match {w}x{h}"))?
            .wrap_err_with(|| format!("writing {}", color_path.display()))?;

        let depth_path = self.dir.join(format!("{stem}_depth.png"));
        render_depth(depth, render)
            .ok_or_else(|| eyre!("depth buffer does not match {}x{}", depth.width, depth.height))?
            .save(&depth_path)
            .wrap_err_with(|| format!("writing {}", depth_path.display()))?;

        tracing::debug!(stem, dir = %self.dir.display(), "debug images saved");
        Ok(())
    }
}

/// Near objects bright, floor and invalid pixels black.
pub fn render_depth(depth: &DepthFrame, r: DepthRender) -> Option<GrayImage> {
    if !depth.is_valid() {
        return None;
    }
    let min = i32::from(r.min_depth_mm);
    let span = (i32::from(r.max_depth_mm) - min).max(1);
    let pixels = depth
        .data
        .iter()
        .map(|&v| {
            if v <= 0 || v > r.cutoff_depth_mm {
                return 0u8;
            }
            let rel = (i32::from(v) - min).clamp(0, span);
            (255 - rel * 255 / span) as u8
        })
        .collect();
    GrayImage::from_raw(depth.width, depth.height, pixels)
}
