//! Synthetic top-down scene: a flat floor with one box in the middle.

use dim_traits::{ColorFrame, DepthFrame, DimensionEstimate};

const FLOOR_SHADE: u8 = 60;
const OBJECT_SHADE: u8 = 200;

/// Geometry of the simulated work area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimScene {
    pub width: u32,
    pub height: u32,
    pub floor_depth_mm: i16,
    /// Floor footprint of one depth pixel.
    pub mm_per_px: i32,
    /// Box on the floor; a zero-sized box leaves the floor empty.
    pub object: DimensionEstimate,
}

impl Default for SimScene {
    fn default() -> Self {
        Self {
            width: 80,
            height: 60,
            floor_depth_mm: 1805,
            mm_per_px: 25,
            object: DimensionEstimate::new(400, 300, 200),
        }
    }
}

impl SimScene {
    pub fn empty(mut self) -> Self {
        self.object = DimensionEstimate::ZERO;
        self
    }

    /// Pixel rectangle covered by the object as `(x0, y0, x1, y1)`, exclusive.
    fn object_rect(&self) -> Option<(u32, u32, u32, u32)> {
        let o = self.object;
        if o.length_mm <= 0 || o.width_mm <= 0 || o.height_mm <= 0 {
            return None;
        }
        let step = self.mm_per_px.max(1);
        let px = |mm: i32, limit: u32| u32::try_from(mm / step).unwrap_or(0).clamp(1, limit);
        let w = px(o.length_mm, self.width);
        let h = px(o.width_mm, self.height);
        let x0 = (self.width - w) / 2;
        let y0 = (self.height - h) / 2;
        Some((x0, y0, x0 + w, y0 + h))
    }

    fn covers(&self, x: u32, y: u32) -> bool {
        self.object_rect()
            .is_some_and(|(x0, y0, x1, y1)| (x0..x1).contains(&x) && (y0..y1).contains(&y))
    }

    pub fn render_depth(&self) -> DepthFrame {
        let top = i32::from(self.floor_depth_mm) - self.object.height_mm;
        let top = i16::try_from(top.max(1)).unwrap_or(self.floor_depth_mm);
        let data = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .map(|(x, y)| if self.covers(x, y) { top } else { self.floor_depth_mm })
            .collect();
        DepthFrame::new(self.width, self.height, data)
    }

    pub fn render_color(&self) -> ColorFrame {
        let mut data = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let shade = if self.covers(x, y) { OBJECT_SHADE } else { FLOOR_SHADE };
                data.extend_from_slice(&[shade, shade, shade]);
            }
        }
        ColorFrame::new(self.width, self.height, 3, data)
    }
}
