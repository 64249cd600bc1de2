//! Camera frame types and the frame-source contract.
//!
//! Frames are shared behind `Arc` so one acquisition can fan out to several
//! subscribers without copying the pixel buffers. A subscriber only borrows a
//! frame for as long as it keeps the `Arc`.

use std::sync::Arc;

/// Depth map: row-major grid of signed 16-bit millimetre distances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<i16>,
}

impl DepthFrame {
    pub fn new(width: u32, height: u32, data: Vec<i16>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Frame filled with one distance value.
    pub fn filled(width: u32, height: u32, depth_mm: i16) -> Self {
        let len = (width as usize) * (height as usize);
        Self::new(width, height, vec![depth_mm; len])
    }

    /// A frame is usable when the buffer is non-empty and matches its size.
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && self.data.len() == (self.width as usize) * (self.height as usize)
    }

    pub fn at(&self, x: u32, y: u32) -> Option<i16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get((y as usize) * (self.width as usize) + (x as usize))
            .copied()
    }
}

/// Colour image with 1 (grey), 3 (RGB) or 4 (RGBA) bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u8,
    pub data: Vec<u8>,
}

impl ColorFrame {
    pub fn new(width: u32, height: u32, bytes_per_pixel: u8, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            bytes_per_pixel,
            data,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.bytes_per_pixel, 1 | 3 | 4)
            && !self.data.is_empty()
            && self.data.len()
                == (self.width as usize) * (self.height as usize) * (self.bytes_per_pixel as usize)
    }
}

/// Depth camera range reported by the frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthCameraParams {
    pub min_depth_mm: i16,
    pub max_depth_mm: i16,
    pub fov_x_deg: u16,
    pub fov_y_deg: u16,
}

impl Default for DepthCameraParams {
    fn default() -> Self {
        Self {
            min_depth_mm: 500,
            max_depth_mm: 4500,
            fov_x_deg: 70,
            fov_y_deg: 60,
        }
    }
}

/// Point in frame-relative coordinates, both axes in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelPoint {
    pub x: f64,
    pub y: f64,
}

impl RelPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in frame-relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RelRect {
    pub const FULL: RelRect = RelRect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };
}

/// One frame-ready notification.
#[derive(Debug, Clone)]
pub enum FrameEvent {
    Color(Arc<ColorFrame>),
    Depth(Arc<DepthFrame>),
}

pub type SubscriptionId = u64;

pub type FrameCallback = Arc<dyn Fn(&FrameEvent) + Send + Sync>;

/// Camera pipeline delivering colour and depth frames on its own thread.
///
/// Subscriptions are dynamic: a calculation subscribes when it starts and must
/// unsubscribe before it publishes its terminal result. After `unsubscribe`
/// returns, the callback is never invoked again.
pub trait FrameSource: Send + Sync {
    fn subscribe(&self, callback: FrameCallback) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
    fn depth_camera_params(&self) -> DepthCameraParams;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_frame_validity_checks_buffer_size() {
        assert!(DepthFrame::filled(4, 3, 1000).is_valid());
        assert!(!DepthFrame::new(4, 3, vec![0; 11]).is_valid());
        assert!(!DepthFrame::new(0, 0, Vec::new()).is_valid());
    }

    #[test]
    fn color_frame_validity_checks_bpp() {
        assert!(ColorFrame::new(2, 2, 3, vec![0; 12]).is_valid());
        assert!(ColorFrame::new(2, 2, 1, vec![0; 4]).is_valid());
        assert!(!ColorFrame::new(2, 2, 2, vec![0; 8]).is_valid());
        assert!(!ColorFrame::new(2, 2, 4, vec![0; 12]).is_valid());
    }

    #[test]
    fn depth_at_is_row_major() {
        let f = DepthFrame::new(3, 2, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(f.at(0, 0), Some(1));
        assert_eq!(f.at(2, 1), Some(6));
        assert_eq!(f.at(3, 0), None);
    }
}
