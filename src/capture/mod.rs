//! Screen-region capture.
//!
//! This module provides:
//! - The capture rectangle (`CaptureRegion`) and its clamping rules
//! - The `ScreenSource` seam the monitor captures through
//! - A GDI backend reading the desktop (`GdiScreen`, Windows only)

#[cfg(windows)]
pub mod screen;

#[cfg(windows)]
pub use screen::{primary_screen_size, GdiScreen};

use anyhow::{anyhow, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// A rectangle in screen-pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl CaptureRegion {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Returns the region with a non-negative origin and at least 1x1 size.
    pub fn clamped(&self) -> Self {
        Self {
            left: self.left.max(0),
            top: self.top.max(0),
            width: self.width.max(1),
            height: self.height.max(1),
        }
    }
}

impl std::fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Default watch area for a screen of the given size: the lower-left block
/// where most games draw their chat.
pub fn default_region(screen_width: i32, screen_height: i32) -> CaptureRegion {
    CaptureRegion {
        left: 10,
        top: (screen_height as f64 * 0.62) as i32,
        width: (screen_width as f64 * 0.45) as i32,
        height: (screen_height as f64 * 0.22) as i32,
    }
    .clamped()
}

/// Something that can read pixels off the screen.
///
/// `grab` always receives a clamped region.
pub trait ScreenSource: Send {
    fn grab(&mut self, region: &CaptureRegion) -> Result<RgbImage>;
}

/// Captures `region` after clamping it, returning an RGB image of exactly
/// the clamped size.
pub fn capture(source: &mut dyn ScreenSource, region: &CaptureRegion) -> Result<RgbImage> {
    let region = region.clamped();
    let img = source.grab(&region)?;

    let expected = (region.width as u32, region.height as u32);
    if img.dimensions() != expected {
        return Err(anyhow!(
            "Capture returned {}x{}, expected {}x{}",
            img.width(),
            img.height(),
            expected.0,
            expected.1
        ));
    }

    Ok(img)
}

/// Converts a tightly packed top-down BGRA buffer to RGB.
pub(crate) fn bgra_to_rgb(bgra: &[u8], width: u32, height: u32) -> Result<RgbImage> {
    let expected = width as usize * height as usize * 4;
    if bgra.len() != expected {
        return Err(anyhow!(
            "Pixel buffer has {} bytes, expected {}",
            bgra.len(),
            expected
        ));
    }

    let rgb: Vec<u8> = bgra
        .chunks_exact(4)
        .flat_map(|px| [px[2], px[1], px[0]])
        .collect();

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| anyhow!("Failed to build {}x{} image", width, height))
}
