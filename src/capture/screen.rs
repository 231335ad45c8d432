//! Desktop capture through GDI.
//!
//! Reads straight from the screen DC, so nothing about the window under the
//! region (focus, z-order, owning process) matters and nothing is activated.

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::ffi::c_void;

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT, DIB_RGB_COLORS,
    HBITMAP, HDC, HGDIOBJ, ROP_CODE, SRCCOPY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

use super::{bgra_to_rgb, CaptureRegion, ScreenSource};

/// Captures screen rectangles with `BitBlt` from the desktop DC.
#[derive(Default)]
pub struct GdiScreen;

impl ScreenSource for GdiScreen {
    fn grab(&mut self, region: &CaptureRegion) -> Result<RgbImage> {
        unsafe { grab_desktop(region) }
    }
}

/// Returns the primary monitor size in pixels.
pub fn primary_screen_size() -> (i32, i32) {
    unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) }
}

struct ScreenDc(HDC);

impl Drop for ScreenDc {
    fn drop(&mut self) {
        unsafe {
            let _ = ReleaseDC(HWND::default(), self.0);
        }
    }
}

struct MemoryDc(HDC);

impl Drop for MemoryDc {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteDC(self.0);
        }
    }
}

struct Bitmap(HBITMAP);

impl Drop for Bitmap {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(HGDIOBJ(self.0 .0));
        }
    }
}

unsafe fn grab_desktop(region: &CaptureRegion) -> Result<RgbImage> {
    let (width, height) = (region.width, region.height);

    unsafe {
        let screen_dc = GetDC(HWND::default());
        if screen_dc.is_invalid() {
            return Err(anyhow!("GetDC failed for the desktop"));
        }
        let screen_dc = ScreenDc(screen_dc);

        let mem_dc = CreateCompatibleDC(screen_dc.0);
        if mem_dc.is_invalid() {
            return Err(anyhow!("CreateCompatibleDC failed"));
        }
        let mem_dc = MemoryDc(mem_dc);

        let bitmap = CreateCompatibleBitmap(screen_dc.0, width, height);
        if bitmap.is_invalid() {
            return Err(anyhow!("CreateCompatibleBitmap failed for {}", region));
        }
        let bitmap = Bitmap(bitmap);

        // CAPTUREBLT includes layered windows (overlays) in the copy
        let previous = SelectObject(mem_dc.0, HGDIOBJ(bitmap.0 .0));
        let blit = BitBlt(
            mem_dc.0,
            0,
            0,
            width,
            height,
            screen_dc.0,
            region.left,
            region.top,
            ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
        );
        let _ = SelectObject(mem_dc.0, previous);
        blit.map_err(|e| anyhow!("BitBlt failed for {}: {}", region, e))?;

        // Negative height = top-down rows
        let mut info = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB.0,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut bgra = vec![0u8; width as usize * height as usize * 4];
        let lines = GetDIBits(
            mem_dc.0,
            bitmap.0,
            0,
            height as u32,
            Some(bgra.as_mut_ptr() as *mut c_void),
            &mut info,
            DIB_RGB_COLORS,
        );
        if lines != height {
            return Err(anyhow!(
                "GetDIBits copied {} of {} rows",
                lines.max(0),
                height
            ));
        }

        bgra_to_rgb(&bgra, width as u32, height as u32)
    }
}
