use anyhow::{anyhow, Result};
use tracing::instrument;
use windows::Win32::{
    Foundation::HWND,
    Graphics::Gdi::{GetDC, GetDeviceCaps, ReleaseDC, HORZRES, HORZSIZE},
};

use super::{DisplayGeometry, DisplaySize};

pub struct WindowsDisplayGeometry;

impl WindowsDisplayGeometry {
    pub fn new() -> Self {
        Self
    }
}

impl DisplayGeometry for WindowsDisplayGeometry {
    /// Uses the device context of the whole screen, which belongs to the primary display.
    #[instrument(skip(self))]
    fn primary_display(&mut self) -> Result<DisplaySize> {
        let desktop = HWND::default();
        let hdc = unsafe { GetDC(desktop) };
        if hdc.is_invalid() {
            return Err(anyhow!("Failed to get screen device context"));
        }

        let width_mm = unsafe { GetDeviceCaps(hdc, HORZSIZE) };
        let width_points = unsafe { GetDeviceCaps(hdc, HORZRES) };
        unsafe { ReleaseDC(desktop, hdc) };

        Ok(DisplaySize {
            width_mm: width_mm as f64,
            width_points: width_points as f64,
        })
    }
}
