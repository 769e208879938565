use anyhow::{anyhow, Result};
use tracing::instrument;
use xcb::Connection;

use super::{DisplayGeometry, DisplaySize};

pub struct X11DisplayGeometry {
    connection: Connection,
    preferred_screen: i32,
}

impl X11DisplayGeometry {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = xcb::Connection::connect(None)?;
        Ok(Self {
            connection,
            preferred_screen,
        })
    }
}

impl DisplayGeometry for X11DisplayGeometry {
    /// Currently the application only supports 1 x11 screen. The screen reports its size in
    /// both millimetres and pixels, which is all the conversion needs.
    #[instrument(skip(self))]
    fn primary_display(&mut self) -> Result<DisplaySize> {
        let setup = self.connection.get_setup();
        let screen = setup
            .roots()
            .nth(self.preferred_screen.max(0) as usize)
            .ok_or_else(|| anyhow!("Screen {} is not available", self.preferred_screen))?;

        Ok(DisplaySize {
            width_mm: screen.width_in_millimeters() as f64,
            width_points: screen.width_in_pixels() as f64,
        })
    }
}
