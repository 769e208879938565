//! Contains the boundary with the operating system: where raw input events come from and how
//! big the primary display physically is. [GenericInputSource] and [GenericDisplayGeometry]
//! are the main artifacts of this module, they pick a backend based on enabled features.

#[cfg(feature = "rdev")]
pub mod global_listener;
#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

/// Event as delivered by the capture context, before any aggregation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInputEvent {
    KeyDown,
    /// Absolute cursor location in display points.
    CursorSample { x: f64, y: f64 },
}

/// Intended to serve as a contract every capture backend must implement.
#[cfg_attr(test, mockall::automock)]
pub trait InputSource {
    /// Whether the platform allows this process to observe global input.
    fn is_permitted(&self) -> bool;

    /// Asks the platform to grant input monitoring. Never blocks waiting for the user.
    fn request_permission(&mut self);

    /// Starts delivering events into `sender` from the capture context.
    fn start(&mut self, sender: UnboundedSender<RawInputEvent>) -> Result<()>;

    /// Detaches the capture hook. Events that arrive afterwards are dropped.
    fn stop(&mut self);
}

/// Serves as a cross-compatible InputSource implementation.
pub struct GenericInputSource {
    inner: Box<dyn InputSource>,
}

impl GenericInputSource {
    pub fn new() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "rdev")] {
                Self {
                    inner: Box::new(global_listener::RdevInputSource::new()),
                }
            } else {
                Self {
                    inner: Box::new(UnavailableInputSource),
                }
            }
        }
    }
}

impl Default for GenericInputSource {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for GenericInputSource {
    fn is_permitted(&self) -> bool {
        self.inner.is_permitted()
    }

    fn request_permission(&mut self) {
        self.inner.request_permission()
    }

    fn start(&mut self, sender: UnboundedSender<RawInputEvent>) -> Result<()> {
        self.inner.start(sender)
    }

    fn stop(&mut self) {
        self.inner.stop()
    }
}

/// Used when no capture backend was compiled in. It is never permitted, so the daemon stays
/// idle instead of failing.
#[allow(dead_code)]
struct UnavailableInputSource;

impl InputSource for UnavailableInputSource {
    fn is_permitted(&self) -> bool {
        false
    }

    fn request_permission(&mut self) {
        warn!("No input capture backend was compiled in, enable the `rdev` feature");
    }

    fn start(&mut self, _sender: UnboundedSender<RawInputEvent>) -> Result<()> {
        Err(anyhow!("No input capture backend was compiled in"))
    }

    fn stop(&mut self) {}
}

/// Physical width and resolution width of a display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    pub width_mm: f64,
    pub width_points: f64,
}

impl DisplaySize {
    /// Conversion factor from display points to millimetres. A zero or otherwise unusable
    /// resolution gives 0, so samples on such a display contribute no distance.
    pub fn mm_per_point(&self) -> f64 {
        if !(self.width_points.is_finite() && self.width_points > 0.) {
            return 0.;
        }
        let factor = self.width_mm / self.width_points;
        if factor.is_finite() && factor > 0. {
            factor
        } else {
            0.
        }
    }
}

/// Provides geometry of the primary display.
#[cfg_attr(test, mockall::automock)]
pub trait DisplayGeometry {
    fn primary_display(&mut self) -> Result<DisplaySize>;
}

/// Same as [DisplaySize::mm_per_point], with lookup failures mapped to 0.
pub fn lookup_mm_per_point(display: &mut dyn DisplayGeometry) -> f64 {
    match display.primary_display() {
        Ok(size) => size.mm_per_point(),
        Err(e) => {
            warn!("Failed to look up display geometry {e:?}");
            0.
        }
    }
}

/// Display with a conversion factor configured by the user.
pub struct FixedDisplayGeometry {
    mm_per_point: f64,
}

impl FixedDisplayGeometry {
    pub fn new(mm_per_point: f64) -> Self {
        Self { mm_per_point }
    }
}

impl DisplayGeometry for FixedDisplayGeometry {
    fn primary_display(&mut self) -> Result<DisplaySize> {
        Ok(DisplaySize {
            width_mm: self.mm_per_point,
            width_points: 1.,
        })
    }
}

/// Serves as a cross-compatible DisplayGeometry implementation.
pub struct GenericDisplayGeometry {
    inner: Option<Box<dyn DisplayGeometry>>,
}

impl GenericDisplayGeometry {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                Ok(Self {
                    inner: Some(Box::new(win::WindowsDisplayGeometry::new())),
                })
            }
            else if #[cfg(feature = "x11")] {
                Ok(Self {
                    inner: Some(Box::new(x11::X11DisplayGeometry::new()?)),
                })
            }
            else {
                Ok(Self { inner: None })
            }
        }
    }
}

impl DisplayGeometry for GenericDisplayGeometry {
    fn primary_display(&mut self) -> Result<DisplaySize> {
        match self.inner.as_mut() {
            Some(inner) => inner.primary_display(),
            None => Err(anyhow!(
                "No display backend was specified, pass --mm-per-point or enable a platform feature"
            )),
        }
    }
}
