use std::{fmt::Display, ops::Deref};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl Percentage {
    /// Converts a progress ratio into a percentage. Anything outside `[0, 1]` is clamped.
    pub fn from_ratio(ratio: f64) -> Percentage {
        if ratio.is_nan() {
            return Percentage(0.);
        }
        Percentage(ratio.clamp(0., 1.) * 100.)
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
