use tracing::trace;

/// Any displacement this large between two samples is a coordinate discontinuity (display
/// hot-plug, cursor warp between displays), not a movement.
pub const MAX_JUMP_POINTS: f64 = 500.;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// What happened to a single cursor sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    /// No previous location to measure from.
    First,
    /// Discontinuity. Nothing is counted, the sample becomes the previous location.
    Jump,
    /// Coordinates that aren't finite. Nothing is counted and the previous location is kept,
    /// the next valid sample measures from it.
    Invalid,
    Accumulated(f64),
}

/// Turns cursor locations into travelled millimetres, waiting for a flush.
#[derive(Debug, Default)]
pub struct DistanceAccumulator {
    previous: Option<Point>,
    pending_mm: f64,
}

impl DistanceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sample(&mut self, location: Point, mm_per_point: f64) -> SampleOutcome {
        if !(location.x.is_finite() && location.y.is_finite()) {
            trace!("Ignoring cursor sample at {location:?}");
            return SampleOutcome::Invalid;
        }

        let Some(previous) = self.previous.replace(location) else {
            return SampleOutcome::First;
        };

        let points = previous.distance_to(&location);
        if points >= MAX_JUMP_POINTS {
            trace!("Discarding cursor jump of {points} points");
            return SampleOutcome::Jump;
        }

        let factor = if mm_per_point.is_finite() && mm_per_point > 0. {
            mm_per_point
        } else {
            0.
        };
        let mm = points * factor;
        self.pending_mm += mm;
        SampleOutcome::Accumulated(mm)
    }

    /// Takes the accumulated distance. `None` when nothing moved, so an idle cursor produces no
    /// downstream work.
    pub fn take_pending(&mut self) -> Option<f64> {
        if self.pending_mm > 0. {
            Some(std::mem::take(&mut self.pending_mm))
        } else {
            None
        }
    }

    pub fn pending(&self) -> f64 {
        self.pending_mm
    }

    /// Forgets the previous location and drops distance that was not flushed yet.
    pub fn reset(&mut self) {
        self.previous = None;
        self.pending_mm = 0.;
    }
}
