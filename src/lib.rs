//! Passive tracker of physical input activity. A daemon counts keystrokes and how far the
//! cursor travels, keeps daily totals with a bounded history, and the cli reports them together
//! with progress toward playful milestones.

pub mod cli;
pub mod daemon;
pub mod input_api;
pub mod milestones;
pub mod utils;
