pub mod aggregator;
pub mod distance;
