use std::future::Future;

use anyhow::Result;
use tokio::time::Instant;

use crate::daemon::events::StatsEvent;

/// Represents an event processor driven by [ProcessingModule](super::ProcessingModule). Every
/// method runs on the owner loop, so implementations never see concurrent calls.
pub trait EventProcessor {
    fn start(&mut self) -> impl Future<Output = Result<()>>;

    fn process_next(&mut self, message: StatsEvent) -> impl Future<Output = Result<()>>;

    /// Moment the processor wants to be woken up at even without events.
    fn deadline(&self) -> Option<Instant>;

    fn on_deadline(&mut self) -> impl Future<Output = Result<()>>;

    fn finalize(&mut self) -> impl Future<Output = Result<()>>;
}
