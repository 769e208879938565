use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use tokio::time::Instant;

/// Represents an entity responsible for providing dates across application. Day boundaries are
/// always evaluated in local time, so the clock hands out [Local] timestamps.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Local>;

    fn instant(&self) -> Instant;

    async fn sleep(&self, duration: Duration);

    async fn sleep_until(&self, instant: tokio::time::Instant);

    /// Calendar day of [Clock::time].
    fn today(&self) -> NaiveDate {
        self.time().date_naive()
    }
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Local> {
        Local::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn sleep_until(&self, instant: tokio::time::Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
