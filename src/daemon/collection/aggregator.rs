use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    daemon::events::StatsEvent,
    input_api::{lookup_mm_per_point, DisplayGeometry, RawInputEvent},
    utils::clock::Clock,
};

use super::distance::{DistanceAccumulator, Point};

pub const FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const DISPLAY_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Converts the raw, high frequency input stream into events the controller can afford to
/// handle: a pulse per key press and at most one distance event per flush interval.
pub struct EventAggregator {
    next: mpsc::Sender<StatsEvent>,
    raw: mpsc::UnboundedReceiver<RawInputEvent>,
    display: Box<dyn DisplayGeometry>,
    shutdown: CancellationToken,
    flush_interval: Duration,
    time_provider: Arc<dyn Clock>,
    distance: DistanceAccumulator,
    mm_per_point: f64,
}

impl EventAggregator {
    pub fn new(
        next: mpsc::Sender<StatsEvent>,
        raw: mpsc::UnboundedReceiver<RawInputEvent>,
        display: Box<dyn DisplayGeometry>,
        shutdown: CancellationToken,
        flush_interval: Duration,
        time_provider: Arc<dyn Clock>,
    ) -> Self {
        Self {
            next,
            raw,
            display,
            shutdown,
            flush_interval,
            time_provider,
            distance: DistanceAccumulator::new(),
            mm_per_point: 0.,
        }
    }

    fn refresh_display(&mut self) {
        self.mm_per_point = lookup_mm_per_point(self.display.as_mut());
        debug!("Using {} mm per display point", self.mm_per_point);
    }

    async fn send(&self, event: StatsEvent) -> Result<()> {
        self.next
            .send(event)
            .await
            .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
        Ok(())
    }

    async fn handle_raw(&mut self, event: RawInputEvent) -> Result<()> {
        match event {
            RawInputEvent::KeyDown => self.send(StatsEvent::Keys(1)).await,
            RawInputEvent::CursorSample { x, y } => {
                self.distance.record_sample(Point { x, y }, self.mm_per_point);
                Ok(())
            }
        }
    }

    async fn flush(&mut self) -> Result<()> {
        if let Some(distance) = self.distance.take_pending() {
            self.send(StatsEvent::Distance(distance)).await?;
        }
        Ok(())
    }

    /// Executes the aggregator event loop. Returns once shutdown is requested or the capture
    /// side goes away, in which case shutdown of the whole daemon is requested. Distance that
    /// wasn't flushed by then is dropped.
    pub async fn run(mut self) -> Result<()> {
        self.refresh_display();
        let mut flush_point = self.time_provider.instant() + self.flush_interval;
        let mut refresh_point = self.time_provider.instant() + DISPLAY_REFRESH_INTERVAL;

        loop {
            tokio::select! {
                // Cancelation means we stop execution of the event loop. Which means we also drop
                // the sender channel.
                _ = self.shutdown.cancelled() => {
                    break;
                }
                event = self.raw.recv() => {
                    match event {
                        Some(event) => self.handle_raw(event).await?,
                        None => {
                            warn!("Input capture detached, shutting down");
                            self.shutdown.cancel();
                            break;
                        }
                    }
                }
                _ = self.time_provider.sleep_until(flush_point) => {
                    self.flush().await?;

                    let now = self.time_provider.instant();
                    flush_point += self.flush_interval;
                    if flush_point <= now {
                        flush_point = now + self.flush_interval;
                    }
                    if refresh_point <= now {
                        self.refresh_display();
                        refresh_point = now + DISPLAY_REFRESH_INTERVAL;
                    }
                }
            }
        }

        let discarded = self.distance.pending();
        if discarded > 0. {
            debug!("Discarding {discarded} mm that were not flushed");
        }
        self.distance.reset();
        Ok(())
    }
}
