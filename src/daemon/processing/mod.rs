use std::sync::Arc;

use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::utils::clock::Clock;

use super::events::StatsEvent;

pub mod controller;
pub mod module;

/// The owner loop. It is the only place where counters get mutated: events from the
/// aggregator and the signal sources, and the processor's own timer, are all handled here one
/// at a time.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<StatsEvent>,
    processor: Processor,
    shutdown: CancellationToken,
    time_provider: Arc<dyn Clock>,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(
        receiver: Receiver<StatsEvent>,
        processor: P,
        shutdown: CancellationToken,
        time_provider: Arc<dyn Clock>,
    ) -> Self {
        Self {
            receiver,
            processor,
            shutdown,
            time_provider,
        }
    }

    async fn process(&mut self, event: StatsEvent) {
        debug!("Processing event {:?}", event);
        if let Err(e) = self.processor.process_next(event).await {
            error!("Error processing event {:?}: {e:?}", event)
        }
    }

    async fn wait_for_deadline(time_provider: &dyn Clock, deadline: Option<tokio::time::Instant>) {
        match deadline {
            Some(deadline) => time_provider.sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        self.processor.start().await?;

        loop {
            let deadline = self.processor.deadline();
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    break;
                }
                event = self.receiver.recv() => {
                    match event {
                        Some(event) => self.process(event).await,
                        None => break,
                    }
                }
                _ = Self::wait_for_deadline(self.time_provider.as_ref(), deadline) => {
                    if let Err(e) = self.processor.on_deadline().await {
                        error!("Error handling processor deadline: {e:?}")
                    }
                }
            }
        }

        // Whatever was queued before the shutdown still counts.
        self.receiver.close();
        while let Ok(event) = self.receiver.try_recv() {
            self.process(event).await;
        }

        info!("Processing module is shutting down");
        self.processor.finalize().await
    }
}
