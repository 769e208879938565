//! Sources of [StatsEvent::Suspend] and [StatsEvent::Resume]. Both end up in the owner loop, where
//! a resume triggers a reconcile of the day boundary and a suspend flushes the counters.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::utils::clock::Clock;

use super::events::StatsEvent;

pub const WAKE_CHECK_INTERVAL: Duration = Duration::from_secs(30);
/// How far wall time may run ahead of monotonic time before it counts as a wake up.
pub const WAKE_TOLERANCE: Duration = Duration::from_secs(60);

/// Whether the machine most likely slept between two checks. Monotonic time doesn't advance
/// while asleep, wall time does. A change of the calendar day counts too, since it's all the
/// controller cares about.
pub fn is_wake(
    previous: DateTime<Local>,
    now: DateTime<Local>,
    monotonic_elapsed: Duration,
) -> bool {
    if previous.date_naive() != now.date_naive() {
        return true;
    }
    // Wall time going backwards is a clock adjustment, not a sleep.
    let wall_elapsed = (now - previous).to_std().unwrap_or_default();
    wall_elapsed > monotonic_elapsed + WAKE_TOLERANCE
}

async fn send(next: &mpsc::Sender<StatsEvent>, event: StatsEvent) -> Result<()> {
    next.send(event)
        .await
        .inspect_err(|e| error!("Failed to forward {e:?}"))?;
    Ok(())
}

/// Periodically compares wall and monotonic clocks and emits [StatsEvent::Resume] once they
/// drift apart.
pub struct WakeDetector {
    next: mpsc::Sender<StatsEvent>,
    shutdown: CancellationToken,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl WakeDetector {
    pub fn new(
        next: mpsc::Sender<StatsEvent>,
        shutdown: CancellationToken,
        interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            next,
            shutdown,
            interval,
            clock,
        }
    }

    pub async fn run(self) -> Result<()> {
        let mut previous = (self.clock.time(), self.clock.instant());

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    break;
                }
                _ = self.clock.sleep(self.interval) => {
                    let current = (self.clock.time(), self.clock.instant());
                    if is_wake(previous.0, current.0, current.1 - previous.1) {
                        info!("Wall clock moved from {} to {}, reconciling", previous.0, current.0);
                        send(&self.next, StatsEvent::Resume).await?;
                    }
                    previous = current;
                }
            }
        }
        Ok(())
    }
}

/// Forwards session hooks sent as signals: SIGUSR1 on wake up or when the user comes back,
/// SIGUSR2 right before the machine sleeps.
#[cfg(unix)]
pub async fn forward_session_signals(
    next: mpsc::Sender<StatsEvent>,
    shutdown: CancellationToken,
) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut resume = signal(SignalKind::user_defined1())?;
    let mut suspend = signal(SignalKind::user_defined2())?;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                break;
            }
            Some(_) = resume.recv() => {
                debug!("Received SIGUSR1");
                send(&next, StatsEvent::Resume).await?;
            }
            Some(_) = suspend.recv() => {
                debug!("Received SIGUSR2");
                send(&next, StatsEvent::Suspend).await?;
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn forward_session_signals(
    _next: mpsc::Sender<StatsEvent>,
    shutdown: CancellationToken,
) -> Result<()> {
    debug!("Session signals are not supported on this platform");
    shutdown.cancelled().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::{Local, NaiveDate, TimeZone};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{daemon::events::StatsEvent, utils::clock::test_clock::ManualClock};

    use super::{is_wake, WakeDetector, WAKE_CHECK_INTERVAL};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn at(d: u32, hour: u32, minute: u32) -> chrono::DateTime<Local> {
        Local
            .from_local_datetime(&day(d).and_hms_opt(hour, minute, 0).unwrap())
            .earliest()
            .unwrap()
    }

    #[test]
    fn test_is_wake() {
        let thirty = Duration::from_secs(30);
        assert!(!is_wake(at(10, 12, 0), at(10, 12, 0), thirty));
        assert!(!is_wake(at(10, 12, 0), at(10, 12, 1), thirty));
        assert!(is_wake(at(10, 12, 0), at(10, 14, 0), thirty));
        // Backwards adjustments are not wake ups.
        assert!(!is_wake(at(10, 12, 0), at(10, 11, 0), thirty));
        assert!(is_wake(at(10, 23, 59), at(11, 0, 0), thirty));
    }

    #[tokio::test(start_paused = true)]
    async fn test_detector_emits_resume_after_sleep() -> Result<()> {
        let clock = ManualClock::at(day(10), 12, 0);
        let (sender, mut receiver) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let detector = WakeDetector::new(
            sender,
            shutdown.clone(),
            WAKE_CHECK_INTERVAL,
            Arc::new(clock.clone()),
        );

        let (result, event) = tokio::join!(detector.run(), async {
            // Nothing happens while both clocks agree. The manual clock doesn't move, which is
            // within the tolerance.
            tokio::time::sleep(WAKE_CHECK_INTERVAL * 3).await;
            assert!(receiver.try_recv().is_err());

            clock.set(day(10), 18, 0);
            let event = receiver.recv().await;
            shutdown.cancel();
            event
        });
        result?;

        assert_eq!(event, Some(StatsEvent::Resume));
        Ok(())
    }
}
