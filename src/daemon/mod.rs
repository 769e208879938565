use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use collection::aggregator::{EventAggregator, FLUSH_INTERVAL};
use events::StatsEvent;
use processing::{controller::StatsController, ProcessingModule};
use signals::{WakeDetector, WAKE_CHECK_INTERVAL};
use storage::{
    daily_stats::DailyStatsStore,
    kv_store::{JsonFileStore, KeyValueStore},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    input_api::{
        DisplayGeometry, FixedDisplayGeometry, GenericDisplayGeometry, GenericInputSource,
        InputSource, RawInputEvent,
    },
    utils::{
        clock::{Clock, DefaultClock},
        dir::data_dir,
    },
};

pub mod args;
pub mod collection;
pub mod events;
pub mod processing;
pub mod shutdown;
pub mod signals;
pub mod storage;

const EVENT_BUFFER: usize = 256;

/// Runtime options of the daemon that don't concern process management.
#[derive(Debug, Clone, Default)]
pub struct DaemonSettings {
    pub mm_per_point: Option<f64>,
}

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, settings: DaemonSettings) -> Result<()> {
    std::env::set_current_dir("/")?;

    run_daemon(
        GenericInputSource::new(),
        JsonFileStore::new(data_dir(&dir))?,
        || create_display(&settings),
        CancellationToken::new(),
        Arc::new(DefaultClock),
    )
    .await
}

/// Without permission to observe input nothing is captured or written. The daemon only asks
/// for permission and waits for shutdown.
async fn run_daemon<S: KeyValueStore>(
    mut input: impl InputSource,
    storage: S,
    display: impl FnOnce() -> Box<dyn DisplayGeometry>,
    shutdown_token: CancellationToken,
    clock: Arc<dyn Clock>,
) -> Result<()> {
    if !input.is_permitted() {
        warn!("Input monitoring is not permitted, staying idle");
        input.request_permission();
        shutdown::detect_shutdown(shutdown_token).await;
        return Ok(());
    }

    let (raw_sender, raw_receiver) = mpsc::unbounded_channel::<RawInputEvent>();
    input.start(raw_sender)?;
    info!("Input capture started");

    run_pipeline(raw_receiver, display(), storage, shutdown_token, clock).await;

    input.stop();
    Ok(())
}

fn create_display(settings: &DaemonSettings) -> Box<dyn DisplayGeometry> {
    if let Some(mm_per_point) = settings.mm_per_point {
        return Box::new(FixedDisplayGeometry::new(mm_per_point));
    }
    match GenericDisplayGeometry::new() {
        Ok(display) => Box::new(display),
        Err(e) => {
            warn!("Display geometry is unavailable, cursor distance won't be counted {e:?}");
            Box::new(FixedDisplayGeometry::new(0.))
        }
    }
}

/// Runs everything after the capture hook: aggregation, signal sources and the owner loop,
/// until `shutdown_token` is cancelled.
async fn run_pipeline<S: KeyValueStore>(
    raw: mpsc::UnboundedReceiver<RawInputEvent>,
    display: Box<dyn DisplayGeometry>,
    storage: S,
    shutdown_token: CancellationToken,
    clock: Arc<dyn Clock>,
) {
    let (sender, receiver) = mpsc::channel::<StatsEvent>(EVENT_BUFFER);

    let aggregator = create_aggregator(
        sender.clone(),
        raw,
        display,
        &shutdown_token,
        clock.clone(),
    );
    let wake_detector = WakeDetector::new(
        sender.clone(),
        shutdown_token.clone(),
        WAKE_CHECK_INTERVAL,
        clock.clone(),
    );
    let processor = create_processor(storage, receiver, &shutdown_token, clock);

    let (_, aggregation_result, wake_result, session_result, processing_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        aggregator.run(),
        wake_detector.run(),
        signals::forward_session_signals(sender, shutdown_token.clone()),
        processor.run(),
    );

    if let Err(aggregation_result) = aggregation_result {
        error!("Aggregation module got an error {:?}", aggregation_result);
    }

    if let Err(wake_result) = wake_result {
        error!("Wake detection got an error {:?}", wake_result);
    }

    if let Err(session_result) = session_result {
        error!("Session signal forwarding got an error {:?}", session_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }
}

fn create_aggregator(
    sender: mpsc::Sender<StatsEvent>,
    raw: mpsc::UnboundedReceiver<RawInputEvent>,
    display: Box<dyn DisplayGeometry>,
    shutdown_token: &CancellationToken,
    clock: Arc<dyn Clock>,
) -> EventAggregator {
    EventAggregator::new(
        sender,
        raw,
        display,
        shutdown_token.clone(),
        FLUSH_INTERVAL,
        clock,
    )
}

fn create_processor<S: KeyValueStore>(
    storage: S,
    receiver: mpsc::Receiver<StatsEvent>,
    shutdown_token: &CancellationToken,
    clock: Arc<dyn Clock>,
) -> ProcessingModule<StatsController<S>> {
    let store = DailyStatsStore::new(storage, clock.clone());
    let controller = StatsController::new(store, clock.clone());
    ProcessingModule::new(receiver, controller, shutdown_token.clone(), clock)
}

#[cfg(test)]
mod daemon_tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::NaiveDate;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            run_daemon, run_pipeline,
            storage::{
                daily_stats::DailyStatsStore,
                entities::DailyStats,
                kv_store::MemoryStore,
            },
        },
        input_api::{DisplayGeometry, FixedDisplayGeometry, MockInputSource, RawInputEvent},
        utils::{clock::test_clock::ManualClock, logging::TEST_LOGGING},
    };

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn fixed_display() -> Box<dyn DisplayGeometry> {
        Box::new(FixedDisplayGeometry::new(0.25))
    }

    fn send_activity(raw: &mpsc::UnboundedSender<RawInputEvent>) -> Result<()> {
        for _ in 0..5 {
            raw.send(RawInputEvent::KeyDown)?;
        }
        raw.send(RawInputEvent::CursorSample { x: 0., y: 0. })?;
        raw.send(RawInputEvent::CursorSample { x: 180., y: 240. })?;
        raw.send(RawInputEvent::CursorSample { x: 180., y: 540. })?;
        Ok(())
    }

    /// Smoke test of the whole pipeline: raw input goes in on one end, the day's counters come
    /// out of the store on the other.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let clock = ManualClock::at(day(10), 12, 0);
        let storage = Arc::new(MemoryStore::new());
        let shutdown_token = CancellationToken::new();
        let (raw_sender, raw_receiver) = mpsc::unbounded_channel();
        send_activity(&raw_sender)?;

        tokio::join!(
            run_pipeline(
                raw_receiver,
                fixed_display(),
                storage.clone(),
                shutdown_token.clone(),
                Arc::new(clock.clone()),
            ),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                shutdown_token.cancel();
            }
        );

        let store = DailyStatsStore::new(storage, Arc::new(clock));
        assert_eq!(
            store.peek_today().await?,
            Some(DailyStats::new(day(10), 5, 150.))
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn smoke_test_daemon_across_midnight() -> Result<()> {
        let clock = ManualClock::at(day(10), 23, 59);
        let storage = Arc::new(MemoryStore::new());
        let shutdown_token = CancellationToken::new();
        let (raw_sender, raw_receiver) = mpsc::unbounded_channel();
        send_activity(&raw_sender)?;

        tokio::join!(
            run_pipeline(
                raw_receiver,
                fixed_display(),
                storage.clone(),
                shutdown_token.clone(),
                Arc::new(clock.clone()),
            ),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                clock.set(day(11), 0, 0);
                // Both the wake detector and the midnight deadline fire meanwhile.
                tokio::time::sleep(Duration::from_secs(90)).await;
                raw_sender.send(RawInputEvent::KeyDown).ok();
                tokio::time::sleep(Duration::from_secs(1)).await;
                shutdown_token.cancel();
            }
        );

        let store = DailyStatsStore::new(storage, Arc::new(clock));
        assert_eq!(
            store.load_history().await?,
            vec![DailyStats::new(day(10), 5, 150.)]
        );
        assert_eq!(
            store.peek_today().await?,
            Some(DailyStats::new(day(11), 1, 0.))
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_daemon_stays_idle_without_permission() -> Result<()> {
        let clock = ManualClock::at(day(10), 12, 0);
        let storage = Arc::new(MemoryStore::new());
        let shutdown_token = CancellationToken::new();

        let mut input = MockInputSource::new();
        input.expect_is_permitted().return_const(false);
        input.expect_request_permission().times(1).return_const(());
        input.expect_start().never();
        input.expect_stop().never();

        let (result, _) = tokio::join!(
            run_daemon(
                input,
                storage.clone(),
                fixed_display,
                shutdown_token.clone(),
                Arc::new(clock),
            ),
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                shutdown_token.cancel();
            }
        );
        result?;

        assert!(storage.snapshot().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_daemon_shuts_down_when_capture_detaches() -> Result<()> {
        let clock = ManualClock::at(day(10), 12, 0);
        let storage = Arc::new(MemoryStore::new());
        let shutdown_token = CancellationToken::new();

        let mut input = MockInputSource::new();
        input.expect_is_permitted().return_const(true);
        input.expect_request_permission().never();
        // The sender is dropped right after these events, as a failed listener does.
        input.expect_start().times(1).returning(|raw| {
            for _ in 0..3 {
                raw.send(RawInputEvent::KeyDown)?;
            }
            Ok(())
        });
        input.expect_stop().times(1).return_const(());

        tokio::time::timeout(
            Duration::from_secs(5),
            run_daemon(
                input,
                storage.clone(),
                fixed_display,
                shutdown_token.clone(),
                Arc::new(clock.clone()),
            ),
        )
        .await??;

        assert!(shutdown_token.is_cancelled());
        let store = DailyStatsStore::new(storage, Arc::new(clock));
        assert_eq!(
            store.peek_today().await?,
            Some(DailyStats::new(day(10), 3, 0.))
        );
        Ok(())
    }
}
