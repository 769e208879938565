use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

use crate::{
    daemon::{
        events::StatsEvent,
        storage::{daily_stats::DailyStatsStore, entities::DailyStats, kv_store::KeyValueStore},
    },
    utils::{clock::Clock, time::until_next_day},
};

use super::module::EventProcessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Capture is not running, counters are not live.
    Idle,
    Active,
}

/// Owns the live counters of the open day. Every delta is persisted right away and the day
/// boundary is handled by [StatsController::reconcile], whatever noticed it: the midnight timer,
/// a wake up or a delta arriving after a missed midnight.
///
/// Persistence is best effort. A failed write is logged and forgotten since the next successful
/// one carries the full counters anyway.
pub struct StatsController<S> {
    store: DailyStatsStore<S>,
    clock: Arc<dyn Clock>,
    state: ControllerState,
    key_count: u64,
    distance_mm: f64,
    last_recorded_day: NaiveDate,
    midnight: Option<Instant>,
}

impl<S: KeyValueStore> StatsController<S> {
    pub fn new(store: DailyStatsStore<S>, clock: Arc<dyn Clock>) -> Self {
        let last_recorded_day = clock.today();
        Self {
            store,
            clock,
            state: ControllerState::Idle,
            key_count: 0,
            distance_mm: 0.,
            last_recorded_day,
            midnight: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Counters as they would be persisted right now.
    pub fn today(&self) -> DailyStats {
        DailyStats::new(self.last_recorded_day, self.key_count, self.distance_mm)
    }

    pub async fn start(&mut self) {
        if self.state == ControllerState::Active {
            return;
        }

        let now = self.clock.time();
        let stored = match self.store.load_today().await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to load counters of the open day, starting from zero {e:?}");
                None
            }
        };
        let stats = stored.unwrap_or_else(|| DailyStats::zero(now.date_naive()));

        self.key_count = stats.key_count;
        self.distance_mm = stats.distance_mm;
        self.last_recorded_day = stats.date;
        self.state = ControllerState::Active;
        self.schedule_midnight(&now);
        info!(
            "Started tracking {} with {} keys and {:.1} mm",
            stats.date, stats.key_count, stats.distance_mm
        );
    }

    pub async fn add_keys(&mut self, count: u64) {
        if self.state == ControllerState::Idle || count == 0 {
            return;
        }
        self.reconcile(self.clock.time()).await;
        self.key_count = self.key_count.saturating_add(count);
        self.persist().await;
    }

    pub async fn add_distance(&mut self, distance_mm: f64) {
        if self.state == ControllerState::Idle || !(distance_mm.is_finite() && distance_mm > 0.) {
            return;
        }
        self.reconcile(self.clock.time()).await;
        self.distance_mm += distance_mm;
        self.persist().await;
    }

    /// Rolls over if the counters belong to a day before `now`. Returns whether it did.
    /// Calling it again for the same day does nothing.
    #[instrument(skip(self))]
    pub async fn reconcile(&mut self, now: DateTime<Local>) -> bool {
        if self.state == ControllerState::Idle || self.last_recorded_day >= now.date_naive() {
            return false;
        }
        self.rollover(now).await;
        true
    }

    /// Closes the recorded day and opens `now`'s day with zeroed counters.
    #[instrument(skip(self))]
    pub async fn rollover(&mut self, now: DateTime<Local>) {
        // Final counters of the closing day. The next save carries another date, so the store
        // archives exactly these.
        self.persist().await;
        info!(
            "Closing {} with {} keys and {:.1} mm",
            self.last_recorded_day, self.key_count, self.distance_mm
        );

        self.key_count = 0;
        self.distance_mm = 0.;
        self.last_recorded_day = now.date_naive();
        self.persist().await;
        self.schedule_midnight(&now);
    }

    /// Flushes counters before the machine sleeps. State and counters stay as they are.
    pub async fn suspend(&mut self) {
        if self.state == ControllerState::Active {
            self.persist().await;
        }
    }

    pub async fn stop(&mut self) {
        if self.state == ControllerState::Idle {
            return;
        }
        self.midnight = None;
        self.persist().await;
        self.state = ControllerState::Idle;
        info!("Stopped tracking");
    }

    fn schedule_midnight(&mut self, now: &DateTime<Local>) {
        let wait = until_next_day(now);
        debug!("Next rollover check in {wait:?}");
        self.midnight = Some(self.clock.instant() + wait);
    }

    async fn persist(&self) {
        let stats = self.today();
        if let Err(e) = self.store.save(stats).await {
            error!("Failed to persist {stats:?} {e:?}");
        }
    }
}

impl<S: KeyValueStore> EventProcessor for StatsController<S> {
    async fn start(&mut self) -> Result<()> {
        StatsController::start(self).await;
        Ok(())
    }

    async fn process_next(&mut self, message: StatsEvent) -> Result<()> {
        match message {
            StatsEvent::Keys(count) => self.add_keys(count).await,
            StatsEvent::Distance(distance_mm) => self.add_distance(distance_mm).await,
            StatsEvent::Suspend => self.suspend().await,
            StatsEvent::Resume => {
                self.reconcile(self.clock.time()).await;
            }
        }
        Ok(())
    }

    fn deadline(&self) -> Option<Instant> {
        self.midnight
    }

    async fn on_deadline(&mut self) -> Result<()> {
        let now = self.clock.time();
        // Timers may fire slightly before midnight.
        if !self.reconcile(now).await {
            self.schedule_midnight(&now);
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.stop().await;
        Ok(())
    }
}
