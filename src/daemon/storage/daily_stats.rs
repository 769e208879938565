use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::utils::{
    clock::Clock,
    time::{date_key, trailing_days},
};

use super::{
    entities::{DailyStats, TodayEntity},
    kv_store::{Change, KeyValueStore},
};

/// Maximum number of archived days. Oldest days are evicted first.
pub const HISTORY_LIMIT: usize = 365;
pub const WEEK_DAYS: u32 = 7;

const TODAY_KEY: &str = "today";
const HISTORY_KEY: &str = "history";

/// Sum or mean of key counts and distances over several days.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StatsTotals {
    #[serde(rename = "keyCount")]
    pub key_count: u64,
    #[serde(rename = "distanceMM")]
    pub distance_mm: f64,
}

/// Stores the counters of the open day and the ledger of archived days on top of a
/// [KeyValueStore]. Day rollover happens as a side effect of [DailyStatsStore::save] and
/// [DailyStatsStore::load_today]: whenever the persisted day is not the one being written or
/// requested, it gets archived first.
pub struct DailyStatsStore<S> {
    storage: S,
    clock: Arc<dyn Clock>,
    /// DateKey of the open day last written through this store.
    saved_key: Mutex<Option<String>>,
}

impl<S: KeyValueStore> DailyStatsStore<S> {
    pub fn new(storage: S, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            saved_key: Mutex::new(None),
        }
    }

    fn cached_key(&self) -> Option<String> {
        self.saved_key.lock().ok().and_then(|key| key.clone())
    }

    fn remember_key(&self, key: Option<String>) {
        if let Ok(mut saved) = self.saved_key.lock() {
            *saved = key;
        }
    }

    async fn load_today_entity(&self) -> Result<Option<TodayEntity>> {
        let Some(value) = self.storage.get(TODAY_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_value::<TodayEntity>(value) {
            Ok(entity) => Ok(Some(entity)),
            Err(e) => {
                warn!("Stored counters of the open day are corrupted {e}");
                Ok(None)
            }
        }
    }

    /// Produces the change that moves `previous` into history, if it can be archived.
    async fn archive_change(&self, previous: &TodayEntity) -> Result<Option<Change>> {
        let Some(archived) = previous.to_daily_stats() else {
            warn!(
                "Dropping counters stored under invalid date key {:?}",
                previous.date_key
            );
            return Ok(None);
        };

        let mut history = self.load_history().await?;
        history.push(archived);
        if history.len() > HISTORY_LIMIT {
            let excess = history.len() - HISTORY_LIMIT;
            history.drain(..excess);
        }
        info!(
            "Archived {} with {} keys and {:.1} mm",
            previous.date_key, archived.key_count, archived.distance_mm
        );
        Ok(Some(Change::set(HISTORY_KEY, serde_json::to_value(history)?)))
    }

    /// Persists `stats` as the open day. If the persisted open day is a different day, its
    /// counters are archived in the same write.
    ///
    /// Saves of the day this store wrote last skip reading the open day back.
    pub async fn save(&self, stats: DailyStats) -> Result<()> {
        let new_key = stats.date_key();
        let mut changes = Vec::with_capacity(2);

        if self.cached_key().as_deref() != Some(new_key.as_str()) {
            if let Some(previous) = self.load_today_entity().await? {
                if previous.date_key != new_key {
                    changes.extend(self.archive_change(&previous).await?);
                }
            }
        }

        changes.push(Change::set(
            TODAY_KEY,
            serde_json::to_value(TodayEntity::from(stats))?,
        ));
        self.storage.apply(changes).await?;
        self.remember_key(Some(new_key));
        Ok(())
    }

    /// Returns counters of the current day. When the persisted day is stale it is archived, a
    /// zeroed day is opened and `None` is returned, so the caller starts from zero.
    pub async fn load_today(&self) -> Result<Option<DailyStats>> {
        let today = self.clock.today();
        let today_key = date_key(today);

        let previous = self.load_today_entity().await?;
        if let Some(stats) = previous
            .as_ref()
            .filter(|entity| entity.date_key == today_key)
            .and_then(TodayEntity::to_daily_stats)
        {
            return Ok(Some(stats));
        }

        let mut changes = Vec::with_capacity(2);
        if let Some(previous) = previous.as_ref() {
            changes.extend(self.archive_change(previous).await?);
        }
        changes.push(Change::set(
            TODAY_KEY,
            serde_json::to_value(TodayEntity::from(DailyStats::zero(today)))?,
        ));
        self.storage.apply(changes).await?;
        debug!("Opened a new day {today_key}");
        self.remember_key(Some(today_key));
        Ok(None)
    }

    /// Counters of the open day if it is today. Unlike [DailyStatsStore::load_today] this never
    /// writes, so reporting can't race the daemon into archiving a day twice.
    pub async fn peek_today(&self) -> Result<Option<DailyStats>> {
        let today_key = date_key(self.clock.today());
        Ok(self
            .load_today_entity()
            .await?
            .filter(|entity| entity.date_key == today_key)
            .and_then(|entity| entity.to_daily_stats()))
    }

    /// Same as [DailyStatsStore::peek_today], with a zeroed day when nothing was recorded yet.
    pub async fn open_day_or_zero(&self) -> Result<DailyStats> {
        Ok(self
            .peek_today()
            .await?
            .unwrap_or_else(|| DailyStats::zero(self.clock.today())))
    }

    /// Archived days, oldest first. A history that can't be decoded is reported as empty.
    pub async fn load_history(&self) -> Result<Vec<DailyStats>> {
        let Some(value) = self.storage.get(HISTORY_KEY).await? else {
            return Ok(vec![]);
        };
        Ok(decode_history(value))
    }

    /// History as it looks once the next write happens, without writing. An open day older
    /// than today is counted as archived. Returns it together with the open day if that is
    /// today.
    async fn settled_history(&self) -> Result<(Vec<DailyStats>, Option<DailyStats>)> {
        let today = self.clock.today();
        let mut history = self.load_history().await?;
        let open_day = self
            .load_today_entity()
            .await?
            .and_then(|entity| entity.to_daily_stats());

        match open_day {
            Some(stats) if stats.date == today => Ok((history, Some(stats))),
            Some(stats) if stats.date < today => {
                history.push(stats);
                if history.len() > HISTORY_LIMIT {
                    let excess = history.len() - HISTORY_LIMIT;
                    history.drain(..excess);
                }
                Ok((history, None))
            }
            _ => Ok((history, None)),
        }
    }

    /// One entry per day from 6 days ago up to today, oldest first. Days without data are
    /// zero filled.
    pub async fn weekly_stats(&self) -> Result<Vec<DailyStats>> {
        let today = self.clock.today();
        let (history, open_day) = self.settled_history().await?;

        Ok(trailing_days(today, WEEK_DAYS)
            .map(|day| find_day(day, today, open_day, &history))
            .collect())
    }

    pub async fn weekly_totals(&self) -> Result<StatsTotals> {
        let weekly = self.weekly_stats().await?;
        Ok(StatsTotals {
            key_count: total_keys(&weekly),
            distance_mm: weekly.iter().map(|v| v.distance_mm).sum(),
        })
    }

    /// Mean over archived days only. The open day is still growing, so it would drag the
    /// average down.
    pub async fn average_daily(&self) -> Result<StatsTotals> {
        let (history, _) = self.settled_history().await?;
        if history.is_empty() {
            return Ok(StatsTotals::default());
        }

        let days = history.len();
        let distance_mm: f64 = history.iter().map(|v| v.distance_mm).sum();
        Ok(StatsTotals {
            key_count: total_keys(&history) / days as u64,
            distance_mm: distance_mm / days as f64,
        })
    }

    /// Removes everything. The next [DailyStatsStore::load_today] behaves like a first run.
    pub async fn clear_all_data(&self) -> Result<()> {
        info!("Clearing all stored statistics");
        self.remember_key(None);
        self.storage
            .apply(vec![Change::remove(TODAY_KEY), Change::remove(HISTORY_KEY)])
            .await
    }
}

fn decode_history(value: Value) -> Vec<DailyStats> {
    match serde_json::from_value::<Vec<DailyStats>>(value) {
        Ok(history) => history,
        Err(e) => {
            warn!("Failed to decode history, treating it as empty: {e}");
            vec![]
        }
    }
}

fn total_keys(days: &[DailyStats]) -> u64 {
    days.iter()
        .fold(0u64, |total, v| total.saturating_add(v.key_count))
}

fn find_day(
    day: NaiveDate,
    today: NaiveDate,
    open_day: Option<DailyStats>,
    history: &[DailyStats],
) -> DailyStats {
    if day == today {
        if let Some(stats) = open_day {
            return stats;
        }
    }
    history
        .iter()
        .find(|v| v.date == day)
        .copied()
        .unwrap_or_else(|| DailyStats::zero(day))
}
