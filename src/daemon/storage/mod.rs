//! Persistence of the daily counters.
//!  - [kv_store::KeyValueStore] is the port, everything is stored as JSON values under string keys.
//!  - [daily_stats::DailyStatsStore] keeps the open day under `today` and archived days under
//!    `history`, and archives a day as soon as it's no longer the open one.

pub mod daily_stats;
pub mod entities;
pub mod kv_store;
