use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::time::{date_key, parse_date_key};

/// Totals of a single calendar day. Exactly one day is open (today) at a time, archived days
/// are never modified again.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone, Copy)]
pub struct DailyStats {
    #[serde(with = "date_key_ser")]
    pub date: NaiveDate,
    #[serde(rename = "keyCount")]
    pub key_count: u64,
    #[serde(rename = "distanceMM")]
    pub distance_mm: f64,
}

impl DailyStats {
    pub fn new(date: NaiveDate, key_count: u64, distance_mm: f64) -> Self {
        Self {
            date,
            key_count,
            distance_mm,
        }
    }

    pub fn zero(date: NaiveDate) -> Self {
        Self::new(date, 0, 0.)
    }

    pub fn date_key(&self) -> String {
        date_key(self.date)
    }
}

/// The open day as persisted. All three fields are written together so a crash can't leave
/// counters of one day under the key of another.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
pub struct TodayEntity {
    #[serde(rename = "dateKey")]
    pub date_key: String,
    #[serde(rename = "keyCount", default)]
    pub key_count: u64,
    #[serde(rename = "distanceMM", default)]
    pub distance_mm: f64,
}

impl TodayEntity {
    /// `None` when the stored date key is not a valid `YYYY-MM-DD` string.
    pub fn to_daily_stats(&self) -> Option<DailyStats> {
        parse_date_key(&self.date_key)
            .map(|date| DailyStats::new(date, self.key_count, self.distance_mm))
    }
}

impl From<DailyStats> for TodayEntity {
    fn from(stats: DailyStats) -> Self {
        Self {
            date_key: stats.date_key(),
            key_count: stats.key_count,
            distance_mm: stats.distance_mm,
        }
    }
}

mod date_key_ser {
    use chrono::NaiveDate;
    use serde::{self, de::Error, Deserialize, Deserializer, Serializer};

    use crate::utils::time::{date_key, parse_date_key};

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date_key(*date))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_date_key(&s).ok_or_else(|| D::Error::custom(format!("invalid date key {s}")))
    }
}
