use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// This is the standard way of converting a date to a string in keytrail.
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}

/// Returns start of the next day. `None` only when the next day has no midnight in this time
/// zone (DST gap) or the calendar ran out.
pub fn next_day_start<Tz: TimeZone>(date: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tomorrow = date.date_naive().succ_opt()?;
    date.timezone()
        .from_local_datetime(&tomorrow.and_time(NaiveTime::MIN))
        .earliest()
}

/// How long to wait from `now` until the next local midnight. Falls back to an hour when the
/// midnight can't be resolved, so the caller simply checks again later.
pub fn until_next_day<Tz: TimeZone>(now: &DateTime<Tz>) -> std::time::Duration {
    next_day_start(now)
        .and_then(|next| (next - now.clone()).to_std().ok())
        .unwrap_or(std::time::Duration::from_secs(60 * 60))
}

/// The trailing `days` calendar days ending with `today`, oldest first.
pub fn trailing_days(today: NaiveDate, days: u32) -> impl Iterator<Item = NaiveDate> {
    (0..days as i64)
        .rev()
        .map(move |offset| today - Duration::days(offset))
}
